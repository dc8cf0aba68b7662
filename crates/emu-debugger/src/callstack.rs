//! Callstack reconstruction.
//!
//! The machine reports calls, returns and interrupt entries as it executes
//! them; this module keeps the resulting stack in a fixed ring and feeds
//! the [`Profiler`]. Programs that manipulate the stack instead of
//! returning normally are handled by scanning for a matching return
//! address and, failing that, synthesizing a frame so the display stays
//! plausible.

use std::collections::VecDeque;

use emu_core::AddressInfo;

use crate::profiler::Profiler;

/// Deepest stack the ring keeps; older frames fall off the bottom.
const MAX_FRAMES: usize = 512;

/// How a stack frame was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackFrameFlags {
    /// An ordinary subroutine call.
    #[default]
    None,
    Nmi,
    Irq,
}

/// One call frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Address of the call instruction (or the interrupted instruction).
    pub source: u16,
    pub abs_source: Option<AddressInfo>,
    /// Call destination or handler entry.
    pub target: u16,
    pub abs_target: Option<AddressInfo>,
    /// Where the matching return will land.
    pub return_addr: u16,
    pub abs_return: Option<AddressInfo>,
    /// Stack pointer the matching return will restore.
    pub return_sp: u16,
    pub flags: StackFrameFlags,
}

/// The reconstructed callstack plus the profiler it drives.
#[derive(Debug)]
pub struct Callstack {
    frames: VecDeque<StackFrame>,
    profiler: Profiler,
}

impl Default for Callstack {
    fn default() -> Self {
        Self::new()
    }
}

impl Callstack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(MAX_FRAMES),
            profiler: Profiler::new(),
        }
    }

    /// Record a call or interrupt entry.
    pub fn push(&mut self, frame: StackFrame, clock: u64) {
        if self.frames.len() == MAX_FRAMES {
            self.frames.pop_front();
        }
        self.profiler
            .stack_function(frame.abs_target, frame.flags, clock);
        self.frames.push_back(frame);
    }

    /// Record a return that landed on `dest_pc` with the stack at `sp`.
    ///
    /// When the landing address does not match the top frame's recorded
    /// return, the stack is unwound to the deepest frame that does match.
    /// If none matches and the stack pointer moved, the return was really
    /// a computed jump: a synthetic frame keeps the stack coherent.
    pub fn pop(&mut self, dest_pc: u16, abs_dest: Option<AddressInfo>, sp: u16, clock: u64) {
        let Some(popped) = self.frames.pop_back() else {
            return;
        };
        self.profiler.unstack_function(clock);

        if self.frames.is_empty() || dest_pc == popped.return_addr {
            return;
        }

        if let Some(pos) = self
            .frames
            .iter()
            .rposition(|frame| frame.return_addr == dest_pc)
        {
            // The matching frame completed too: everything above it and
            // itself comes off.
            while self.frames.len() > pos {
                self.frames.pop_back();
                self.profiler.unstack_function(clock);
            }
        } else if self.frames.back().is_some_and(|top| top.return_sp != sp) {
            self.push(
                StackFrame {
                    source: popped.return_addr,
                    abs_source: popped.abs_return,
                    target: dest_pc,
                    abs_target: abs_dest,
                    return_addr: popped.return_addr,
                    abs_return: popped.abs_return,
                    return_sp: sp,
                    flags: StackFrameFlags::None,
                },
                clock,
            );
        }
    }

    /// True when `addr` is the recorded return address of any open frame.
    /// Step-out uses this to survive intermediate returns.
    #[must_use]
    pub fn is_return_addr(&self, addr: u16) -> bool {
        self.frames.iter().any(|frame| frame.return_addr == addr)
    }

    /// Open frames, oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &StackFrame> {
        self.frames.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Return address of the innermost frame.
    #[must_use]
    pub fn return_address(&self) -> Option<u16> {
        self.frames.back().map(|frame| frame.return_addr)
    }

    /// Stack pointer the innermost frame's return restores.
    #[must_use]
    pub fn return_stack_pointer(&self) -> Option<u16> {
        self.frames.back().map(|frame| frame.return_sp)
    }

    /// Drop all frames and the profiler's open-call state. Accumulated
    /// profile totals survive.
    pub fn clear(&mut self, clock: u64) {
        self.frames.clear();
        self.profiler.reset_state(clock);
    }

    #[must_use]
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut Profiler {
        &mut self.profiler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::MemoryType;

    fn call(source: u16, target: u16, return_addr: u16, return_sp: u16) -> StackFrame {
        StackFrame {
            source,
            abs_source: Some(AddressInfo::new(u32::from(source), MemoryType::LynxPrgRom)),
            target,
            abs_target: Some(AddressInfo::new(u32::from(target), MemoryType::LynxPrgRom)),
            return_addr,
            abs_return: Some(AddressInfo::new(
                u32::from(return_addr),
                MemoryType::LynxPrgRom,
            )),
            return_sp,
            flags: StackFrameFlags::None,
        }
    }

    #[test]
    fn balanced_calls_pop_cleanly() {
        let mut stack = Callstack::new();
        stack.push(call(0x0200, 0x0300, 0x0203, 0x01FD), 0);
        stack.push(call(0x0310, 0x0400, 0x0313, 0x01FB), 10);

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.return_address(), Some(0x0313));
        assert_eq!(stack.return_stack_pointer(), Some(0x01FB));

        stack.pop(0x0313, None, 0x01FB, 20);
        assert_eq!(stack.len(), 1);
        stack.pop(0x0203, None, 0x01FD, 30);
        assert!(stack.is_empty());
    }

    #[test]
    fn mismatched_return_unwinds_to_the_matching_frame() {
        let mut stack = Callstack::new();
        stack.push(call(0x0200, 0x0300, 0x0203, 0x01FD), 0);
        stack.push(call(0x0310, 0x0400, 0x0313, 0x01FB), 10);
        stack.push(call(0x0410, 0x0500, 0x0413, 0x01F9), 20);

        // A single RTS lands where the outermost call would return: the
        // program dropped the intermediate return addresses itself.
        stack.pop(0x0203, None, 0x01FD, 30);
        assert!(stack.is_empty());
    }

    #[test]
    fn unknown_return_with_moved_stack_gets_a_synthetic_frame() {
        let mut stack = Callstack::new();
        stack.push(call(0x0200, 0x0300, 0x0203, 0x01FD), 0);
        stack.push(call(0x0310, 0x0400, 0x0313, 0x01FB), 10);

        let dest = Some(AddressInfo::new(0x9999, MemoryType::LynxPrgRom));
        stack.pop(0x9999, dest, 0x01F0, 20);

        assert_eq!(stack.len(), 2);
        let top = stack.frames().last().unwrap();
        assert_eq!(top.target, 0x9999);
        assert_eq!(top.source, 0x0313);
        assert_eq!(top.return_addr, 0x0313);
        assert_eq!(top.return_sp, 0x01F0);
        assert_eq!(top.flags, StackFrameFlags::None);
    }

    #[test]
    fn unknown_return_with_matching_stack_lands_in_the_top_frame() {
        let mut stack = Callstack::new();
        stack.push(call(0x0200, 0x0300, 0x0203, 0x01FD), 0);
        stack.push(call(0x0310, 0x0400, 0x0313, 0x01FB), 10);

        // RTS-dispatch back into the caller's body: same stack depth as
        // the recorded frame, so no synthetic frame is invented.
        stack.pop(0x0250, None, 0x01FD, 20);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.return_address(), Some(0x0203));
    }

    #[test]
    fn ring_drops_the_oldest_frame() {
        let mut stack = Callstack::new();
        for i in 0..=MAX_FRAMES as u16 {
            stack.push(call(i, 0x1000 + i, i + 3, 0x01FD), u64::from(i));
        }
        assert_eq!(stack.len(), MAX_FRAMES);
        assert_eq!(stack.frames().next().map(|frame| frame.source), Some(1));
    }

    #[test]
    fn is_return_addr_sees_outer_frames() {
        let mut stack = Callstack::new();
        stack.push(call(0x0200, 0x0300, 0x0203, 0x01FD), 0);
        stack.push(call(0x0310, 0x0400, 0x0313, 0x01FB), 10);

        assert!(stack.is_return_addr(0x0203));
        assert!(stack.is_return_addr(0x0313));
        assert!(!stack.is_return_addr(0x0400));

        stack.clear(20);
        assert!(stack.is_empty());
        assert_eq!(stack.return_address(), None);
    }
}
