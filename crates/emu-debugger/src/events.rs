//! Frame-scoped debug events.
//!
//! Register accesses, interrupts and marked breakpoints are collected while
//! a frame runs; at the end of the frame the log swaps, so the UI always
//! reads a complete frame while the next one fills in.

use emu_core::MemoryOperation;

/// What a [`DebugEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEventType {
    /// A hardware register read or write.
    Register,
    /// The CPU entered an interrupt handler.
    Irq,
    /// A breakpoint hit (including mark-only breakpoints).
    Breakpoint,
}

/// One event, stamped with where the display was when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugEvent {
    pub event_type: DebugEventType,
    pub operation: MemoryOperation,
    /// Program counter at the time of the access.
    pub pc: u16,
    pub scanline: u16,
    /// Cycle within the scanline.
    pub cycle: u16,
    /// Set when the event came from a breakpoint.
    pub breakpoint_id: Option<u32>,
}

/// Event collector with one-frame history.
#[derive(Debug, Default)]
pub struct EventLog {
    current: Vec<DebugEvent>,
    previous: Vec<DebugEvent>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: DebugEvent) {
        self.current.push(event);
    }

    /// Close out the running frame: its events become the readable history
    /// and collection starts over.
    pub fn end_frame(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// Events of the last completed frame, in occurrence order.
    #[must_use]
    pub fn frame_events(&self) -> &[DebugEvent] {
        &self.previous
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::MemoryOperationType;

    fn register_write(addr: u16, scanline: u16) -> DebugEvent {
        DebugEvent {
            event_type: DebugEventType::Register,
            operation: MemoryOperation {
                address: addr,
                value: 0,
                op_type: MemoryOperationType::Write,
            },
            pc: 0x0200,
            scanline,
            cycle: 0,
            breakpoint_id: None,
        }
    }

    #[test]
    fn end_of_frame_publishes_the_collected_events() {
        let mut log = EventLog::new();
        log.add(register_write(0xFD94, 10));
        log.add(register_write(0xFD95, 11));
        assert!(log.frame_events().is_empty());

        log.end_frame();
        assert_eq!(log.frame_events().len(), 2);
        assert_eq!(log.frame_events()[0].operation.address, 0xFD94);

        // The next frame starts collecting from scratch.
        log.add(register_write(0xFDA0, 3));
        log.end_frame();
        assert_eq!(log.frame_events().len(), 1);
        assert_eq!(log.frame_events()[0].operation.address, 0xFDA0);
    }

    #[test]
    fn clear_drops_both_frames() {
        let mut log = EventLog::new();
        log.add(register_write(0xFD94, 10));
        log.end_frame();
        log.add(register_write(0xFD95, 11));
        log.clear();
        assert!(log.frame_events().is_empty());
        log.end_frame();
        assert!(log.frame_events().is_empty());
    }
}
