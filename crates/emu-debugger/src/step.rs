//! Step requests and break bookkeeping.
//!
//! A [`StepRequest`] is armed by the front-end and consumed by the machine's
//! instruction loop: the loop calls the `process_*` hooks as it executes, and
//! checks [`StepRequest::break_needed`] after each one. The request records
//! the first user source and the first exception source separately so a BRK
//! hit during a step reports the exception, not the step.

use emu_core::MemoryOperation;

/// What kind of stepping the current request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepKind {
    /// Run a fixed number of instructions.
    #[default]
    Step,
    /// Run until the current subroutine returns.
    StepOut,
    /// Run until the instruction after a call completes.
    StepOver,
    /// Run a fixed number of CPU cycles.
    CpuCycle,
    /// Run a fixed number of video clock cycles.
    PpuCycle,
    /// Run a fixed number of scanlines.
    PpuScanline,
    /// Run a fixed number of frames.
    PpuFrame,
    /// Run until the display reaches a specific scanline.
    SpecificScanline,
    /// Run until the CPU enters an interrupt handler.
    RunToIrq,
    /// Rewind to an earlier point and replay.
    StepBack,
}

/// Why execution stopped.
///
/// Sources split into user requests (steps, pauses, breakpoints) and
/// exceptions (break-on-BRK and friends). When both fire on the same
/// instruction the exception wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakSource {
    #[default]
    Unspecified,
    Breakpoint,
    Pause,
    CpuStep,
    PpuStep,
    Irq,
    BreakOnBrk,
    BreakOnStp,
    BreakOnUninitRead,
}

impl BreakSource {
    /// True for sources that report a fault in the emulated program rather
    /// than a tool the user armed.
    #[must_use]
    pub const fn is_exception(self) -> bool {
        matches!(
            self,
            Self::BreakOnBrk | Self::BreakOnStp | Self::BreakOnUninitRead
        )
    }
}

/// A completed break: why, on which access, and where the CPU stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakEvent {
    pub source: BreakSource,
    pub operation: MemoryOperation,
    pub pc: u16,
}

/// One pending step request plus the break state it accumulates.
///
/// The default value is inert: no counters armed, no break pending. All
/// hooks are cheap enough to call unconditionally from the hot loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepRequest {
    pub kind: StepKind,
    /// Instructions left to execute. `Some(0)` means the countdown already
    /// fired; `None` means no instruction stepping is armed.
    step_count: Option<u32>,
    /// CPU cycles left.
    cycle_count: Option<u32>,
    /// Video clock cycles left.
    ppu_cycle_count: Option<u32>,
    /// Stop when the display reaches this scanline.
    break_scanline: Option<u16>,
    /// Stop when a return lands on this (pc, stack pointer) pair. Both must
    /// match: the address alone recurses, the pointer alone is ambiguous.
    break_target: Option<(u16, u16)>,
    break_user: bool,
    break_exception: bool,
    source: BreakSource,
    exception_source: BreakSource,
}

impl StepRequest {
    /// Run `count` instructions, then break.
    #[must_use]
    pub fn instructions(count: u32) -> Self {
        Self {
            step_count: Some(count),
            ..Self::default()
        }
    }

    /// Break before the next instruction executes.
    #[must_use]
    pub fn pause() -> Self {
        let mut request = Self::default();
        request.break_now(BreakSource::Pause);
        request
    }

    /// Run until an RTS/RTI lands on `pc` with the stack back at `sp`.
    #[must_use]
    pub fn step_out(pc: u16, sp: u16) -> Self {
        Self {
            kind: StepKind::StepOut,
            break_target: Some((pc, sp)),
            ..Self::default()
        }
    }

    /// Run until the subroutine called by the current instruction returns
    /// to `pc` with the stack back at `sp`.
    #[must_use]
    pub fn step_over(pc: u16, sp: u16) -> Self {
        Self {
            kind: StepKind::StepOver,
            break_target: Some((pc, sp)),
            ..Self::default()
        }
    }

    /// Run `count` CPU cycles, then break.
    #[must_use]
    pub fn cpu_cycles(count: u32) -> Self {
        Self {
            kind: StepKind::CpuCycle,
            cycle_count: Some(count),
            ..Self::default()
        }
    }

    /// Run `count` video clock cycles, then break.
    #[must_use]
    pub fn ppu_cycles(count: u32) -> Self {
        Self {
            kind: StepKind::PpuCycle,
            ppu_cycle_count: Some(count),
            ..Self::default()
        }
    }

    /// Run `count` scanlines, then break.
    #[must_use]
    pub fn scanlines(count: u32, cycles_per_scanline: u32) -> Self {
        Self {
            kind: StepKind::PpuScanline,
            ppu_cycle_count: Some(count.saturating_mul(cycles_per_scanline)),
            ..Self::default()
        }
    }

    /// Run `count` frames, then break.
    #[must_use]
    pub fn frames(count: u32, cycles_per_frame: u32) -> Self {
        Self {
            kind: StepKind::PpuFrame,
            ppu_cycle_count: Some(count.saturating_mul(cycles_per_frame)),
            ..Self::default()
        }
    }

    /// Run until the display reaches `scanline`.
    #[must_use]
    pub fn to_scanline(scanline: u16) -> Self {
        Self {
            kind: StepKind::SpecificScanline,
            break_scanline: Some(scanline),
            ..Self::default()
        }
    }

    /// Run until the CPU enters an interrupt handler.
    #[must_use]
    pub fn to_irq() -> Self {
        Self {
            kind: StepKind::RunToIrq,
            ..Self::default()
        }
    }

    /// Record a break. The first user source and the first exception source
    /// are both kept; later calls only raise the flags.
    pub fn break_now(&mut self, source: BreakSource) {
        if source.is_exception() {
            if self.exception_source == BreakSource::Unspecified {
                self.exception_source = source;
            }
            self.break_exception = true;
        } else {
            if self.source == BreakSource::Unspecified {
                self.source = source;
            }
            self.break_user = true;
        }
    }

    /// True once any break has been recorded.
    #[must_use]
    pub const fn break_needed(&self) -> bool {
        self.break_user || self.break_exception
    }

    /// The source to report for the recorded break. Exceptions win over
    /// user sources; an unspecified user break while a video step is armed
    /// reports as a video step.
    #[must_use]
    pub fn break_source(&self) -> BreakSource {
        if self.exception_source != BreakSource::Unspecified {
            return self.exception_source;
        }
        if self.source != BreakSource::Unspecified {
            return self.source;
        }
        if self.ppu_cycle_count.is_some() || self.break_scanline.is_some() {
            BreakSource::PpuStep
        } else {
            BreakSource::Unspecified
        }
    }

    /// Called once per executed instruction.
    pub fn process_exec(&mut self) {
        if let Some(count) = self.step_count {
            if count > 0 {
                let count = count - 1;
                self.step_count = Some(count);
                if count == 0 {
                    self.break_now(BreakSource::CpuStep);
                }
            }
        }
    }

    /// Called once per CPU cycle (in practice, per bus access).
    pub fn process_cpu_cycle(&mut self) {
        if let Some(count) = self.cycle_count {
            if count > 0 {
                let count = count - 1;
                self.cycle_count = Some(count);
                if count == 0 {
                    self.break_now(BreakSource::CpuStep);
                }
            }
        }
    }

    /// Called with the video cycles elapsed since the previous call. The
    /// budget may overshoot; the break fires on the first call that lands
    /// at or past zero.
    pub fn process_ppu_cycles(&mut self, count: u32) {
        if let Some(remaining) = self.ppu_cycle_count {
            if remaining > 0 {
                let remaining = remaining.saturating_sub(count);
                self.ppu_cycle_count = Some(remaining);
                if remaining == 0 {
                    self.break_now(BreakSource::PpuStep);
                }
            }
        }
    }

    /// Called when the display advances to a new scanline.
    pub fn process_scanline(&mut self, scanline: u16) {
        if self.break_scanline == Some(scanline) {
            self.break_now(BreakSource::PpuStep);
        }
    }

    /// Called when the CPU enters an interrupt handler.
    pub fn process_irq(&mut self) {
        if self.kind == StepKind::RunToIrq {
            self.break_now(BreakSource::Irq);
        }
    }

    /// True when a return landed exactly on the armed (pc, stack pointer)
    /// pair of a step-out or step-over request.
    #[must_use]
    pub fn matches_return(&self, pc: u16, sp: u16) -> bool {
        self.break_target == Some((pc, sp))
    }
}
