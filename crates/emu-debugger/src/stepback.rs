//! Step-back planning.
//!
//! Stepping backwards is rewind-and-replay: while the debugger controls
//! execution the machine records a state snapshot every few hundred cycles,
//! and stepping back picks the latest snapshot at or before the target
//! clock. The machine restores it and replays forward deterministically;
//! the planner only stores blobs and does the clock arithmetic.

use std::collections::VecDeque;

/// Default distance between recorded snapshots, in CPU cycles. Small
/// enough that replaying to any instruction stays instant.
const DEFAULT_QUANTUM: u64 = 600;

/// History bound. At the default quantum this covers a few frames.
const MAX_SNAPSHOTS: usize = 256;

/// How far one step-back request travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBackKind {
    /// To just before the last executed instruction.
    Instruction,
    /// One scanline's worth of cycles back.
    Scanline,
    /// One frame's worth of cycles back.
    Frame,
}

/// Clock geometry the planner needs from the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBackConfig {
    pub current_cycle: u64,
    pub cycles_per_scanline: u64,
    pub cycles_per_frame: u64,
}

/// A resolved step-back: restore `state`, then replay until the CPU clock
/// reaches `target_clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBackPlan<'a> {
    pub state: &'a [u8],
    /// Clock at which `state` was captured.
    pub snapshot_clock: u64,
    pub target_clock: u64,
}

/// Snapshot store and target arithmetic for step-back.
#[derive(Debug)]
pub struct StepBackPlanner {
    quantum: u64,
    /// (clock, serialized state), oldest first.
    snapshots: VecDeque<(u64, Vec<u8>)>,
    last_clock: Option<u64>,
}

impl Default for StepBackPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl StepBackPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            snapshots: VecDeque::new(),
            last_clock: None,
        }
    }

    /// Change the snapshot cadence. Takes effect from the next record.
    pub fn set_quantum(&mut self, cycles: u64) {
        self.quantum = cycles.max(1);
    }

    /// Offer a snapshot opportunity. `state` is only invoked when a full
    /// quantum has elapsed since the last recorded snapshot, so the caller
    /// can pass its serializer without serializing every instruction.
    pub fn record(&mut self, clock: u64, state: impl FnOnce() -> Vec<u8>) {
        let due = self
            .last_clock
            .is_none_or(|last| clock.saturating_sub(last) >= self.quantum);
        if !due {
            return;
        }
        self.snapshots.push_back((clock, state()));
        if self.snapshots.len() > MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
        self.last_clock = Some(clock);
    }

    /// Resolve a step-back request. Returns `None` when the target lies
    /// before recorded history (or before power-on). On success, snapshots
    /// past the chosen one are dropped; the replay will re-record them.
    pub fn plan(&mut self, kind: StepBackKind, config: &StepBackConfig) -> Option<StepBackPlan<'_>> {
        let target = match kind {
            StepBackKind::Instruction => config.current_cycle.checked_sub(1),
            StepBackKind::Scanline => config.current_cycle.checked_sub(config.cycles_per_scanline),
            StepBackKind::Frame => config.current_cycle.checked_sub(config.cycles_per_frame),
        }?;

        let pos = self
            .snapshots
            .iter()
            .rposition(|&(clock, _)| clock <= target)?;
        self.snapshots.truncate(pos + 1);

        let (clock, state) = self.snapshots.back()?;
        self.last_clock = Some(*clock);
        Some(StepBackPlan {
            state,
            snapshot_clock: *clock,
            target_clock: target,
        })
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.last_clock = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
