//! Function-level profiler.
//!
//! Driven entirely by callstack pushes and pops: cycles since the previous
//! event are attributed to the function that was running, exclusively to it
//! and inclusively to every open caller. Interrupt frames fence the
//! inclusive walk so handler time lands on the interrupted function but not
//! on the callers it happened to interrupt.

use std::collections::{HashMap, VecDeque};

use emu_core::AddressInfo;

use crate::callstack::StackFrameFlags;

/// Open-call depth limit. Programs that jump into subroutines without
/// balanced calls would otherwise grow the stack without bound.
const MAX_DEPTH: usize = 100;

/// Map key of the top-level pseudo-function that owns cycles spent outside
/// any recorded call.
const ROOT_KEY: u32 = u32::MAX;

/// Accumulated statistics for one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfiledFunction {
    /// Entry point; `None` for the top-level pseudo-function.
    pub address: Option<AddressInfo>,
    /// Cycles spent in the function itself.
    pub exclusive_cycles: u64,
    /// Cycles spent in the function and everything it called.
    pub inclusive_cycles: u64,
    pub call_count: u64,
    /// Cheapest completed activation; `u64::MAX` until one returns.
    pub min_cycles: u64,
    /// Most expensive completed activation.
    pub max_cycles: u64,
    /// How the last activation was entered.
    pub flags: StackFrameFlags,
}

impl ProfiledFunction {
    fn new(address: Option<AddressInfo>) -> Self {
        Self {
            address,
            exclusive_cycles: 0,
            inclusive_cycles: 0,
            call_count: 0,
            min_cycles: u64::MAX,
            max_cycles: 0,
            flags: StackFrameFlags::None,
        }
    }
}

/// A suspended caller.
#[derive(Debug, Clone, Copy)]
struct OpenFrame {
    /// Function that was running when the call happened.
    caller: u32,
    /// Cycles the caller had accumulated in its current activation.
    saved_cycles: u64,
    /// Flags of the call that suspended the caller.
    flags: StackFrameFlags,
}

/// Cycle accounting per function, keyed by absolute entry address.
#[derive(Debug)]
pub struct Profiler {
    functions: HashMap<u32, ProfiledFunction>,
    open: VecDeque<OpenFrame>,
    /// Key of the function currently executing.
    current: u32,
    /// Cycles of the current activation, across interior calls.
    current_cycles: u64,
    prev_clock: u64,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    #[must_use]
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        functions.insert(ROOT_KEY, ProfiledFunction::new(None));
        Self {
            functions,
            open: VecDeque::new(),
            current: ROOT_KEY,
            current_cycles: 0,
            prev_clock: 0,
        }
    }

    /// Record a call into `address`. Calls through unmapped addresses are
    /// not profiled.
    pub fn stack_function(
        &mut self,
        address: Option<AddressInfo>,
        flags: StackFrameFlags,
        clock: u64,
    ) {
        let Some(address) = address else {
            return;
        };
        let key = address.key();
        self.update_cycles(clock);

        self.open.push_back(OpenFrame {
            caller: self.current,
            saved_cycles: self.current_cycles,
            flags,
        });
        if self.open.len() > MAX_DEPTH {
            self.open.pop_front();
        }

        let func = self
            .functions
            .entry(key)
            .or_insert_with(|| ProfiledFunction::new(Some(address)));
        func.call_count += 1;
        func.flags = flags;

        self.current = key;
        self.current_cycles = 0;
    }

    /// Record a return from the current function.
    pub fn unstack_function(&mut self, clock: u64) {
        if self.open.is_empty() {
            return;
        }
        self.update_cycles(clock);

        if let Some(func) = self.functions.get_mut(&self.current) {
            func.min_cycles = func.min_cycles.min(self.current_cycles);
            func.max_cycles = func.max_cycles.max(self.current_cycles);
        }
        if let Some(frame) = self.open.pop_back() {
            self.current = frame.caller;
            self.current_cycles += frame.saved_cycles;
        }
    }

    fn update_cycles(&mut self, clock: u64) {
        let gap = clock.saturating_sub(self.prev_clock);

        if let Some(func) = self.functions.get_mut(&self.current) {
            func.exclusive_cycles += gap;
            func.inclusive_cycles += gap;
        }
        for frame in self.open.iter().rev() {
            if let Some(func) = self.functions.get_mut(&frame.caller) {
                func.inclusive_cycles += gap;
            }
            if frame.flags != StackFrameFlags::None {
                // Callers suspended before an interrupt don't own the
                // handler's time.
                break;
            }
        }

        self.current_cycles += gap;
        self.prev_clock = clock;
    }

    /// Forget the open calls without touching accumulated totals. Used
    /// after a CPU reset, when the recorded stack no longer exists.
    pub fn reset_state(&mut self, clock: u64) {
        self.prev_clock = clock;
        self.current_cycles = 0;
        self.open.clear();
        self.current = ROOT_KEY;
    }

    /// Drop all accumulated data.
    pub fn reset(&mut self, clock: u64) {
        self.functions.clear();
        self.functions.insert(ROOT_KEY, ProfiledFunction::new(None));
        self.reset_state(clock);
    }

    /// Bring accounting up to `clock` and return every function, sorted by
    /// entry address with the top-level entry last.
    pub fn snapshot(&mut self, clock: u64) -> Vec<ProfiledFunction> {
        self.update_cycles(clock);
        let mut list: Vec<ProfiledFunction> = self.functions.values().copied().collect();
        list.sort_unstable_by_key(|func| func.address.map_or(u64::MAX, |a| u64::from(a.key())));
        list
    }
}
