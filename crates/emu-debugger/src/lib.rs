//! Console-agnostic debugger toolkit.
//!
//! Everything here is driven by the machine's bus hooks: the memory manager
//! reports each access as a [`MemoryOperation`](emu_core::MemoryOperation)
//! plus the absolute address behind it, and the pieces in this crate turn
//! that stream into breakpoints, callstacks, profiles, coverage logs and
//! trace rows. Nothing touches a bus directly, so the same toolkit serves
//! any machine that can describe its accesses.
//!
//! The hot-path types ([`StepRequest`], [`Breakpoints`], [`Cheats`],
//! [`FrozenAddresses`]) are written to cost near nothing when idle; a
//! machine embeds them unconditionally and only pays when a tool is armed.

mod breakpoints;
mod callstack;
mod cdl;
mod cheats;
mod events;
mod frozen;
mod profiler;
mod step;
mod stepback;
mod trace;

pub use breakpoints::{Breakpoint, Breakpoints, EvalContext, RpnOp, RpnProgram};
pub use callstack::{Callstack, StackFrame, StackFrameFlags};
pub use cdl::{
    CdlFlags, CdlLoadError, CdlRecorder, CdlStatistics, CdlStrip, CodeDataLogger, CDL_MAGIC,
};
pub use cheats::{Cheat, Cheats};
pub use events::{DebugEvent, DebugEventType, EventLog};
pub use frozen::FrozenAddresses;
pub use profiler::{ProfiledFunction, Profiler};
pub use step::{BreakEvent, BreakSource, StepKind, StepRequest};
pub use stepback::{StepBackConfig, StepBackKind, StepBackPlan, StepBackPlanner};
pub use trace::{TraceLogger, TraceRow};
