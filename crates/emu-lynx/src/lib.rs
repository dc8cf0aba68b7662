//! The Atari Lynx as a machine.
//!
//! This crate assembles the chip crates into a console: the 65C02 behind
//! the MAPCTL overlay bus, Mikey catching up after every instruction, Suzy
//! stalling the CPU when its sprite engine owns the bus, and the cartridge
//! hanging off Suzy's serial port. On top of that sit the host surfaces:
//! frame/audio/input handoff, save states, battery persistence, and the
//! full debugger (breakpoints, stepping, callstack, trace, CDL, events,
//! step-back).
//!
//! ```no_run
//! use emu_lynx::{LynxConfig, LynxConsole};
//!
//! let config = LynxConfig::new(std::fs::read("game.lnx").unwrap());
//! let mut lynx = LynxConsole::new(&config).unwrap();
//! lynx.run_frame();
//! let frame = lynx.frame();
//! assert_eq!(frame.width, 160);
//! ```

mod config;
mod console;
mod debugger;
mod input;
mod memory;

pub use config::{LynxConfig, LynxModel};
pub use console::{FrameStatus, LynxConsole};
pub use debugger::{DebuggerConfig, LynxDebugger};
pub use input::{InputEvent, InputQueue, Joypad, LynxButton};
pub use memory::LynxBus;

// The types that cross the console's public surface.
pub use emu_core::Rotation;
pub use emu_debugger::{BreakEvent, BreakSource, Breakpoint, Cheat, StepBackKind, StepKind};
pub use lynx_cartridge::EepromKind;

/// CPU cycles per scanline: 4 MHz over 75 Hz times 105 lines.
pub const CPU_CYCLES_PER_SCANLINE: u64 = 507;
/// CPU cycles per 105-line frame.
pub const CPU_CYCLES_PER_FRAME: u64 = CPU_CYCLES_PER_SCANLINE * 105;
/// Nominal frame rate.
pub const FPS: f64 = 75.0;
