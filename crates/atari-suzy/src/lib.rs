//! Suzy, the Lynx's sprite and math coprocessor.
//!
//! Suzy occupies `$FC00-$FCFF` and bundles three unrelated jobs: a sprite
//! engine that renders directly into work RAM (stalling the CPU while it
//! owns the bus), a 16x16 multiply / 32/16 divide unit with byte-serial
//! register access, and the joystick, switch, and cartridge-port registers.
//!
//! The chip never raises interrupts and has no clock of its own here:
//! sprite processing runs to completion inside the register write that
//! starts it, and the bus cycles it consumed are handed back to the caller
//! as a CPU stall.

mod math;
mod sprites;
mod suzy;

pub use suzy::Suzy;

/// Visible pixels per scanline.
pub const SCREEN_WIDTH: usize = 160;
/// Visible scanlines.
pub const SCREEN_HEIGHT: usize = 102;
/// Bytes per scanline in the 4bpp packed framebuffer.
pub const BYTES_PER_SCANLINE: usize = 80;
