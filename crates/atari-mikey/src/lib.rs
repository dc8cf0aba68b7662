//! Mikey, the Lynx's timer, interrupt, display and sound controller.
//!
//! Mikey occupies `$FD00-$FDFF`: eight cascadable countdown timers that
//! double as the scanline and frame generators, the interrupt controller,
//! display DMA with a 16-entry 12-bit palette, the ComLynx UART clocked
//! off timer 4, and four LFSR audio channels.
//!
//! The chip is driven by [`Mikey::tick`] with the current CPU cycle count;
//! timers catch up arithmetically rather than cycle-stepping. Interrupts
//! are exposed as a level on [`Mikey::irq_line`] for the caller to feed to
//! the CPU, and a `CPUSLEEP` write parks a request the caller collects
//! with [`Mikey::take_sleep_request`].

mod audio;
mod display;
mod mikey;
mod timers;
mod uart;

pub use audio::Apu;
pub use mikey::Mikey;

/// Master clock in Hz. The CPU runs at a quarter of this.
pub const MASTER_CLOCK_RATE: u32 = 16_000_000;
/// Visible pixels per scanline.
pub const SCREEN_WIDTH: usize = 160;
/// Visible scanlines.
pub const SCREEN_HEIGHT: usize = 102;
/// Total scanlines per frame, including vertical blank.
pub const SCANLINE_COUNT: u16 = 105;
/// Bytes per scanline in the 4bpp packed display buffer.
pub const BYTES_PER_SCANLINE: usize = 80;
