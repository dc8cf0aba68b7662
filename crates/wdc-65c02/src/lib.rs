//! Instruction-stepped WDC 65C02 CPU emulator.
//!
//! The 65C02 performs one bus access per cycle, so timing falls out of the
//! access sequence: `step()` executes one complete instruction and returns
//! the cycles it consumed. Covers the full 65C02 opcode set including WAI,
//! STP, the `(zp)` addressing mode, and the fixed decimal-mode flags.

mod cpu;
mod disasm;
pub mod flags;
mod registers;

pub use cpu::{IrqEntry, StopState, Wdc65c02};
pub use disasm::{disassemble, mnemonic, op_size};
pub use flags::Status;
pub use registers::Registers;
