//! 65C02 register file.

use crate::Status;
use crate::flags::{I, U};

/// Stack page base. S indexes into this page and grows downward.
const STACK_PAGE: u16 = 0x0100;

/// The 65C02 register file.
///
/// Same programmer model as the NMOS 6502: an 8-bit accumulator, two 8-bit
/// index registers, a one-page stack pointer, the 16-bit program counter
/// and the status byte. Anything wider lives in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Stack pointer, the next free slot in the $0100 page.
    pub s: u8,
    pub pc: u16,
    /// Status flags.
    pub p: Status,
}

impl Registers {
    /// Power-on state.
    ///
    /// The CMOS core comes out of reset with I set and D clear (the NMOS
    /// part left D undefined). A, X and Y start at zero here; S sits at
    /// $FD after the three phantom pushes of the reset sequence. PC is
    /// loaded from the reset vector by the caller.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            pc: 0,
            p: Status(U | I),
        }
    }

    /// Address for a push. S moves down past the slot being written.
    pub fn push(&mut self) -> u16 {
        let addr = STACK_PAGE | u16::from(self.s);
        self.s = self.s.wrapping_sub(1);
        addr
    }

    /// Address for a pull. S moves up onto the slot being read.
    pub fn pop(&mut self) -> u16 {
        self.s = self.s.wrapping_add(1);
        STACK_PAGE | u16::from(self.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_wraps_within_its_page() {
        let mut regs = Registers::new();
        regs.s = 0x00;
        assert_eq!(regs.push(), 0x0100);
        assert_eq!(regs.s, 0xFF);
        assert_eq!(regs.pop(), 0x0100);
        assert_eq!(regs.s, 0x00);
    }
}
