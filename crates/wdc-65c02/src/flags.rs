//! Status register bits and the masking rules for moving P through the
//! stack.
//!
//! B and U have no storage in the register; they only exist in the byte
//! image pushed by PHP, BRK and interrupt entry. The helpers here apply
//! the 65C02's masking so the execution core never touches raw bit masks.

/// Carry.
pub const C: u8 = 0x01;

/// Zero.
pub const Z: u8 = 0x02;

/// IRQ disable. Maskable interrupts are held off while set.
pub const I: u8 = 0x04;

/// Decimal mode. ADC and SBC operate on BCD digits while set; the CMOS
/// core clears it on BRK and interrupt entry.
pub const D: u8 = 0x08;

/// Break. Only present in pushed status bytes: set by PHP and BRK, clear
/// on IRQ entry.
pub const B: u8 = 0x10;

/// Unused bit 5, reads as 1 in every pushed byte.
pub const U: u8 = 0x20;

/// Overflow, from signed arithmetic and BIT bit 6.
pub const V: u8 = 0x40;

/// Negative, mirrors bit 7 of the last result.
pub const N: u8 = 0x80;

/// Processor status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    /// Status from a byte pulled off the stack. B is discarded and U
    /// forced on, the same masking PLP and RTI apply.
    #[must_use]
    pub const fn from_byte(value: u8) -> Self {
        Self((value & 0xCF) | U)
    }

    /// Byte image pushed by PHP and BRK, with B and U both set.
    #[must_use]
    pub const fn push_byte(self) -> u8 {
        self.0 | U | B
    }

    /// Byte image pushed on IRQ entry, with U set and B clear.
    #[must_use]
    pub const fn irq_byte(self) -> u8 {
        (self.0 | U) & !B
    }

    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub const fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub const fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// Set or clear `flag` from a condition.
    pub const fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// Refresh N and Z from a result byte.
    pub const fn update_nz(&mut self, value: u8) {
        self.set_if(N, value & 0x80 != 0);
        self.set_if(Z, value == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_discards_b_and_forces_u() {
        let status = Status::from_byte(0xFF);
        assert_eq!(status.0, 0xEF);
        let status = Status::from_byte(0x00);
        assert_eq!(status.0, U);
    }

    #[test]
    fn pushed_bytes_differ_only_in_b() {
        let status = Status::from_byte(C | N);
        assert_eq!(status.push_byte(), C | N | U | B);
        assert_eq!(status.irq_byte(), C | N | U);
    }
}
