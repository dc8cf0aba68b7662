//! Hardware math unit.
//!
//! Four register groups, written a byte at a time:
//!
//! ```text
//!   ABCD ($FC52-$FC55)  multiply operands, AB x CD; divide quotient
//!   NP   ($FC56-$FC57)  divide divisor
//!   EFGH ($FC60-$FC63)  multiply product; divide dividend
//!   JKLM ($FC6C-$FC6F)  accumulator; divide remainder
//! ```
//!
//! Writing the high byte of an operand pair triggers the operation: MATHA
//! starts a multiply, MATHE starts a divide. Several low-byte writes clear
//! the adjacent byte (D clears C, B clears A, H clears G, F clears E,
//! M clears L, K clears J, P clears N), so operands are written low byte
//! first. Signed mode converts operands to magnitudes at write time and
//! tracks signs separately, with the documented hardware quirk that $8000
//! compares positive and $0000 negative.

use emu_core::Serializer;

pub(crate) struct MathUnit {
    pub(crate) abcd: u32,
    pub(crate) efgh: u32,
    pub(crate) jklm: u32,
    pub(crate) np: u16,
    ab_sign: i32,
    cd_sign: i32,
    efgh_sign: i32,
    /// SPRSYS bit 7: signed multiply.
    pub(crate) signed_mode: bool,
    /// SPRSYS bit 6: accumulate products into JKLM.
    pub(crate) accumulate: bool,
    pub(crate) in_progress: bool,
    pub(crate) overflow: bool,
    pub(crate) last_carry: bool,
}

impl MathUnit {
    pub(crate) fn new() -> Self {
        // All-ones at reset, as Handy does it; Stun Runner's startup math
        // depends on this.
        Self {
            abcd: 0xFFFF_FFFF,
            efgh: 0xFFFF_FFFF,
            jklm: 0xFFFF_FFFF,
            np: 0xFFFF,
            ab_sign: 1,
            cd_sign: 1,
            efgh_sign: 1,
            signed_mode: false,
            accumulate: false,
            in_progress: false,
            overflow: false,
            last_carry: false,
        }
    }

    /// Read one byte of the math register file (`$52-$57`, `$60-$63`,
    /// `$6C-$6F`).
    pub(crate) fn read(&self, addr: u8) -> u8 {
        match addr {
            0x52 => self.abcd as u8,
            0x53 => (self.abcd >> 8) as u8,
            0x54 => (self.abcd >> 16) as u8,
            0x55 => (self.abcd >> 24) as u8,
            0x56 => self.np as u8,
            0x57 => (self.np >> 8) as u8,
            0x60 => self.efgh as u8,
            0x61 => (self.efgh >> 8) as u8,
            0x62 => (self.efgh >> 16) as u8,
            0x63 => (self.efgh >> 24) as u8,
            0x6C => self.jklm as u8,
            0x6D => (self.jklm >> 8) as u8,
            0x6E => (self.jklm >> 16) as u8,
            0x6F => (self.jklm >> 24) as u8,
            _ => 0xFF,
        }
    }

    /// Write one byte of the math register file.
    pub(crate) fn write(&mut self, addr: u8, value: u8) {
        let value = u32::from(value);
        match addr {
            0x52 => {
                // MATHD, clears C
                self.abcd = (self.abcd & 0xFFFF_0000) | value;
                self.abcd &= 0xFFFF_00FF;
            }
            0x53 => {
                // MATHC, converts CD's sign in signed mode
                self.abcd = (self.abcd & 0xFFFF_00FF) | (value << 8);
                if self.signed_mode {
                    let (magnitude, sign) = convert_sign(self.abcd as u16);
                    self.cd_sign = sign;
                    self.abcd = (self.abcd & 0xFFFF_0000) | u32::from(magnitude);
                }
            }
            0x54 => {
                // MATHB, clears A
                self.abcd = (self.abcd & 0xFF00_FFFF) | (value << 16);
                self.abcd &= 0x00FF_FFFF;
            }
            0x55 => {
                // MATHA, converts AB's sign, then multiplies
                self.abcd = (self.abcd & 0x00FF_FFFF) | (value << 24);
                if self.signed_mode {
                    let (magnitude, sign) = convert_sign((self.abcd >> 16) as u16);
                    self.ab_sign = sign;
                    self.abcd = (self.abcd & 0x0000_FFFF) | (u32::from(magnitude) << 16);
                }
                self.multiply();
            }
            0x56 => self.np = value as u16, // MATHP, clears N
            0x57 => self.np = (self.np & 0x00FF) | ((value as u16) << 8),
            0x60 => {
                // MATHH, clears G
                self.efgh = (self.efgh & 0xFFFF_FF00) | value;
                self.efgh &= 0xFFFF_00FF;
            }
            0x61 => self.efgh = (self.efgh & 0xFFFF_00FF) | (value << 8),
            0x62 => {
                // MATHF, clears E
                self.efgh = (self.efgh & 0xFF00_FFFF) | (value << 16);
                self.efgh &= 0x00FF_FFFF;
            }
            0x63 => {
                // MATHE, then divides
                self.efgh = (self.efgh & 0x00FF_FFFF) | (value << 24);
                self.divide();
            }
            0x6C => {
                // MATHM, clears L and the overflow flag
                self.jklm = (self.jklm & 0xFFFF_FF00) | value;
                self.jklm &= 0xFFFF_00FF;
                self.overflow = false;
            }
            0x6D => self.jklm = (self.jklm & 0xFFFF_00FF) | (value << 8),
            0x6E => {
                // MATHK, clears J
                self.jklm = (self.jklm & 0xFF00_FFFF) | (value << 16);
                self.jklm &= 0x00FF_FFFF;
            }
            0x6F => self.jklm = (self.jklm & 0x00FF_FFFF) | (value << 24),
            _ => {}
        }
    }

    /// AB x CD into EFGH. The hardware multiplier is unsigned; signed mode
    /// negates the product when exactly one operand came in negative.
    fn multiply(&mut self) {
        self.in_progress = true;
        self.overflow = false;
        self.last_carry = false;

        let ab = (self.abcd >> 16) as u16;
        let cd = self.abcd as u16;
        self.efgh = u32::from(ab) * u32::from(cd);

        if self.signed_mode {
            self.efgh_sign = self.ab_sign + self.cd_sign;
            if self.efgh_sign == 0 {
                self.efgh = self.efgh.wrapping_neg();
            }
        }

        if self.accumulate {
            let (sum, carried) = self.jklm.overflowing_add(self.efgh);
            if carried {
                self.overflow = true;
                self.last_carry = true;
            }
            self.jklm = sum;
        }

        self.in_progress = false;
    }

    /// EFGH / NP, quotient into ABCD, remainder into JKLM. Always unsigned.
    fn divide(&mut self) {
        self.in_progress = true;
        self.overflow = false;
        self.last_carry = false;

        if self.np == 0 {
            self.abcd = 0xFFFF_FFFF;
            self.jklm = 0;
            self.overflow = true;
        } else {
            self.abcd = self.efgh / u32::from(self.np);
            self.jklm = self.efgh % u32::from(self.np);
        }

        self.in_progress = false;
    }

    pub(crate) fn serialize(&mut self, s: &mut Serializer) {
        s.u32(&mut self.abcd);
        s.u32(&mut self.efgh);
        s.u32(&mut self.jklm);
        s.u16(&mut self.np);
        s.i32(&mut self.ab_sign);
        s.i32(&mut self.cd_sign);
        s.i32(&mut self.efgh_sign);
        s.bool(&mut self.signed_mode);
        s.bool(&mut self.accumulate);
        s.bool(&mut self.in_progress);
        s.bool(&mut self.overflow);
        s.bool(&mut self.last_carry);
    }
}

/// The sign comparison the silicon actually performs: `(value - 1) & $8000`.
/// $8000 therefore counts as positive and $0000 as negative.
fn convert_sign(word: u16) -> (u16, i32) {
    if word.wrapping_sub(1) & 0x8000 != 0 {
        ((word ^ 0xFFFF).wrapping_add(1), -1)
    } else {
        (word, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_reset_to_all_ones() {
        let math = MathUnit::new();
        for addr in [0x52, 0x53, 0x54, 0x55, 0x56, 0x57] {
            assert_eq!(math.read(addr), 0xFF, "register {addr:#04x}");
        }
    }

    #[test]
    fn low_byte_writes_clear_their_neighbor() {
        let mut math = MathUnit::new();
        math.write(0x52, 0x22);
        math.write(0x53, 0x55);
        assert_eq!(math.read(0x53), 0x55);
        math.write(0x52, 0x11); // D clears C
        assert_eq!(math.read(0x53), 0x00);
        assert_eq!(math.read(0x52), 0x11);

        math.write(0x56, 0x04); // P clears N
        assert_eq!(math.read(0x57), 0x00);
        assert_eq!(math.read(0x56), 0x04);
    }

    #[test]
    fn unsigned_multiply() {
        let mut math = MathUnit::new();
        math.write(0x52, 0x02); // CD = $0002
        math.write(0x54, 0x00);
        math.write(0x55, 0x03); // AB = $0300, triggers
        assert_eq!(math.read(0x60), 0x00);
        assert_eq!(math.read(0x61), 0x06); // $0300 * $0002 = $0600
        assert_eq!(math.read(0x62), 0x00);
        assert_eq!(math.read(0x63), 0x00);
        assert!(!math.overflow);
    }

    #[test]
    fn signed_multiply_mixed_signs() {
        let mut math = MathUnit::new();
        math.signed_mode = true;
        math.write(0x52, 0x03); // CD = 3
        math.write(0x53, 0x00);
        math.write(0x54, 0xFE); // AB = $FFFE = -2
        math.write(0x55, 0xFF);
        // -2 * 3 = -6
        assert_eq!(math.read(0x60), 0xFA);
        assert_eq!(math.read(0x61), 0xFF);
        assert_eq!(math.read(0x62), 0xFF);
        assert_eq!(math.read(0x63), 0xFF);
    }

    #[test]
    fn signed_multiply_treats_8000_as_positive() {
        let mut math = MathUnit::new();
        math.signed_mode = true;
        math.write(0x52, 0x02); // CD = 2
        math.write(0x53, 0x00);
        math.write(0x54, 0x00); // AB = $8000, positive per the quirk
        math.write(0x55, 0x80);
        // $8000 * 2 = $10000, not sign-extended
        assert_eq!(math.read(0x60), 0x00);
        assert_eq!(math.read(0x61), 0x00);
        assert_eq!(math.read(0x62), 0x01);
        assert_eq!(math.read(0x63), 0x00);
    }

    #[test]
    fn accumulate_sums_products_and_flags_overflow() {
        let mut math = MathUnit::new();
        math.accumulate = true;
        math.write(0x6C, 0x00); // clear JKLM
        math.write(0x6E, 0x00);

        math.write(0x52, 0x03);
        math.write(0x54, 0x00);
        math.write(0x55, 0x02); // 2 * 3
        math.write(0x55, 0x02); // again
        assert_eq!(math.read(0x6C), 12);
        assert!(!math.overflow);

        // Saturate the accumulator, next product wraps it
        math.write(0x6C, 0xFF);
        math.write(0x6D, 0xFF);
        math.write(0x6E, 0xFF);
        math.write(0x6F, 0xFF);
        math.write(0x55, 0x02);
        assert_eq!(math.read(0x6C), 5, "$FFFFFFFF + 6 wraps");
        assert!(math.overflow);
        assert!(math.last_carry);

        // Writing MATHM clears the overflow flag
        math.write(0x6C, 0x00);
        assert!(!math.overflow);
    }

    #[test]
    fn divide_with_remainder() {
        let mut math = MathUnit::new();
        math.write(0x56, 0x02); // NP = 2
        math.write(0x60, 0x07); // EFGH = 7
        math.write(0x61, 0x00);
        math.write(0x62, 0x00);
        math.write(0x63, 0x00); // triggers
        assert_eq!(math.read(0x52), 3, "quotient");
        assert_eq!(math.read(0x6C), 1, "remainder");
    }

    #[test]
    fn divide_shifts_through_the_word() {
        let mut math = MathUnit::new();
        math.write(0x56, 0x04);
        math.write(0x60, 0x00); // EFGH = $00010000
        math.write(0x61, 0x00);
        math.write(0x62, 0x01);
        math.write(0x63, 0x00);
        assert_eq!(math.read(0x52), 0x00);
        assert_eq!(math.read(0x53), 0x40); // 65536 / 4 = $4000
        assert_eq!(math.read(0x6C), 0);
    }

    #[test]
    fn divide_by_zero_saturates() {
        let mut math = MathUnit::new();
        math.write(0x56, 0x00);
        math.write(0x60, 0x07);
        math.write(0x63, 0x00);
        assert_eq!(math.read(0x52), 0xFF);
        assert_eq!(math.read(0x55), 0xFF);
        assert_eq!(math.read(0x6C), 0, "remainder cleared");
        assert!(math.overflow);
    }
}
