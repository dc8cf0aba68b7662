//! 93Cx6 Microwire serial EEPROM used by some cartridges for saves.
//!
//! The chip hangs off three Mikey IODAT lines: chip select, clock, and data
//! in; data out is read back through the same port. A command is framed by
//! chip select going high and consists of a start bit (always 1), a 2-bit
//! opcode, an address whose width depends on the chip, and for some opcodes
//! 16 data bits:
//!
//! ```text
//!   1 10 aaaaaa           READ   word appears on DO, MSB first, after a 0
//!   1 01 aaaaaa dddd...   WRITE  16 data bits follow the address
//!   1 11 aaaaaa           ERASE  word becomes 0xFFFF
//!   1 00 00xxxx           EWDS   disable writes
//!   1 00 01xxxx dddd...   WRAL   write all words
//!   1 00 10xxxx           ERAL   erase all words
//!   1 00 11xxxx           EWEN   enable writes
//! ```
//!
//! Writes and erases are gated by the EWEN/EWDS latch, which powers up
//! disabled. The erased state of every word is 0xFFFF.

use emu_core::{BatteryError, BatteryStore, Serializer, Snapshot};

/// EEPROM chip fitted to the cartridge, if any.
///
/// The discriminants match the chip field in the LNX header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EepromKind {
    #[default]
    None = 0,
    Eeprom93c46 = 1,
    Eeprom93c56 = 2,
    Eeprom93c66 = 3,
    Eeprom93c76 = 4,
    Eeprom93c86 = 5,
}

impl EepromKind {
    /// Storage size in bytes (the chips hold 16-bit words).
    #[must_use]
    pub const fn data_size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Eeprom93c46 => 128,
            Self::Eeprom93c56 => 256,
            Self::Eeprom93c66 => 512,
            Self::Eeprom93c76 => 1024,
            Self::Eeprom93c86 => 2048,
        }
    }

    /// Number of address bits clocked in after the opcode.
    #[must_use]
    pub const fn address_bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Eeprom93c46 => 6,
            Self::Eeprom93c56 => 7,
            Self::Eeprom93c66 => 8,
            Self::Eeprom93c76 => 9,
            Self::Eeprom93c86 => 10,
        }
    }

    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Eeprom93c46,
            2 => Self::Eeprom93c56,
            3 => Self::Eeprom93c66,
            4 => Self::Eeprom93c76,
            5 => Self::Eeprom93c86,
            _ => Self::None,
        }
    }

    /// Decode the LNX header EEPROM byte. Bits 0-2 select the chip; bit 6
    /// (SD card) and bit 7 (8-bit organisation) are not supported and are
    /// ignored.
    #[must_use]
    pub const fn from_header_byte(byte: u8) -> Self {
        Self::from_u8(byte & 0x07)
    }
}

/// Serial protocol state machine phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
    #[default]
    Idle = 0,
    ReceivingOpcode = 1,
    ReceivingAddress = 2,
    ReceivingData = 3,
    SendingData = 4,
}

impl Phase {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ReceivingOpcode,
            2 => Self::ReceivingAddress,
            3 => Self::ReceivingData,
            4 => Self::SendingData,
            _ => Self::Idle,
        }
    }
}

/// One Microwire EEPROM chip.
pub struct Eeprom {
    kind: EepromKind,
    phase: Phase,
    opcode: u16,
    address: u16,
    data_buffer: u16,
    bit_count: u8,
    write_enabled: bool,
    cs_active: bool,
    data_out: bool,
    data: Vec<u8>,
}

impl Eeprom {
    #[must_use]
    pub fn new(kind: EepromKind) -> Self {
        Self {
            kind,
            phase: Phase::Idle,
            opcode: 0,
            address: 0,
            data_buffer: 0,
            bit_count: 0,
            write_enabled: false,
            cs_active: false,
            // DO idles high
            data_out: true,
            data: vec![0xFF; kind.data_size()],
        }
    }

    #[must_use]
    pub fn kind(&self) -> EepromKind {
        self.kind
    }

    /// Current state of the DO pin, without clocking.
    #[must_use]
    pub fn data_out(&self) -> bool {
        self.data_out
    }

    fn word_count(&self) -> u16 {
        (self.data.len() / 2) as u16
    }

    fn read_word(&self, word_addr: u16) -> u16 {
        if word_addr >= self.word_count() {
            return 0xFFFF;
        }
        let at = usize::from(word_addr) * 2;
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    fn write_word(&mut self, word_addr: u16, value: u16) {
        if word_addr >= self.word_count() || !self.write_enabled {
            return;
        }
        let at = usize::from(word_addr) * 2;
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Drive the chip select line. A rising edge starts a fresh command, a
    /// falling edge aborts whatever was in flight.
    pub fn set_chip_select(&mut self, active: bool) {
        if active && !self.cs_active {
            self.phase = Phase::ReceivingOpcode;
            self.opcode = 0;
            self.address = 0;
            self.data_buffer = 0;
            self.bit_count = 0;
            self.data_out = true;
        } else if !active && self.cs_active {
            self.phase = Phase::Idle;
        }
        self.cs_active = active;
    }

    /// Clock one bit in on DI and return the resulting DO state.
    pub fn clock_data(&mut self, data_in: bool) -> bool {
        if !self.cs_active || self.kind == EepromKind::None {
            return self.data_out;
        }

        let bit = u16::from(data_in);
        match self.phase {
            Phase::ReceivingOpcode => {
                // Start bit plus 2-bit opcode. A 0 start bit is not a
                // command, the chip just goes back to sleep.
                self.opcode = (self.opcode << 1) | bit;
                self.bit_count += 1;
                if self.bit_count == 3 {
                    if self.opcode & 0x04 == 0 {
                        self.phase = Phase::Idle;
                    } else {
                        self.opcode &= 0x03;
                        self.bit_count = 0;
                        self.phase = Phase::ReceivingAddress;
                    }
                }
            }
            Phase::ReceivingAddress => {
                self.address = (self.address << 1) | bit;
                self.bit_count += 1;
                if self.bit_count >= self.kind.address_bits() {
                    self.bit_count = 0;
                    self.execute_command();
                }
            }
            Phase::ReceivingData => {
                // 16 data bits for WRITE or WRAL.
                self.data_buffer = (self.data_buffer << 1) | bit;
                self.bit_count += 1;
                if self.bit_count >= 16 {
                    if self.opcode == 0x01 {
                        self.write_word(self.address, self.data_buffer);
                    } else {
                        let value = self.data_buffer;
                        for word in 0..self.word_count() {
                            self.write_word(word, value);
                        }
                    }
                    self.data_out = true;
                    self.phase = Phase::Idle;
                }
            }
            Phase::SendingData => {
                // Word goes out MSB first.
                self.data_out = self.data_buffer & 0x8000 != 0;
                self.data_buffer <<= 1;
                self.bit_count += 1;
                if self.bit_count >= 16 {
                    self.phase = Phase::Idle;
                }
            }
            Phase::Idle => {}
        }

        self.data_out
    }

    fn execute_command(&mut self) {
        let addr_bits = self.kind.address_bits();
        let addr = self.address & ((1u16 << addr_bits) - 1);

        match self.opcode {
            0x02 => {
                // READ, with a dummy 0 bit on DO ahead of the data
                self.data_buffer = self.read_word(addr);
                self.bit_count = 0;
                self.data_out = false;
                self.phase = Phase::SendingData;
            }
            0x01 => {
                // WRITE needs 16 more bits
                self.data_buffer = 0;
                self.bit_count = 0;
                self.phase = Phase::ReceivingData;
            }
            0x03 => {
                if self.write_enabled {
                    self.write_word(addr, 0xFFFF);
                }
                self.data_out = true;
                self.phase = Phase::Idle;
            }
            _ => {
                // Extended commands select on the top two address bits.
                match (addr >> (addr_bits - 2)) & 0x03 {
                    0x00 => {
                        self.write_enabled = false;
                        self.phase = Phase::Idle;
                    }
                    0x01 => {
                        // WRAL needs 16 more bits
                        self.data_buffer = 0;
                        self.bit_count = 0;
                        self.phase = Phase::ReceivingData;
                    }
                    0x02 => {
                        if self.write_enabled {
                            for word in 0..self.word_count() {
                                self.write_word(word, 0xFFFF);
                            }
                        }
                        self.phase = Phase::Idle;
                    }
                    _ => {
                        self.write_enabled = true;
                        self.phase = Phase::Idle;
                    }
                }
            }
        }
    }

    /// Restore saved contents, if the store has any.
    ///
    /// # Errors
    ///
    /// Propagates store I/O failure.
    pub fn load_battery(&mut self, store: &mut dyn BatteryStore) -> Result<(), BatteryError> {
        if !self.data.is_empty() {
            store.load("eeprom", &mut self.data)?;
        }
        Ok(())
    }

    /// Persist current contents.
    ///
    /// # Errors
    ///
    /// Propagates store I/O failure.
    pub fn save_battery(&self, store: &mut dyn BatteryStore) -> Result<(), BatteryError> {
        if !self.data.is_empty() {
            store.save("eeprom", &self.data)?;
        }
        Ok(())
    }
}

impl Snapshot for Eeprom {
    fn serialize(&mut self, s: &mut Serializer) {
        let mut kind = self.kind as u8;
        let mut phase = self.phase as u8;
        s.u8(&mut kind);
        s.u8(&mut phase);
        s.u16(&mut self.opcode);
        s.u16(&mut self.address);
        s.u16(&mut self.data_buffer);
        s.u8(&mut self.bit_count);
        s.bool(&mut self.write_enabled);
        s.bool(&mut self.cs_active);
        s.bool(&mut self.data_out);
        s.bytes(&mut self.data);
        if !s.is_saving() {
            self.kind = EepromKind::from_u8(kind);
            self.phase = Phase::from_u8(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use emu_core::MemoryBatteryStore;

    use super::*;

    /// Clock `count` bits of `value` in, MSB first.
    fn send_bits(eeprom: &mut Eeprom, value: u32, count: u8) {
        for i in (0..count).rev() {
            eeprom.clock_data((value >> i) & 1 != 0);
        }
    }

    /// Clock `count` bits out with DI held low.
    fn read_bits(eeprom: &mut Eeprom, count: u8) -> u16 {
        let mut out = 0;
        for _ in 0..count {
            out = (out << 1) | u16::from(eeprom.clock_data(false));
        }
        out
    }

    /// Start bit + opcode + 6-bit address for a 93C46.
    fn command(opcode: u32, address: u32) -> u32 {
        (1 << 8) | (opcode << 6) | address
    }

    fn begin(eeprom: &mut Eeprom) {
        eeprom.set_chip_select(false);
        eeprom.set_chip_select(true);
    }

    fn write_enable(eeprom: &mut Eeprom) {
        begin(eeprom);
        send_bits(eeprom, command(0b00, 0b11_0000), 9);
    }

    #[test]
    fn read_returns_erased_word_with_dummy_zero() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        assert!(eeprom.data_out(), "DO idles high");

        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 3), 9);
        assert!(!eeprom.data_out(), "dummy 0 bit precedes the data");
        assert_eq!(read_bits(&mut eeprom, 16), 0xFFFF, "erased word is all 1s");
    }

    #[test]
    fn write_needs_enable_first() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);

        // WRITE without EWEN: all 16 bits consumed, nothing stored
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b01, 5), 9);
        send_bits(&mut eeprom, 0xABCD, 16);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 5), 9);
        assert_eq!(read_bits(&mut eeprom, 16), 0xFFFF);

        write_enable(&mut eeprom);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b01, 5), 9);
        send_bits(&mut eeprom, 0xABCD, 16);
        assert!(eeprom.data_out(), "DO signals ready after the write");

        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 5), 9);
        assert_eq!(read_bits(&mut eeprom, 16), 0xABCD);
    }

    #[test]
    fn erase_respects_write_disable() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        write_enable(&mut eeprom);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b01, 2), 9);
        send_bits(&mut eeprom, 0x1234, 16);

        // EWDS, then ERASE does nothing
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b00, 0b00_0000), 9);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b11, 2), 9);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 2), 9);
        assert_eq!(read_bits(&mut eeprom, 16), 0x1234, "erase while disabled");

        write_enable(&mut eeprom);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b11, 2), 9);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 2), 9);
        assert_eq!(read_bits(&mut eeprom, 16), 0xFFFF, "erase while enabled");
    }

    #[test]
    fn write_all_fills_every_word() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        write_enable(&mut eeprom);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b00, 0b01_0000), 9);
        send_bits(&mut eeprom, 0x5A5A, 16);

        for addr in [0u32, 17, 63] {
            begin(&mut eeprom);
            send_bits(&mut eeprom, command(0b10, addr), 9);
            assert_eq!(read_bits(&mut eeprom, 16), 0x5A5A, "word {addr}");
        }
    }

    #[test]
    fn zero_start_bit_is_ignored() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        begin(&mut eeprom);
        // Start bit 0: the rest of the clocks fall on deaf ears
        send_bits(&mut eeprom, command(0b10, 3) & !(1 << 8), 9);
        send_bits(&mut eeprom, 0xFFFF, 16);
        assert!(eeprom.data_out(), "no read was started");

        // A fresh chip select recovers
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 3), 9);
        assert_eq!(read_bits(&mut eeprom, 16), 0xFFFF);
    }

    #[test]
    fn chip_select_drop_aborts_command() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        write_enable(&mut eeprom);

        // Drop CS halfway through a WRITE's data phase
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b01, 7), 9);
        send_bits(&mut eeprom, 0xAB, 8);
        eeprom.set_chip_select(false);

        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b10, 7), 9);
        assert_eq!(read_bits(&mut eeprom, 16), 0xFFFF, "aborted write stored nothing");
    }

    #[test]
    fn none_kind_ignores_clocks() {
        let mut eeprom = Eeprom::new(EepromKind::None);
        begin(&mut eeprom);
        assert!(eeprom.clock_data(true));
        assert!(eeprom.clock_data(false));
        assert!(eeprom.data_out());
    }

    #[test]
    fn battery_round_trip() {
        let mut store = MemoryBatteryStore::new();

        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        write_enable(&mut eeprom);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b01, 9), 9);
        send_bits(&mut eeprom, 0xBEEF, 16);
        eeprom.save_battery(&mut store).unwrap();

        let mut restored = Eeprom::new(EepromKind::Eeprom93c46);
        restored.load_battery(&mut store).unwrap();
        begin(&mut restored);
        send_bits(&mut restored, command(0b10, 9), 9);
        assert_eq!(read_bits(&mut restored, 16), 0xBEEF);
    }

    #[test]
    fn snapshot_preserves_transaction_in_flight() {
        let mut eeprom = Eeprom::new(EepromKind::Eeprom93c46);
        write_enable(&mut eeprom);
        begin(&mut eeprom);
        send_bits(&mut eeprom, command(0b01, 4), 9);
        send_bits(&mut eeprom, 0x12, 8); // first half of 0x12CD

        let mut s = Serializer::writer();
        eeprom.serialize(&mut s);
        let bytes = s.finish();

        let mut restored = Eeprom::new(EepromKind::Eeprom93c46);
        let mut r = Serializer::reader(bytes);
        restored.serialize(&mut r);
        assert!(!r.has_failed());

        // Finish the write on the restored chip
        send_bits(&mut restored, 0xCD, 8);
        begin(&mut restored);
        send_bits(&mut restored, command(0b10, 4), 9);
        assert_eq!(read_bits(&mut restored, 16), 0x12CD);
    }
}
