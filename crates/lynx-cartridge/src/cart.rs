//! Cartridge ROM access and banking.
//!
//! The cart has no address bus of its own. Suzy drives an address counter
//! through two strobe registers, and every CARTDATA read returns the byte
//! at the counter and bumps it. Two banks with independent geometry share
//! the counter; the CART0/CART1 select lines pick which one answers.

use emu_core::{LoadRomError, Rotation, Serializer, Snapshot};

use crate::database;
use crate::eeprom::EepromKind;
use crate::header::{LNX_HEADER_SIZE, LnxHeader};

/// Cartridge metadata, from the LNX header and the game database.
#[derive(Debug, Clone)]
pub struct CartInfo {
    pub name: String,
    pub manufacturer: String,
    /// ROM payload size in bytes, header excluded.
    pub rom_size: u32,
    /// Bank sizes in 256-byte pages.
    pub bank0_pages: u16,
    pub bank1_pages: u16,
    pub rotation: Rotation,
    pub eeprom: EepromKind,
    pub version: u16,
    /// CRC32 of the ROM payload, the game database key.
    pub crc32: u32,
}

/// Cartridge: ROM image plus banking state.
pub struct Cart {
    info: CartInfo,
    rom: Vec<u8>,
    bank0_offset: u32,
    bank0_size: u32,
    bank1_offset: u32,
    bank1_size: u32,
    current_bank: u16,
    shift_register: u8,
    address_counter: u32,
}

impl Cart {
    /// Parse a ROM image, either a 64-byte-headered `.lnx` file or a raw
    /// headerless dump, and look the payload up in the game database.
    ///
    /// # Errors
    ///
    /// [`LoadRomError::UnknownFormat`] if the image is too small to be a
    /// Lynx ROM, [`LoadRomError::CorruptHeader`] if a LNX header is present
    /// but no payload follows it.
    pub fn from_rom(data: &[u8]) -> Result<Self, LoadRomError> {
        if data.len() < LNX_HEADER_SIZE {
            return Err(LoadRomError::UnknownFormat);
        }

        let header = LnxHeader::parse(data);
        let payload = if header.is_some() {
            let payload = &data[LNX_HEADER_SIZE..];
            if payload.is_empty() {
                return Err(LoadRomError::CorruptHeader);
            }
            payload
        } else {
            data
        };

        let crc32 = crc32fast::hash(payload);
        let info = build_info(header.as_ref(), payload.len() as u32, crc32);
        log::info!(
            "cart: {} ({} KB, bank0 {} pages, bank1 {} pages, rotation {:?}, crc32 {:08x})",
            if info.name.is_empty() { "<unnamed>" } else { info.name.as_str() },
            payload.len() / 1024,
            info.bank0_pages,
            info.bank1_pages,
            info.rotation,
            crc32
        );

        let rom_size = payload.len() as u32;
        let mut bank0_size = u32::from(info.bank0_pages) * 256;
        let mut bank1_size = u32::from(info.bank1_pages) * 256;
        let mut bank1_offset = bank0_size;
        if bank0_size + bank1_size > rom_size {
            log::warn!(
                "cart: bank sizes ({bank0_size} + {bank1_size}) exceed ROM size ({rom_size}), clamping"
            );
            if bank0_size > rom_size {
                bank0_size = rom_size;
            }
            bank1_offset = bank0_size;
            if bank1_offset + bank1_size > rom_size {
                bank1_size = rom_size - bank1_offset;
            }
        }

        Ok(Self {
            info,
            rom: payload.to_vec(),
            bank0_offset: 0,
            bank0_size,
            bank1_offset,
            bank1_size,
            current_bank: 0,
            shift_register: 0,
            address_counter: 0,
        })
    }

    #[must_use]
    pub fn info(&self) -> &CartInfo {
        &self.info
    }

    /// The ROM payload, header stripped.
    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// Read the byte at the address counter and advance it (CARTDATA).
    pub fn read_data(&mut self) -> u8 {
        let value = self.peek_data();
        self.address_counter = self.address_counter.wrapping_add(1);
        value
    }

    /// The byte a CARTDATA read would return, without advancing.
    #[must_use]
    pub fn peek_data(&self) -> u8 {
        let addr = self.current_rom_address() as usize;
        self.rom.get(addr).copied().unwrap_or(0xFF)
    }

    pub fn set_address_low(&mut self, value: u8) {
        self.address_counter = (self.address_counter & 0xFF00) | u32::from(value);
    }

    pub fn set_address_high(&mut self, value: u8) {
        self.address_counter = (self.address_counter & 0x00FF) | (u32::from(value) << 8);
    }

    /// The shift register only latches; nothing in the banking path reads
    /// it back, but games write it and expect it in save states.
    pub fn write_shift_register(&mut self, value: u8) {
        self.shift_register = value;
    }

    /// Select the active bank (0 or 1, the CART0/CART1 lines).
    pub fn select_bank(&mut self, bank: u8) {
        self.current_bank = u16::from(bank);
    }

    /// Catch the cartridge up before register traffic. The stock cart has
    /// no on-board coprocessor, so there is nothing to run.
    pub fn tick(&mut self) {}

    /// Absolute ROM offset the counter points at, bank wrap applied.
    #[must_use]
    pub fn current_rom_address(&self) -> u32 {
        let (offset, size) = if self.current_bank == 0 {
            (self.bank0_offset, self.bank0_size)
        } else {
            (self.bank1_offset, self.bank1_size)
        };
        let mut addr = self.address_counter;
        if size > 0 {
            addr %= size;
        }
        offset + addr
    }
}

impl Snapshot for Cart {
    fn serialize(&mut self, s: &mut Serializer) {
        s.u16(&mut self.current_bank);
        s.u8(&mut self.shift_register);
        s.u32(&mut self.address_counter);
    }
}

/// Merge header fields (or headerless defaults) with the game database.
/// A database hit wins for rotation and EEPROM kind, since plenty of
/// circulating headers carry wrong values, and supplies the title for
/// headerless dumps.
fn build_info(header: Option<&LnxHeader>, rom_size: u32, crc32: u32) -> CartInfo {
    let mut info = match header {
        Some(h) => CartInfo {
            name: h.name.clone(),
            manufacturer: h.manufacturer.clone(),
            rom_size,
            bank0_pages: h.bank0_pages,
            bank1_pages: h.bank1_pages,
            rotation: h.rotation,
            eeprom: h.eeprom,
            version: h.version,
            crc32,
        },
        None => CartInfo {
            name: String::new(),
            manufacturer: String::new(),
            rom_size,
            bank0_pages: (rom_size / 256) as u16,
            bank1_pages: 0,
            rotation: Rotation::None,
            eeprom: EepromKind::None,
            version: 0,
            crc32,
        },
    };

    if let Some(entry) = database::lookup(crc32) {
        log::info!("cart: database match \"{}\"", entry.name);
        if info.rotation != entry.rotation {
            log::warn!(
                "cart: header rotation {:?} overridden by database ({:?})",
                info.rotation,
                entry.rotation
            );
        }
        info.rotation = entry.rotation;
        info.eeprom = entry.eeprom;
        if info.name.is_empty() {
            info.name = entry.name.to_string();
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a headered image: `bank0_pages`/`bank1_pages` geometry and a
    /// payload filled with its own low address byte.
    fn make_lnx(bank0_pages: u16, bank1_pages: u16, rotation: u8, payload_len: usize) -> Vec<u8> {
        let mut data = vec![0u8; LNX_HEADER_SIZE + payload_len];
        data[0..4].copy_from_slice(b"LYNX");
        data[4..6].copy_from_slice(&bank0_pages.to_le_bytes());
        data[6..8].copy_from_slice(&bank1_pages.to_le_bytes());
        data[8] = 1; // version
        data[10..14].copy_from_slice(b"Test");
        data[58] = rotation;
        for i in 0..payload_len {
            data[LNX_HEADER_SIZE + i] = (i & 0xFF) as u8;
        }
        data
    }

    #[test]
    fn headered_rom_reads_sequentially() {
        let mut cart = Cart::from_rom(&make_lnx(2, 1, 0, 768)).unwrap();
        assert_eq!(cart.info().name, "Test");
        assert_eq!(cart.info().bank0_pages, 2);
        assert_eq!(cart.read_data(), 0x00);
        assert_eq!(cart.read_data(), 0x01);
        assert_eq!(cart.read_data(), 0x02);
    }

    #[test]
    fn bank1_starts_after_bank0() {
        let mut cart = Cart::from_rom(&make_lnx(2, 1, 0, 768)).unwrap();
        cart.select_bank(1);
        // Bank 1 offset = 2 pages = 512, payload byte = 512 & 0xFF = 0
        assert_eq!(cart.current_rom_address(), 512);
        assert_eq!(cart.read_data(), 0x00);
        assert_eq!(cart.read_data(), 0x01);
    }

    #[test]
    fn headerless_rom_maps_everything_to_bank0() {
        let raw: Vec<u8> = (0..1024u32).map(|i| (i & 0xFF) as u8).collect();
        let mut cart = Cart::from_rom(&raw).unwrap();
        assert_eq!(cart.info().bank0_pages, 4);
        assert_eq!(cart.info().bank1_pages, 0);
        assert_eq!(cart.info().rotation, Rotation::None);
        assert_eq!(cart.read_data(), 0x00);
    }

    #[test]
    fn address_counter_wraps_bank_size() {
        let mut cart = Cart::from_rom(&make_lnx(2, 0, 0, 512)).unwrap();
        cart.set_address_low(0xFF);
        cart.set_address_high(0x01);
        assert_eq!(cart.read_data(), 0xFF, "last byte of the bank");
        // Counter is now 512, which wraps to offset 0
        assert_eq!(cart.read_data(), 0x00);
    }

    #[test]
    fn oversized_header_geometry_is_clamped() {
        // Header claims 4 pages (1 KB) of bank 0 but only 512 bytes follow
        let mut cart = Cart::from_rom(&make_lnx(4, 1, 0, 512)).unwrap();
        assert_eq!(cart.read_data(), 0x00);
        cart.select_bank(1);
        // Bank 1 ended up empty, reads float to open bus
        assert_eq!(cart.read_data(), 0xFF);
    }

    #[test]
    fn too_small_image_is_rejected() {
        assert!(matches!(
            Cart::from_rom(&[0u8; 32]),
            Err(LoadRomError::UnknownFormat)
        ));
        assert!(matches!(
            Cart::from_rom(&make_lnx(1, 0, 0, 0)),
            Err(LoadRomError::CorruptHeader)
        ));
    }

    #[test]
    fn database_hit_overrides_header_metadata() {
        // Klax is vertical; pretend its header said no rotation
        let header = LnxHeader {
            bank0_pages: 1,
            bank1_pages: 0,
            version: 1,
            name: String::new(),
            manufacturer: String::new(),
            rotation: Rotation::None,
            eeprom: EepromKind::None,
        };
        let info = build_info(Some(&header), 256, 0x5c5a_4aa4);
        assert_eq!(info.rotation, Rotation::Right);
        assert_eq!(info.name, "Klax", "database supplies the missing title");

        let info = build_info(None, 256, 0xb0e9_4717);
        assert_eq!(info.eeprom, EepromKind::Eeprom93c46);
    }

    #[test]
    fn header_rotation_applies_without_database_hit() {
        let cart = Cart::from_rom(&make_lnx(1, 0, 2, 256)).unwrap();
        assert_eq!(cart.info().rotation, Rotation::Right);
    }

    #[test]
    fn snapshot_restores_banking_state() {
        let image = make_lnx(2, 1, 0, 768);
        let mut cart = Cart::from_rom(&image).unwrap();
        cart.select_bank(1);
        cart.set_address_low(0x05);
        cart.write_shift_register(0xAA);

        let mut s = Serializer::writer();
        cart.serialize(&mut s);
        let bytes = s.finish();

        let mut restored = Cart::from_rom(&image).unwrap();
        let mut r = Serializer::reader(bytes);
        restored.serialize(&mut r);
        assert!(!r.has_failed());
        assert_eq!(restored.current_rom_address(), 512 + 5);
    }
}
