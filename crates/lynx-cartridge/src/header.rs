//! LNX container header.

use emu_core::Rotation;

use crate::eeprom::EepromKind;

/// Parsed 64-byte LNX header.
///
/// Layout:
/// - bytes 0-3: `LYNX` magic
/// - bytes 4-5: bank 0 size in 256-byte pages (little-endian)
/// - bytes 6-7: bank 1 size in 256-byte pages
/// - bytes 8-9: header version
/// - bytes 10-41: cart name (NUL-padded)
/// - bytes 42-57: manufacturer (NUL-padded)
/// - byte 58: rotation (0 none, 1 left, 2 right)
/// - byte 59: spare
/// - byte 60: EEPROM type (BLL extension; chip in bits 0-2)
/// - bytes 61-63: spare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnxHeader {
    pub bank0_pages: u16,
    pub bank1_pages: u16,
    pub version: u16,
    pub name: String,
    pub manufacturer: String,
    pub rotation: Rotation,
    pub eeprom: EepromKind,
}

/// Header length in bytes.
pub const LNX_HEADER_SIZE: usize = 64;

impl LnxHeader {
    /// Parse the header at the start of `data`. Returns `None` when the
    /// magic is absent, in which case the image is a raw `.o` dump.
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < LNX_HEADER_SIZE || &data[0..4] != b"LYNX" {
            return None;
        }

        Some(Self {
            bank0_pages: u16::from(data[4]) | (u16::from(data[5]) << 8),
            bank1_pages: u16::from(data[6]) | (u16::from(data[7]) << 8),
            version: u16::from(data[8]) | (u16::from(data[9]) << 8),
            name: string_field(&data[10..42]),
            manufacturer: string_field(&data[42..58]),
            rotation: Rotation::from(data[58]),
            eeprom: EepromKind::from_header_byte(data[60]),
        })
    }
}

/// NUL-padded, not-always-valid-UTF-8 text field.
fn string_field(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Vec<u8> {
        let mut h = vec![0u8; LNX_HEADER_SIZE];
        h[0..4].copy_from_slice(b"LYNX");
        h[4] = 0x00;
        h[5] = 0x01; // 256 pages = 64 KiB bank 0
        h[8] = 1;
        h[10..16].copy_from_slice(b"Sample");
        h[42..46].copy_from_slice(b"Test");
        h[58] = 2; // right
        h[60] = 1; // 93C46
        h
    }

    #[test]
    fn parses_fields() {
        let header = LnxHeader::parse(&sample_header()).unwrap();
        assert_eq!(header.bank0_pages, 256);
        assert_eq!(header.bank1_pages, 0);
        assert_eq!(header.version, 1);
        assert_eq!(header.name, "Sample");
        assert_eq!(header.manufacturer, "Test");
        assert_eq!(header.rotation, Rotation::Right);
        assert_eq!(header.eeprom, EepromKind::Eeprom93c46);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut h = sample_header();
        h[0] = b'B';
        assert!(LnxHeader::parse(&h).is_none());
        assert!(LnxHeader::parse(&[0u8; 10]).is_none());
    }
}
