//! Console configuration.

use emu_core::Rotation;
use lynx_cartridge::EepromKind;

/// Lynx hardware model.
///
/// The two revisions differ in case and screen, not in emulated behavior;
/// the model is carried so save states and hosts can report it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LynxModel {
    #[default]
    LynxI = 0,
    LynxII = 1,
}

impl LynxModel {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::LynxII,
            _ => Self::LynxI,
        }
    }
}

/// Everything needed to build a [`LynxConsole`](crate::LynxConsole).
///
/// Only the ROM image is required. Without a boot ROM the console
/// high-level-emulates the boot sequence; set `require_boot_rom` to get a
/// `MissingFirmware` error instead when no firmware is supplied.
#[derive(Clone)]
pub struct LynxConfig {
    /// Cart image, `.lnx` container or headerless.
    pub rom: Vec<u8>,
    /// 512-byte boot ROM image, when the host has one.
    pub boot_rom: Option<Vec<u8>>,
    pub model: LynxModel,
    /// Overrides the rotation from the header and game database.
    pub rotation: Option<Rotation>,
    /// Overrides the EEPROM model from the header and game database.
    pub eeprom: Option<EepromKind>,
    /// Fail construction instead of falling back to the HLE boot path.
    pub require_boot_rom: bool,
}

impl LynxConfig {
    #[must_use]
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            rom,
            boot_rom: None,
            model: LynxModel::default(),
            rotation: None,
            eeprom: None,
            require_boot_rom: false,
        }
    }

    #[must_use]
    pub fn with_boot_rom(mut self, boot_rom: Vec<u8>) -> Self {
        self.boot_rom = Some(boot_rom);
        self
    }
}
