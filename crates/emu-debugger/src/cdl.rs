//! Code/data logging.
//!
//! One flag byte per ROM byte records how the program actually used it:
//! executed, read as data, jumped to, called as a subroutine. The log feeds
//! the disassembler (code/data separation), the function list, and ROM
//! stripping. [`CodeDataLogger`] is the full debugger-owned log;
//! [`CdlRecorder`] is the always-on variant that keeps coverage counters
//! cheap enough to leave running.

use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

/// File identifier for serialized logs.
pub const CDL_MAGIC: &[u8; 5] = b"CDLv2";

/// Per-byte usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CdlFlags(pub u8);

impl CdlFlags {
    pub const NONE: Self = Self(0);
    /// Byte was fetched as an opcode or operand.
    pub const CODE: Self = Self(0x01);
    /// Byte was read as data.
    pub const DATA: Self = Self(0x02);
    /// Byte is the destination of a taken branch or jump.
    pub const JUMP_TARGET: Self = Self(0x04);
    /// Byte is the entry point of a called subroutine or handler.
    pub const SUB_ENTRY: Self = Self(0x08);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CdlFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CdlFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Aggregate usage counts over the whole ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CdlStatistics {
    pub code_bytes: u32,
    pub data_bytes: u32,
    pub total_bytes: u32,
    pub jump_target_count: u32,
    pub function_count: u32,
}

/// What [`CodeDataLogger::stripped_rom`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdlStrip {
    /// Keep everything.
    None,
    /// Zero bytes the program never touched.
    Unused,
    /// Zero bytes the program did touch.
    Used,
}

/// Why a CDL file could not be loaded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CdlLoadError {
    /// The file does not start with the CDL identifier.
    #[error("not a CDL file")]
    BadMagic,
    /// The flag section covers a different ROM size. Nothing was changed.
    #[error("CDL covers {found} bytes but the ROM has {expected}")]
    SizeMismatch { expected: usize, found: usize },
}

/// The full code/data log for one ROM.
#[derive(Debug)]
pub struct CodeDataLogger {
    flags: Vec<u8>,
    rom_crc: u32,
}

impl CodeDataLogger {
    /// Create an empty log sized and keyed to `rom`.
    #[must_use]
    pub fn new(rom: &[u8]) -> Self {
        Self {
            flags: vec![0; rom.len()],
            rom_crc: crc32fast::hash(rom),
        }
    }

    /// Mark an executed byte. `extra` carries jump-target or sub-entry
    /// flags for the opcode byte of the instruction.
    pub fn set_code(&mut self, addr: u32, extra: CdlFlags) {
        if let Some(flags) = self.flags.get_mut(addr as usize) {
            *flags |= CdlFlags::CODE.0 | extra.0;
        }
    }

    /// Mark a byte read as data. Bytes already marked as code stay code.
    pub fn set_data(&mut self, addr: u32) {
        if let Some(flags) = self.flags.get_mut(addr as usize) {
            if *flags & CdlFlags::CODE.0 == 0 {
                *flags |= CdlFlags::DATA.0;
            }
        }
    }

    #[must_use]
    pub fn flags(&self, addr: u32) -> CdlFlags {
        CdlFlags(self.flags.get(addr as usize).copied().unwrap_or(0))
    }

    #[must_use]
    pub fn is_code(&self, addr: u32) -> bool {
        self.flags(addr).contains(CdlFlags::CODE)
    }

    #[must_use]
    pub fn is_data(&self, addr: u32) -> bool {
        self.flags(addr).contains(CdlFlags::DATA)
    }

    #[must_use]
    pub fn is_jump_target(&self, addr: u32) -> bool {
        self.flags(addr).contains(CdlFlags::JUMP_TARGET)
    }

    #[must_use]
    pub fn is_sub_entry(&self, addr: u32) -> bool {
        self.flags(addr).contains(CdlFlags::SUB_ENTRY)
    }

    /// Overwrite the flags of every byte in `start..=end`, for manual
    /// code/data marking from the disassembly view.
    pub fn mark_range(&mut self, start: u32, end: u32, flags: CdlFlags) {
        if self.flags.is_empty() {
            return;
        }
        let end = (end as usize).min(self.flags.len() - 1);
        for byte in &mut self.flags[(start as usize).min(end)..=end] {
            *byte = flags.0;
        }
    }

    #[must_use]
    pub fn statistics(&self) -> CdlStatistics {
        let mut stats = CdlStatistics {
            total_bytes: self.flags.len() as u32,
            ..CdlStatistics::default()
        };
        for &flags in &self.flags {
            let flags = CdlFlags(flags);
            if flags.contains(CdlFlags::CODE) {
                stats.code_bytes += 1;
            }
            if flags.contains(CdlFlags::DATA) {
                stats.data_bytes += 1;
            }
            if flags.contains(CdlFlags::JUMP_TARGET) {
                stats.jump_target_count += 1;
            }
            if flags.contains(CdlFlags::SUB_ENTRY) {
                stats.function_count += 1;
            }
        }
        stats
    }

    /// ROM offsets of every recorded subroutine entry point.
    #[must_use]
    pub fn functions(&self) -> Vec<u32> {
        self.flags
            .iter()
            .enumerate()
            .filter(|&(_, &flags)| CdlFlags(flags).contains(CdlFlags::SUB_ENTRY))
            .map(|(addr, _)| addr as u32)
            .collect()
    }

    /// Copy of `rom` with the selected class of bytes zeroed out.
    #[must_use]
    pub fn stripped_rom(&self, rom: &[u8], strip: CdlStrip) -> Vec<u8> {
        rom.iter()
            .zip(&self.flags)
            .map(|(&byte, &flags)| match strip {
                CdlStrip::None => byte,
                CdlStrip::Unused if flags == 0 => 0,
                CdlStrip::Used if flags != 0 => 0,
                _ => byte,
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.flags.fill(0);
    }

    /// Serialize to the on-disk format: identifier, ROM CRC32, flag bytes.
    #[must_use]
    pub fn to_file(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(CDL_MAGIC.len() + 4 + self.flags.len());
        data.extend_from_slice(CDL_MAGIC);
        data.extend_from_slice(&self.rom_crc.to_le_bytes());
        data.extend_from_slice(&self.flags);
        data
    }

    /// Load a serialized log. A CRC mismatch is tolerated with a warning so
    /// a log survives ROM header tweaks, and a headerless file of exactly
    /// the right size loads as raw flag bytes; a size mismatch is not
    /// tolerated.
    pub fn load_file(&mut self, data: &[u8]) -> Result<(), CdlLoadError> {
        let header_len = CDL_MAGIC.len() + 4;
        if data.len() >= header_len && &data[..CDL_MAGIC.len()] == CDL_MAGIC {
            let flags = &data[header_len..];
            if flags.len() != self.flags.len() {
                return Err(CdlLoadError::SizeMismatch {
                    expected: self.flags.len(),
                    found: flags.len(),
                });
            }
            let crc = u32::from_le_bytes([data[5], data[6], data[7], data[8]]);
            if crc != self.rom_crc {
                log::warn!(
                    "cdl: file crc {crc:08x} does not match rom crc {:08x}, loading anyway",
                    self.rom_crc
                );
            }
            self.flags.copy_from_slice(flags);
            return Ok(());
        }

        // Flag dump from an older tool, identified by size alone.
        if data.len() == self.flags.len() {
            log::warn!("cdl: no header, loading {} raw flag bytes", data.len());
            self.flags.copy_from_slice(data);
            return Ok(());
        }
        Err(CdlLoadError::BadMagic)
    }
}

/// Always-on coverage recorder.
///
/// Keeps the same per-byte flags as [`CodeDataLogger`] but only the
/// code/data bits, with running counters instead of on-demand scans.
#[derive(Debug)]
pub struct CdlRecorder {
    flags: Vec<u8>,
    code_bytes: u32,
    data_bytes: u32,
}

impl CdlRecorder {
    #[must_use]
    pub fn new(rom_len: usize) -> Self {
        Self {
            flags: vec![0; rom_len],
            code_bytes: 0,
            data_bytes: 0,
        }
    }

    pub fn record_code(&mut self, addr: u32) {
        if let Some(flags) = self.flags.get_mut(addr as usize) {
            if *flags & CdlFlags::CODE.0 == 0 {
                *flags |= CdlFlags::CODE.0;
                self.code_bytes += 1;
            }
        }
    }

    pub fn record_data(&mut self, addr: u32) {
        if let Some(flags) = self.flags.get_mut(addr as usize) {
            if *flags == 0 {
                *flags = CdlFlags::DATA.0;
                self.data_bytes += 1;
            }
        }
    }

    #[must_use]
    pub fn statistics(&self) -> CdlStatistics {
        CdlStatistics {
            code_bytes: self.code_bytes,
            data_bytes: self.data_bytes,
            total_bytes: self.flags.len() as u32,
            ..CdlStatistics::default()
        }
    }

    pub fn reset(&mut self) {
        self.flags.fill(0);
        self.code_bytes = 0;
        self.data_bytes = 0;
    }
}
