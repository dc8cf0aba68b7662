//! Error types for the host boundary.
//!
//! The emulation path itself never returns errors; these cover construction
//! and state I/O. Battery failures are recoverable by design: the machine
//! logs them and continues with erased memory.

use thiserror::Error;

/// Why a ROM image could not be turned into a running machine.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LoadRomError {
    /// The image matches no known container or bank geometry.
    #[error("unrecognised ROM format")]
    UnknownFormat,
    /// The container parsed but names cartridge hardware this core lacks.
    #[error("unsupported cartridge hardware")]
    UnsupportedMapper,
    /// A required firmware image was not provided and cannot be substituted.
    #[error("required firmware image not provided")]
    MissingFirmware,
    /// The container header is present but self-inconsistent.
    #[error("corrupt ROM header")]
    CorruptHeader,
}

/// Why a save state could not be restored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaveStateError {
    /// Bad magic, format version, or console id. Nothing was changed.
    #[error("not a save state for this machine")]
    InvalidFile,
    /// A component section failed to restore. The machine was rolled back
    /// to the state it held before the load began.
    #[error("save state section '{section}' failed to restore")]
    Partial {
        /// Tag of the first failing section.
        section: String,
    },
}

/// Battery (non-volatile memory) file I/O failure.
#[derive(Debug, Error)]
pub enum BatteryError {
    #[error("battery file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
