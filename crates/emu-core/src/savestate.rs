//! Save state container format.
//!
//! Layout: magic, format version, console id, then one tagged section per
//! component in the machine's canonical order. The header is validated
//! before any component state is touched, so a wrong file is rejected with
//! the machine unchanged.

use crate::error::SaveStateError;
use crate::snapshot::Serializer;

/// First bytes of every save state file.
pub const SAVE_STATE_MAGIC: [u8; 4] = *b"EMSV";

/// Bumped whenever the container layout (not component content) changes.
pub const FORMAT_VERSION: u32 = 1;

/// Which machine produced a save state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsoleId {
    Lynx = 0,
}

impl ConsoleId {
    const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Lynx),
            _ => None,
        }
    }
}

/// Start a save stream with the container header written.
#[must_use]
pub fn begin_save(console: ConsoleId) -> Serializer {
    let mut s = Serializer::writer();
    let mut magic = SAVE_STATE_MAGIC;
    let mut version = FORMAT_VERSION;
    let mut id = console as u8;
    s.bytes(&mut magic);
    s.u32(&mut version);
    s.u8(&mut id);
    s
}

/// Validate the container header and return a load stream positioned at the
/// first component section.
///
/// # Errors
///
/// [`SaveStateError::InvalidFile`] when the magic, version, or console id
/// does not match; the caller's state is untouched.
pub fn begin_load(data: Vec<u8>, console: ConsoleId) -> Result<Serializer, SaveStateError> {
    let mut s = Serializer::reader(data);
    let mut magic = [0u8; 4];
    let mut version = 0u32;
    let mut id = 0u8;
    s.bytes(&mut magic);
    s.u32(&mut version);
    s.u8(&mut id);
    if s.has_failed()
        || magic != SAVE_STATE_MAGIC
        || version != FORMAT_VERSION
        || ConsoleId::from_u8(id) != Some(console)
    {
        return Err(SaveStateError::InvalidFile);
    }
    Ok(s)
}
