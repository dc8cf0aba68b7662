//! Battery-backed (non-volatile) memory persistence.
//!
//! Machines hand their non-volatile contents across this boundary keyed by
//! a file extension (`eeprom`, `sav`, ...); the store decides where bytes
//! live. A missing file is not an error: first boot simply starts erased.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::BatteryError;

/// External sink for battery-backed memory.
pub trait BatteryStore {
    /// Fill `data` from the stored image for `extension`.
    ///
    /// Returns the number of bytes actually loaded (zero when nothing is
    /// stored); bytes past the stored length keep their current value.
    ///
    /// # Errors
    ///
    /// I/O failure other than the image not existing.
    fn load(&mut self, extension: &str, data: &mut [u8]) -> Result<usize, BatteryError>;

    /// Persist `data` as the image for `extension`.
    ///
    /// # Errors
    ///
    /// I/O failure writing the image.
    fn save(&mut self, extension: &str, data: &[u8]) -> Result<(), BatteryError>;
}

/// File-backed store: `<base>.<extension>` next to the ROM.
pub struct FileBatteryStore {
    base: PathBuf,
}

impl FileBatteryStore {
    /// `base` is the ROM path without its battery extension, typically the
    /// ROM file path itself (`game.lnx` stores to `game.lnx.eeprom`).
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_for(&self, extension: &str) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(".");
        name.push(extension);
        name.into()
    }
}

impl BatteryStore for FileBatteryStore {
    fn load(&mut self, extension: &str, data: &mut [u8]) -> Result<usize, BatteryError> {
        match std::fs::read(self.path_for(extension)) {
            Ok(bytes) => {
                let n = bytes.len().min(data.len());
                data[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, extension: &str, data: &[u8]) -> Result<(), BatteryError> {
        std::fs::write(self.path_for(extension), data)?;
        Ok(())
    }
}

/// In-memory store for tests and hosts that own persistence themselves.
#[derive(Default)]
pub struct MemoryBatteryStore {
    images: HashMap<String, Vec<u8>>,
}

impl MemoryBatteryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an image, as if a previous session had saved it.
    pub fn insert(&mut self, extension: &str, data: Vec<u8>) {
        self.images.insert(extension.to_string(), data);
    }

    /// The stored image for `extension`, if any.
    #[must_use]
    pub fn get(&self, extension: &str) -> Option<&[u8]> {
        self.images.get(extension).map(Vec::as_slice)
    }
}

impl BatteryStore for MemoryBatteryStore {
    fn load(&mut self, extension: &str, data: &mut [u8]) -> Result<usize, BatteryError> {
        match self.images.get(extension) {
            Some(bytes) => {
                let n = bytes.len().min(data.len());
                data[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn save(&mut self, extension: &str, data: &[u8]) -> Result<(), BatteryError> {
        self.images.insert(extension.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryBatteryStore::new();
        store.save("eeprom", &[1, 2, 3]).unwrap();
        let mut buf = [0xFFu8; 5];
        let n = store.load("eeprom", &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf, [1, 2, 3, 0xFF, 0xFF], "tail keeps its current value");
    }

    #[test]
    fn missing_image_loads_nothing() {
        let mut store = MemoryBatteryStore::new();
        let mut buf = [0xAAu8; 4];
        assert_eq!(store.load("eeprom", &mut buf).unwrap(), 0);
        assert_eq!(buf, [0xAA; 4]);
    }

    #[test]
    fn file_store_appends_extension() {
        let store = FileBatteryStore::new("/tmp/game.lnx");
        assert_eq!(
            store.path_for("eeprom"),
            PathBuf::from("/tmp/game.lnx.eeprom")
        );
    }
}
