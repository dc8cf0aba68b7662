//! Cheat codes applied on CPU reads.
//!
//! A cheat replaces the value read from an address; a compare byte limits
//! the replacement to reads that would have returned that value, which is
//! how codes distinguish aliased locations.

use std::collections::HashMap;

/// One cheat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cheat {
    /// CPU-visible address the cheat watches.
    pub address: u16,
    /// Replacement value.
    pub value: u8,
    /// When set, only reads returning this value are replaced.
    pub compare: Option<u8>,
}

/// The active cheat set, indexed by address.
#[derive(Debug, Default)]
pub struct Cheats {
    by_address: HashMap<u16, Cheat>,
}

impl Cheats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set. Later entries for the same address win.
    pub fn set_cheats(&mut self, cheats: &[Cheat]) {
        self.by_address = cheats.iter().map(|c| (c.address, *c)).collect();
    }

    pub fn clear(&mut self) {
        self.by_address.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Filter a CPU read. Returns the replacement value when a cheat on
    /// `addr` applies, otherwise `value` unchanged.
    #[must_use]
    pub fn apply(&self, addr: u16, value: u8) -> u8 {
        if self.by_address.is_empty() {
            return value;
        }
        match self.by_address.get(&addr) {
            Some(cheat) if cheat.compare.is_none() || cheat.compare == Some(value) => cheat.value,
            _ => value,
        }
    }
}
