//! Frozen addresses: CPU writes to a frozen address are dropped by the
//! memory manager, pinning whatever value the debugger wrote there.

use std::collections::HashSet;
use std::ops::RangeInclusive;

/// The set of frozen CPU-visible addresses.
#[derive(Debug, Default)]
pub struct FrozenAddresses {
    set: HashSet<u16>,
}

impl FrozenAddresses {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze or thaw every address in `range`.
    pub fn set_frozen(&mut self, range: RangeInclusive<u16>, frozen: bool) {
        for addr in range {
            if frozen {
                self.set.insert(addr);
            } else {
                self.set.remove(&addr);
            }
        }
    }

    /// True when writes to `addr` must be dropped. The empty-set check keeps
    /// the common case (nothing frozen) to a single branch.
    #[must_use]
    pub fn is_frozen(&self, addr: u16) -> bool {
        !self.set.is_empty() && self.set.contains(&addr)
    }

    /// Per-address frozen flags over `range`, for UI display.
    #[must_use]
    pub fn frozen_map(&self, range: RangeInclusive<u16>) -> Vec<bool> {
        range.map(|addr| self.is_frozen(addr)).collect()
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_and_thaw_ranges() {
        let mut frozen = FrozenAddresses::new();
        assert!(!frozen.is_frozen(0x0200));

        frozen.set_frozen(0x0200..=0x020F, true);
        assert!(frozen.is_frozen(0x0200));
        assert!(frozen.is_frozen(0x020F));
        assert!(!frozen.is_frozen(0x0210));

        frozen.set_frozen(0x0208..=0x020F, false);
        assert!(frozen.is_frozen(0x0207));
        assert!(!frozen.is_frozen(0x0208));

        assert_eq!(
            frozen.frozen_map(0x0206..=0x0209),
            vec![true, true, false, false]
        );
    }

    #[test]
    fn clear_thaws_everything() {
        let mut frozen = FrozenAddresses::new();
        frozen.set_frozen(0x0000..=0x00FF, true);
        frozen.clear();
        assert!(!frozen.is_frozen(0x0080));
    }
}
