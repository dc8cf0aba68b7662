//! Crystal-tick time base shared by every component.

/// A count of master crystal ticks.
///
/// Components run behind per-chip dividers, so cycle counts from different
/// chips are not directly comparable. Converting through
/// [`MasterClock`](crate::MasterClock) into `Ticks` puts them all on the
/// crystal's own axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Ticks(u64);

impl Ticks {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw tick count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_the_raw_count() {
        assert_eq!(Ticks::new(213_333).get(), 213_333);
    }

    #[test]
    fn orders_chronologically() {
        assert!(Ticks::new(39) < Ticks::new(40));
    }
}
