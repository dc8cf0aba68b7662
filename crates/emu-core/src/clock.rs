//! System master clock.

use crate::Ticks;

/// The master crystal rate and the CPU's divider off it.
///
/// A machine crate constructs one of these to describe its timing root. The
/// CPU reports progress in its own cycles; [`ticks_for_cpu_cycles`] rescales
/// those onto the crystal axis so hosts can compare components without
/// knowing any divider.
///
/// [`ticks_for_cpu_cycles`]: MasterClock::ticks_for_cpu_cycles
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// Crystal rate in Hz. The Lynx crystal runs at 16 MHz.
    pub frequency_hz: u64,
    /// Crystal ticks per CPU cycle. 4 on the Lynx, where the 65C02 core
    /// clock is crystal/4.
    pub cpu_divider: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64, cpu_divider: u64) -> Self {
        Self {
            frequency_hz,
            cpu_divider,
        }
    }

    /// Crystal ticks elapsed after `cycles` CPU cycles.
    #[must_use]
    pub const fn ticks_for_cpu_cycles(&self, cycles: u64) -> Ticks {
        Ticks::new(cycles * self.cpu_divider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescales_cpu_cycles_onto_the_crystal() {
        let clock = MasterClock::new(16_000_000, 4);
        assert_eq!(clock.ticks_for_cpu_cycles(10), Ticks::new(40));
        assert_eq!(clock.ticks_for_cpu_cycles(53_235).get(), 212_940);
    }
}
