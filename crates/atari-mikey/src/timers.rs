//! The eight countdown timers at `$FD00-$FD1F`.
//!
//! Each timer owns four registers (`BACKUP`, `CTLA`, `COUNT`, `CTLB`) at a
//! four-byte stride. A timer counts down on its prescaler period or, with
//! clock source 7, on underflows of the timer linked to it. Underflow
//! reloads the counter from `BACKUP`, sets the done flag, raises the
//! timer's interrupt bit when enabled, and clocks the link chain.
//!
//! Two timers have hardwired side jobs: timer 0 ends a scanline on every
//! underflow and timer 4 clocks the UART one bit-time per underflow
//! (never setting done or its own interrupt bit).

use emu_core::Serializer;

use crate::mikey::Mikey;
use crate::SCANLINE_COUNT;

/// CPU cycles per timer tick for clock sources 0-6 (1 us through 64 us).
/// Source 7 is the link input and is never clocked directly.
pub(crate) const PRESCALER_PERIODS: [u64; 8] = [4, 8, 16, 32, 64, 128, 256, 0];

/// Link chain targets: 0 -> 2 -> 4 and 1 -> 3 -> 5 -> 7. Timer 6 stands
/// alone, and timer 4's underflows go to the UART instead of a timer.
pub(crate) const LINK_TARGET: [Option<usize>; 8] =
    [Some(2), Some(3), Some(4), Some(5), None, Some(7), None, None];

/// One of Mikey's eight countdown timers.
#[derive(Default)]
pub(crate) struct Timer {
    pub(crate) backup: u8,
    pub(crate) control_a: u8,
    pub(crate) count: u8,
    pub(crate) control_b: u8,
    /// CPU cycle of the last prescaler tick, for arithmetic catch-up.
    pub(crate) last_tick: u64,
    pub(crate) done: bool,
    pub(crate) linked: bool,
}

impl Timer {
    /// CTLA bit 3: count enable.
    pub(crate) fn enabled(&self) -> bool {
        self.control_a & 0x08 != 0
    }

    /// CTLA bits 0-2: prescaler select, 7 = linked.
    pub(crate) fn clock_source(&self) -> u8 {
        self.control_a & 0x07
    }

    /// CTLA bit 7: interrupt enable.
    pub(crate) fn irq_enabled(&self) -> bool {
        self.control_a & 0x80 != 0
    }

    pub(crate) fn serialize(&mut self, s: &mut Serializer) {
        s.u8(&mut self.backup);
        s.u8(&mut self.control_a);
        s.u8(&mut self.count);
        s.u8(&mut self.control_b);
        s.u64(&mut self.last_tick);
        s.bool(&mut self.done);
        s.bool(&mut self.linked);
    }
}

impl Mikey {
    /// Advance all timers to `current_cycle`, then tick the audio channels
    /// once. `ram` feeds the display DMA when timer 0 ends a scanline.
    pub fn tick(&mut self, current_cycle: u64, ram: &[u8; 0x1_0000]) {
        for index in 0..8 {
            self.tick_timer(index, current_cycle, ram);
        }
        self.apu.tick();
    }

    fn tick_timer(&mut self, index: usize, current_cycle: u64, ram: &[u8; 0x1_0000]) {
        if !self.timers[index].enabled() {
            return;
        }

        // The done flag blocks counting until software clears it through
        // CTLB. Timer 4 is exempt so the UART baud clock never stops.
        if self.timers[index].done && index != 4 {
            // Keep the catch-up delta from accumulating while blocked.
            self.timers[index].last_tick = current_cycle;
            return;
        }

        let source = self.timers[index].clock_source();
        if source == 7 {
            // Linked: clocked from the cascade, not from the prescaler.
            return;
        }
        let period = PRESCALER_PERIODS[usize::from(source)];

        while current_cycle - self.timers[index].last_tick >= period {
            self.timers[index].last_tick += period;
            self.timers[index].count = self.timers[index].count.wrapping_sub(1);
            if self.timers[index].count != 0xFF {
                continue;
            }

            // Underflow.
            if index == 4 {
                // Baud generator: reload and clock the UART one bit-time.
                // No done flag and no timer interrupt of its own.
                self.timers[4].count = self.timers[4].backup;
                self.clock_uart();
                continue;
            }

            self.timers[index].done = true;
            self.timers[index].control_b |= 0x08;
            if self.timers[index].irq_enabled() {
                self.irq_pending |= 1 << index;
            }
            self.timers[index].count = self.timers[index].backup;
            self.cascade(index);

            if index == 0 {
                // Horizontal timer: finish the scanline the beam is on.
                self.render_scanline(ram);
                self.current_scanline += 1;
                if self.current_scanline >= SCANLINE_COUNT {
                    self.current_scanline = 0;
                    self.frame_complete = true;
                }
            }

            // Done is set, so the timer stops counting here.
            break;
        }
    }

    fn cascade(&mut self, source: usize) {
        let Some(target) = LINK_TARGET[source] else {
            return;
        };

        if !self.timers[target].enabled() || self.timers[target].clock_source() != 7 {
            return;
        }
        if self.timers[target].done && target != 4 {
            return;
        }

        self.timers[target].count = self.timers[target].count.wrapping_sub(1);
        if self.timers[target].count != 0xFF {
            return;
        }

        if target == 4 {
            self.timers[4].count = self.timers[4].backup;
            self.clock_uart();
            return;
        }

        self.timers[target].done = true;
        self.timers[target].control_b |= 0x08;
        if self.timers[target].irq_enabled() {
            self.irq_pending |= 1 << target;
        }
        self.timers[target].count = self.timers[target].backup;
        self.cascade(target);
    }
}

#[cfg(test)]
mod tests {
    use crate::Mikey;
    use lynx_cartridge::{Eeprom, EepromKind};

    fn ram() -> Box<[u8; 0x1_0000]> {
        Box::new([0u8; 0x1_0000])
    }

    fn write(mikey: &mut Mikey, addr: u8, value: u8) {
        let mut eeprom = Eeprom::new(EepromKind::None);
        mikey.write_register(addr, value, &mut eeprom);
    }

    #[test]
    fn counts_down_on_the_prescaler_period() {
        let mut mikey = Mikey::new();
        let ram = ram();
        // Timer 1 at $FD04: backup 10, enabled, source 0 (4 cycles/tick).
        write(&mut mikey, 0x04, 10);
        write(&mut mikey, 0x06, 10);
        write(&mut mikey, 0x05, 0x08);

        mikey.tick(3, &ram);
        assert_eq!(mikey.timers[1].count, 10, "under one period, no tick");
        mikey.tick(4, &ram);
        assert_eq!(mikey.timers[1].count, 9);
        mikey.tick(20, &ram);
        assert_eq!(mikey.timers[1].count, 5, "catch-up covers elapsed periods");
    }

    #[test]
    fn underflow_reloads_sets_done_and_raises_irq() {
        let mut mikey = Mikey::new();
        let ram = ram();
        // Timer 1: backup 2, count 2, enabled + IRQ, source 0.
        write(&mut mikey, 0x04, 2);
        write(&mut mikey, 0x06, 2);
        write(&mut mikey, 0x05, 0x88);

        // 2 -> 1 -> 0 -> underflow on the third period.
        mikey.tick(12, &ram);
        assert_eq!(mikey.timers[1].count, 2, "reloaded from backup");
        assert!(mikey.timers[1].done);
        assert_eq!(mikey.timers[1].control_b & 0x08, 0x08);
        assert_eq!(mikey.irq_pending() & 0x02, 0x02);
        assert!(mikey.irq_line());
    }

    #[test]
    fn done_blocks_counting_until_ctlb_write() {
        let mut mikey = Mikey::new();
        let ram = ram();
        write(&mut mikey, 0x04, 1);
        write(&mut mikey, 0x06, 1);
        write(&mut mikey, 0x05, 0x08);

        mikey.tick(8, &ram);
        assert!(mikey.timers[1].done);
        let reloaded = mikey.timers[1].count;

        mikey.tick(100, &ram);
        assert_eq!(mikey.timers[1].count, reloaded, "done timer must not count");

        // Any CTLB write clears the done flag and counting resumes.
        write(&mut mikey, 0x07, 0);
        assert!(!mikey.timers[1].done);
        assert_eq!(mikey.timers[1].control_b & 0x08, 0);
        mikey.tick(104, &ram);
        assert_eq!(mikey.timers[1].count, reloaded - 1);
    }

    #[test]
    fn ctla_strobe_reloads_count_and_is_not_stored() {
        let mut mikey = Mikey::new();
        write(&mut mikey, 0x04, 0x55);
        write(&mut mikey, 0x05, 0x48);
        assert_eq!(mikey.timers[1].count, 0x55);
        assert_eq!(
            mikey.timers[1].control_a & 0x40,
            0,
            "reset strobe reads back as zero"
        );
    }

    #[test]
    fn linked_timer_counts_source_underflows() {
        let mut mikey = Mikey::new();
        let ram = ram();
        // Timer 1 underflows every 8 cycles (backup 1, source 0).
        write(&mut mikey, 0x04, 1);
        write(&mut mikey, 0x06, 1);
        write(&mut mikey, 0x05, 0x08);
        // Timer 3 linked to timer 1, backup 1, IRQ enabled.
        write(&mut mikey, 0x0C, 1);
        write(&mut mikey, 0x0E, 1);
        write(&mut mikey, 0x0D, 0x8F);

        let mut cycle = 0;
        for _ in 0..2 {
            // Clear timer 1's done flag so it keeps running.
            write(&mut mikey, 0x07, 0);
            cycle += 8;
            mikey.tick(cycle, &ram);
        }

        assert!(mikey.timers[3].done, "two source underflows: 1 -> 0 -> wrap");
        assert_eq!(mikey.irq_pending() & 0x08, 0x08);
    }

    #[test]
    fn timer4_underflow_clocks_uart_without_done_or_irq() {
        let mut mikey = Mikey::new();
        let ram = ram();
        // Timer 4 at $FD10: backup 0, enabled + IRQ bit set, source 0.
        write(&mut mikey, 0x10, 0);
        write(&mut mikey, 0x12, 0);
        write(&mut mikey, 0x11, 0x88);

        mikey.tick(40, &ram);
        assert!(!mikey.timers[4].done, "baud generator never sets done");
        assert_eq!(
            mikey.irq_pending() & 0x10,
            0,
            "timer 4 does not raise its own interrupt"
        );
        assert_eq!(mikey.timers[4].count, 0, "keeps reloading and counting");
    }

    #[test]
    fn software_irq_set_and_clear() {
        let mut mikey = Mikey::new();
        write(&mut mikey, 0x80, 0x24);
        assert_eq!(mikey.irq_pending(), 0x24);
        assert!(mikey.irq_line());

        write(&mut mikey, 0x81, 0x04);
        assert_eq!(mikey.irq_pending(), 0x20);
        write(&mut mikey, 0x81, 0xFF);
        assert!(!mikey.irq_line());
    }
}
