//! The four LFSR audio channels at `$FD20-$FD3F`.
//!
//! Each channel is a countdown timer (same prescaler selects as the
//! system timers, or a link to the previous channel) that clocks a
//! 12-bit shift register on underflow. The low bit picks `+volume` or
//! `-volume` as the channel output, or feeds an integrating accumulator
//! in integrate mode.
//!
//! # Channel register block (8 bytes per channel)
//!
//! | Off | Register | |
//! |-----|----------|-----------------------------------------|
//! | +0  | VOL      | output volume                           |
//! | +1  | FEEDBACK | LFSR feedback tap select                |
//! | +2  | OUTPUT   | current output, signed                  |
//! | +3  | SHIFTLO  | shift register low byte                 |
//! | +4  | SHIFTHI  | shift register high nibble              |
//! | +5  | BACKUP   | timer reload value                      |
//! | +6  | CONTROL  | enable, integrate, reset-done, clock    |
//! | +7  | COUNTER  | current countdown                       |
//!
//! Stereo attenuation pairs live at `$FD40-$FD47` and the master volume
//! at `$FD50`; the mixer folds everything into interleaved 16-bit stereo
//! at 22 050 Hz.

use emu_core::Serializer;

use crate::timers::PRESCALER_PERIODS;
use crate::MASTER_CLOCK_RATE;

/// Shift register bits XORed into the feedback, one per bit of the
/// FEEDBACK register.
const TAP_BITS: [u16; 8] = [0, 1, 2, 3, 4, 5, 7, 10];

#[derive(Default)]
struct Channel {
    volume: u8,
    feedback: u8,
    output: i8,
    /// 12-bit LFSR. Must start non-zero or it never leaves silence.
    shift_register: u16,
    backup: u8,
    control: u8,
    counter: u8,
    left_atten: u8,
    right_atten: u8,
    integrate: bool,
    enabled: bool,
    done: bool,
    /// Ticks since the last prescaler period elapsed.
    last_tick: u64,
}

impl Channel {
    fn new() -> Self {
        Self {
            shift_register: 0x001,
            ..Self::default()
        }
    }

    /// Advance the LFSR one step and derive the new output level.
    fn clock_lfsr(&mut self) {
        let sr = self.shift_register;
        let mut fed_back = 0u16;
        for (select, tap) in TAP_BITS.iter().enumerate() {
            if self.feedback & (1 << select) != 0 {
                fed_back ^= (sr >> tap) & 1;
            }
        }
        let sr = ((sr >> 1) | (fed_back << 11)) & 0x0FFF;
        self.shift_register = sr;

        if self.integrate {
            let delta = if sr & 1 != 0 {
                i32::from(self.volume)
            } else {
                -i32::from(self.volume)
            };
            self.output = (i32::from(self.output) + delta).clamp(-128, 127) as i8;
        } else {
            self.output = if sr & 1 != 0 {
                self.volume.cast_signed()
            } else {
                self.volume.cast_signed().wrapping_neg()
            };
        }
    }

    fn serialize(&mut self, s: &mut Serializer) {
        s.u8(&mut self.volume);
        s.u8(&mut self.feedback);
        s.i8(&mut self.output);
        s.u16(&mut self.shift_register);
        s.u8(&mut self.backup);
        s.u8(&mut self.control);
        s.u8(&mut self.counter);
        s.u8(&mut self.left_atten);
        s.u8(&mut self.right_atten);
        s.bool(&mut self.integrate);
        s.bool(&mut self.enabled);
        s.bool(&mut self.done);
        s.u64(&mut self.last_tick);
    }
}

/// The audio half of Mikey.
pub struct Apu {
    channels: [Channel; 4],
    master_volume: u8,
    stereo_enabled: bool,
    clock_accumulator: u32,
    /// Interleaved left/right output, drained by [`Apu::take_samples`].
    samples: Vec<i16>,
}

impl Apu {
    /// Output sample rate in Hz.
    pub const SAMPLE_RATE: u32 = 22_050;
    const CLOCKS_PER_SAMPLE: u32 = MASTER_CLOCK_RATE / Self::SAMPLE_RATE;

    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| Channel::new()),
            master_volume: 0,
            stereo_enabled: false,
            clock_accumulator: 0,
            samples: Vec::new(),
        }
    }

    /// Advance the channel timers one step and emit a sample every
    /// [`Apu::SAMPLE_RATE`]th of a second of accumulated steps.
    pub fn tick(&mut self) {
        self.clock_accumulator += 1;

        for ch in 0..4 {
            self.tick_channel_timer(ch);
        }

        if self.clock_accumulator >= Self::CLOCKS_PER_SAMPLE {
            self.clock_accumulator -= Self::CLOCKS_PER_SAMPLE;
            self.mix();
        }
    }

    fn tick_channel_timer(&mut self, ch: usize) {
        let channel = &mut self.channels[ch];
        if !channel.enabled || channel.done {
            return;
        }

        let source = channel.control & 0x07;
        if source == 7 {
            // Linked: clocked by the previous channel's underflow.
            return;
        }
        let period = PRESCALER_PERIODS[usize::from(source)];

        channel.last_tick += 1;
        if channel.last_tick < period {
            return;
        }
        channel.last_tick = 0;

        channel.counter = channel.counter.wrapping_sub(1);
        if channel.counter == 0xFF {
            channel.done = true;
            channel.counter = channel.backup;
            channel.clock_lfsr();
            self.cascade(ch);
        }
    }

    fn cascade(&mut self, source: usize) {
        let target = source + 1;
        if target >= 4 {
            return;
        }

        let channel = &mut self.channels[target];
        if !channel.enabled || channel.control & 0x07 != 7 || channel.done {
            return;
        }

        channel.counter = channel.counter.wrapping_sub(1);
        if channel.counter == 0xFF {
            channel.done = true;
            channel.counter = channel.backup;
            channel.clock_lfsr();
            self.cascade(target);
        }
    }

    fn mix(&mut self) {
        let mut left_sum = 0i32;
        let mut right_sum = 0i32;

        for channel in &self.channels {
            if !channel.enabled {
                continue;
            }
            let sample = i32::from(channel.output);
            left_sum += (sample * i32::from(channel.left_atten)) >> 2;
            right_sum += (sample * i32::from(channel.right_atten)) >> 2;
        }

        left_sum = (left_sum * (i32::from(self.master_volume) + 1)) >> 4;
        right_sum = (right_sum * (i32::from(self.master_volume) + 1)) >> 4;

        if !self.stereo_enabled {
            let mono = (left_sum + right_sum) / 2;
            left_sum = mono;
            right_sum = mono;
        }

        let left = (left_sum * 64).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        let right = (right_sum * 64).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        self.samples.push(left);
        self.samples.push(right);
    }

    /// Read an audio register, `addr` relative to `$FD20`.
    #[must_use]
    pub fn read(&self, addr: u8) -> u8 {
        if addr < 0x20 {
            let channel = &self.channels[usize::from((addr >> 3) & 0x03)];
            return match addr & 0x07 {
                0 => channel.volume,
                1 => channel.feedback,
                2 => channel.output.cast_unsigned(),
                3 => (channel.shift_register & 0xFF) as u8,
                4 => (channel.shift_register >> 8) as u8,
                5 => channel.backup,
                6 => channel.control,
                _ => channel.counter,
            };
        }

        // Stereo attenuation pairs.
        if (0x20..0x28).contains(&addr) {
            let channel = &self.channels[usize::from(addr - 0x20) >> 1];
            return if addr & 1 != 0 {
                channel.right_atten
            } else {
                channel.left_atten
            };
        }

        if addr == 0x30 {
            return self.master_volume;
        }

        0
    }

    /// Write an audio register, `addr` relative to `$FD20`.
    pub fn write(&mut self, addr: u8, value: u8) {
        if addr < 0x20 {
            let channel = &mut self.channels[usize::from((addr >> 3) & 0x03)];
            match addr & 0x07 {
                0 => channel.volume = value,
                1 => channel.feedback = value,
                2 => channel.output = value.cast_signed(),
                3 => {
                    channel.shift_register = (channel.shift_register & 0xF00) | u16::from(value);
                }
                4 => {
                    channel.shift_register =
                        (channel.shift_register & 0x0FF) | (u16::from(value & 0x0F) << 8);
                }
                5 => channel.backup = value,
                6 => {
                    channel.control = value;
                    channel.enabled = value & 0x08 != 0;
                    channel.integrate = value & 0x20 != 0;
                    // Bit 6: reset-done strobe, reloads the counter.
                    if value & 0x40 != 0 {
                        channel.done = false;
                        channel.counter = channel.backup;
                    }
                }
                _ => channel.counter = value,
            }
            return;
        }

        if (0x20..0x28).contains(&addr) {
            let channel = &mut self.channels[usize::from(addr - 0x20) >> 1];
            if addr & 1 != 0 {
                channel.right_atten = value & 0x0F;
            } else {
                channel.left_atten = value & 0x0F;
            }
            return;
        }

        if addr == 0x30 {
            self.master_volume = value;
        }
    }

    /// Drain the interleaved stereo output accumulated since the last
    /// call.
    pub fn take_samples(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }

    pub fn serialize(&mut self, s: &mut Serializer) {
        for channel in &mut self.channels {
            channel.serialize(s);
        }
        s.u8(&mut self.master_volume);
        s.bool(&mut self.stereo_enabled);
        s.u32(&mut self.clock_accumulator);
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underflow_clocks_the_shift_register() {
        let mut apu = Apu::new();
        apu.write(0x00, 100); // volume
        apu.write(0x01, 0x01); // feedback from tap 0
        apu.write(0x05, 0); // backup
        apu.write(0x07, 0); // counter
        apu.write(0x06, 0x08); // enable, 1 us clock

        for _ in 0..4 {
            apu.tick();
        }

        // 0x001 shifts right, the tap feeds bit 11.
        assert_eq!(apu.read(0x03), 0x00);
        assert_eq!(apu.read(0x04), 0x08);
        assert_eq!(apu.read(0x02), 156, "low bit clear selects -volume");
    }

    #[test]
    fn done_blocks_until_the_reset_strobe() {
        let mut apu = Apu::new();
        apu.write(0x00, 100);
        apu.write(0x05, 0);
        apu.write(0x07, 0);
        apu.write(0x06, 0x08);

        for _ in 0..4 {
            apu.tick();
        }
        assert_eq!(apu.read(0x04), 0x00, "0x001 shifted out, no feedback");
        for _ in 0..8 {
            apu.tick();
        }
        assert_eq!(apu.read(0x03), 0x00, "done channel holds its state");

        apu.write(0x06, 0x48); // reset-done strobe
        apu.write(0x01, 0x80); // tap bit 10
        apu.write(0x03, 0x01);
        apu.write(0x04, 0x04); // shift register 0x401: tap 10 set
        for _ in 0..4 {
            apu.tick();
        }
        assert_eq!(apu.read(0x04), 0x0A, "0x401 -> 0xA00 with feedback");
    }

    #[test]
    fn integrate_mode_accumulates_and_clamps() {
        let mut apu = Apu::new();
        apu.write(0x00, 100);
        apu.write(0x01, 0x00); // no feedback: register drains to zero
        apu.write(0x05, 0);
        apu.write(0x07, 0);
        apu.write(0x06, 0x28); // integrate + enable

        for _ in 0..4 {
            apu.tick();
        }
        assert_eq!(apu.read(0x02), (-100i8).cast_unsigned());

        apu.write(0x06, 0x68); // reset done, stay integrating
        for _ in 0..4 {
            apu.tick();
        }
        assert_eq!(apu.read(0x02), (-128i8).cast_unsigned(), "clamped at i8 floor");
    }

    #[test]
    fn linked_channel_counts_source_underflows() {
        let mut apu = Apu::new();
        // Channel 0 underflows every 4 ticks.
        apu.write(0x05, 0);
        apu.write(0x07, 0);
        apu.write(0x06, 0x08);
        // Channel 1 linked, one source underflow from wrapping.
        apu.write(0x08, 10); // volume
        apu.write(0x0D, 5); // backup
        apu.write(0x0F, 1); // counter
        apu.write(0x0E, 0x0F); // enable + linked

        for _ in 0..4 {
            apu.tick();
        }
        assert_eq!(apu.channels[1].counter, 0, "first pulse counts 1 -> 0");

        apu.write(0x06, 0x48); // wake channel 0 again
        for _ in 0..4 {
            apu.tick();
        }
        assert!(apu.channels[1].done);
        assert_eq!(apu.read(0x0F), 5, "reloaded from backup");
        assert_eq!(apu.read(0x0A), (-10i8).cast_unsigned());
    }

    #[test]
    fn mixer_emits_interleaved_stereo() {
        let mut apu = Apu::new();
        apu.write(0x02, 50); // output preset
        apu.write(0x07, 0xFF); // far from underflow
        apu.write(0x06, 0x08); // enable
        apu.write(0x20, 8); // left attenuation
        apu.write(0x21, 8); // right attenuation
        apu.write(0x30, 15); // master volume

        for _ in 0..Apu::CLOCKS_PER_SAMPLE - 1 {
            apu.tick();
        }
        assert!(apu.take_samples().is_empty());

        apu.tick();
        // (50 * 8) >> 2 = 100, master (100 * 16) >> 4 = 100, mono
        // fold-down keeps it, scaled by 64.
        assert_eq!(apu.take_samples(), vec![6400, 6400]);
    }

    #[test]
    fn disabled_channels_stay_out_of_the_mix() {
        let mut apu = Apu::new();
        apu.write(0x02, 50);
        apu.write(0x20, 15);
        apu.write(0x21, 15);
        apu.write(0x30, 255);

        for _ in 0..Apu::CLOCKS_PER_SAMPLE {
            apu.tick();
        }
        assert_eq!(apu.take_samples(), vec![0, 0]);
    }

    #[test]
    fn register_file_reads_back() {
        let mut apu = Apu::new();
        apu.write(0x18, 0x42); // channel 3 volume
        apu.write(0x1B, 0xAB); // shift low
        apu.write(0x1C, 0xFC); // shift high: only the low nibble lands
        apu.write(0x1E, 0x48); // control stores the full byte
        apu.write(0x26, 0xFF); // attenuation masked to a nibble
        apu.write(0x30, 0x80);

        assert_eq!(apu.read(0x18), 0x42);
        assert_eq!(apu.read(0x1B), 0xAB);
        assert_eq!(apu.read(0x1C), 0x0C);
        assert_eq!(apu.read(0x1E), 0x48);
        assert_eq!(apu.read(0x26), 0x0F);
        assert_eq!(apu.read(0x30), 0x80);
        assert_eq!(apu.read(0x2C), 0, "unmapped gap reads zero");
    }

    #[test]
    fn state_round_trip() {
        let mut apu = Apu::new();
        apu.write(0x00, 0x55);
        apu.write(0x03, 0x21);
        apu.write(0x06, 0x28);
        apu.write(0x21, 7);
        apu.write(0x30, 0x99);
        for _ in 0..10 {
            apu.tick();
        }

        let mut s = Serializer::writer();
        apu.serialize(&mut s);
        let data = s.finish();

        let mut restored = Apu::new();
        let mut s = Serializer::reader(data);
        restored.serialize(&mut s);
        assert!(!s.has_failed());
        assert_eq!(restored.read(0x00), 0x55);
        assert_eq!(restored.read(0x03), apu.read(0x03));
        assert_eq!(restored.read(0x21), 7);
        assert_eq!(restored.read(0x30), 0x99);
        assert_eq!(restored.clock_accumulator, 10);
    }
}
