//! Display DMA and the 12-bit palette.
//!
//! The visible 160x102 frame is packed four bits per pixel, 80 bytes per
//! line, fetched from work RAM at `DISPADR`. Timer 0 paces the fetch:
//! each underflow renders the line the beam is on into the ARGB
//! framebuffer before the line counter advances.

use crate::mikey::Mikey;
use crate::{BYTES_PER_SCANLINE, SCREEN_HEIGHT, SCREEN_WIDTH};

impl Mikey {
    /// Resolve palette entry `index` from its green and blue/red registers
    /// into ARGB. Each 4-bit component fills both nibbles of its 8-bit
    /// channel.
    pub(crate) fn update_palette(&mut self, index: usize) {
        let green = self.palette_green[index] & 0x0F;
        let blue = (self.palette_br[index] >> 4) & 0x0F;
        let red = self.palette_br[index] & 0x0F;

        let expand = |nibble: u8| u32::from(nibble << 4 | nibble);
        self.palette[index] = 0xFF00_0000 | expand(red) << 16 | expand(green) << 8 | expand(blue);
    }

    /// Draw the scanline the beam is on from work RAM into the
    /// framebuffer. Vertical blank lines and a disabled display draw
    /// nothing.
    pub(crate) fn render_scanline(&mut self, ram: &[u8; 0x1_0000]) {
        let line = usize::from(self.current_scanline);
        if line >= SCREEN_HEIGHT || self.display_control & 0x01 == 0 {
            return;
        }

        let line_addr = self
            .display_address
            .wrapping_add((line * BYTES_PER_SCANLINE) as u16);
        let dest = line * SCREEN_WIDTH;
        for x in 0..BYTES_PER_SCANLINE {
            // High nibble is the left pixel of the pair.
            let byte = ram[usize::from(line_addr.wrapping_add(x as u16))];
            self.framebuffer[dest + x * 2] = self.palette[usize::from(byte >> 4)];
            self.framebuffer[dest + x * 2 + 1] = self.palette[usize::from(byte & 0x0F)];
        }
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
    fn palette_writes_resolve_argb() {
        let mut mikey = Mikey::new();
        write(&mut mikey, 0xA0, 0x0F); // full green
        write(&mut mikey, 0xB0, 0xF0); // full blue, no red
        assert_eq!(mikey.palette[0], 0xFF00_FFFF);

        write(&mut mikey, 0xA1, 0x03);
        write(&mut mikey, 0xB1, 0x21);
        assert_eq!(mikey.palette[1], 0xFF11_3322, "nibbles replicate per channel");

        let eeprom = Eeprom::new(EepromKind::None);
        assert_eq!(mikey.peek_register(0xA1, &eeprom), 0x03);
        assert_eq!(mikey.peek_register(0xB1, &eeprom), 0x21);
    }

    #[test]
    fn render_honors_display_enable() {
        let mut mikey = Mikey::new();
        let mut ram = ram();
        ram[0x2000] = 0x12;
        write(&mut mikey, 0x94, 0x00);
        write(&mut mikey, 0x95, 0x20); // DISPADR = $2000
        write(&mut mikey, 0xA1, 0x0F); // entry 1 green
        write(&mut mikey, 0xB2, 0x0F); // entry 2 red

        mikey.render_scanline(&ram);
        assert_eq!(mikey.framebuffer()[0], 0xFF00_0000, "display disabled");

        write(&mut mikey, 0x92, 0x01);
        mikey.render_scanline(&ram);
        assert_eq!(mikey.framebuffer()[0], 0xFF00_FF00);
        assert_eq!(mikey.framebuffer()[1], 0xFFFF_0000);
    }

    #[test]
    fn vertical_blank_lines_are_not_rendered() {
        let mut mikey = Mikey::new();
        let mut ram = ram();
        ram.fill(0x11);
        write(&mut mikey, 0x92, 0x01);
        write(&mut mikey, 0xA1, 0x0F);

        mikey.current_scanline = 102;
        mikey.render_scanline(&ram);
        assert!(mikey.framebuffer().iter().all(|&p| p == 0xFF00_0000));
    }

    #[test]
    fn display_fetch_wraps_at_64k() {
        let mut mikey = Mikey::new();
        let mut ram = ram();
        ram[0xFFFF] = 0x11;
        ram[0x0000] = 0x22;
        write(&mut mikey, 0x94, 0xFF);
        write(&mut mikey, 0x95, 0xFF); // DISPADR = $FFFF
        write(&mut mikey, 0x92, 0x01);
        write(&mut mikey, 0xA1, 0x0F); // entry 1 green
        write(&mut mikey, 0xB2, 0x0F); // entry 2 red

        mikey.render_scanline(&ram);
        let fb = mikey.framebuffer();
        assert_eq!(fb[0], 0xFF00_FF00, "first byte from $FFFF");
        assert_eq!(fb[2], 0xFFFF_0000, "second byte wraps to $0000");
    }

    #[test]
    fn timer_zero_paces_scanlines_and_frames() {
        let mut mikey = Mikey::new();
        let mut ram = ram();
        ram[0] = 0x11;
        write(&mut mikey, 0x92, 0x01); // display enable, DISPADR = 0
        write(&mut mikey, 0xA1, 0x0F);
        // Timer 0: backup 0, enabled, one underflow every 4 cycles.
        write(&mut mikey, 0x00, 0);
        write(&mut mikey, 0x01, 0x08);

        let mut cycle = 4;
        mikey.tick(cycle, &ram);
        assert_eq!(mikey.current_scanline(), 1);
        assert_eq!(mikey.framebuffer()[0], 0xFF00_FF00, "line 0 rendered");
        assert!(!mikey.take_frame_complete());

        for _ in 1..105 {
            // Clear the done flag the way a display interrupt handler does.
            write(&mut mikey, 0x03, 0);
            cycle += 4;
            mikey.tick(cycle, &ram);
        }
        assert_eq!(mikey.current_scanline(), 0, "wrapped after the vblank lines");
        assert!(mikey.take_frame_complete());
        assert!(!mikey.take_frame_complete(), "the flag reads once");
    }
}
