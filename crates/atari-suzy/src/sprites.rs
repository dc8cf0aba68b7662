//! Sprite engine.
//!
//! Sprites live in work RAM as a linked list of sprite control blocks
//! (SCBs). Writing the go bit to `SPRGO` makes Suzy take the bus and walk
//! the whole chain: for each SCB it loads the control bytes, optionally
//! reloads size/stretch/tilt values and the pen lookup table, then renders
//! the sprite's pixel data in up to four quadrants around its origin,
//! scaling each source pixel by the 8.8 fixed point size accumulators.
//! Pixels land directly in the 4bpp framebuffer; collision numbers land in
//! a parallel collision buffer, and the highest collision number a sprite
//! painted over is deposited back into its SCB.
//!
//! Every RAM access the engine makes is tallied and returned so the CPU
//! can be stalled for the time Suzy owned the bus.

use crate::suzy::Suzy;
use crate::{BYTES_PER_SCANLINE, SCREEN_HEIGHT, SCREEN_WIDTH};

const WIDTH: i32 = SCREEN_WIDTH as i32;
const HEIGHT: i32 = SCREEN_HEIGHT as i32;
const STRIDE: u16 = BYTES_PER_SCANLINE as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpriteType {
    BackgroundShadow,
    BackgroundNonCollide,
    BoundaryShadow,
    Boundary,
    Normal,
    NonCollidable,
    XorShadow,
    Shadow,
}

impl SpriteType {
    fn from_bits(ctl0: u8) -> Self {
        match ctl0 & 0x07 {
            0 => Self::BackgroundShadow,
            1 => Self::BackgroundNonCollide,
            2 => Self::BoundaryShadow,
            3 => Self::Boundary,
            4 => Self::Normal,
            5 => Self::NonCollidable,
            6 => Self::XorShadow,
            _ => Self::Shadow,
        }
    }

    /// Types that deposit their collision result into the SCB.
    fn collideable(self) -> bool {
        matches!(
            self,
            Self::BoundaryShadow | Self::Boundary | Self::Normal | Self::XorShadow | Self::Shadow
        )
    }
}

/// Bit-serial reader over one line of sprite data. Bytes are pulled from
/// RAM lazily, so only bytes the decoder actually touches count as bus
/// accesses.
struct BitStream<'a> {
    ram: &'a [u8; 0x1_0000],
    cursor: u16,
    line_end: u16,
    shift_reg: u32,
    shift_count: i32,
    bits_left: i32,
    reads: u32,
}

impl<'a> BitStream<'a> {
    fn new(ram: &'a [u8; 0x1_0000], start: u16, line_end: u16) -> Self {
        Self {
            ram,
            cursor: start,
            line_end,
            shift_reg: 0,
            shift_count: 0,
            bits_left: i32::from(line_end.wrapping_sub(start)) * 8,
            reads: 0,
        }
    }

    fn get(&mut self, bits: i32) -> u8 {
        // <= rather than <: the hardware refuses to start a read it cannot
        // complete, which some demos rely on
        if self.bits_left <= bits {
            return 0;
        }
        while self.shift_count < bits && self.cursor < self.line_end {
            self.shift_reg = (self.shift_reg << 8) | u32::from(self.ram[usize::from(self.cursor)]);
            self.cursor = self.cursor.wrapping_add(1);
            self.reads += 1;
            self.shift_count += 8;
        }
        if self.shift_count < bits {
            return 0;
        }
        self.shift_count -= bits;
        self.bits_left -= bits;
        ((self.shift_reg >> self.shift_count) & ((1 << bits) - 1)) as u8
    }
}

impl Suzy {
    /// Walk the SCB chain and render every sprite in it. Returns the number
    /// of bus cycles consumed, which the caller charges to the CPU.
    pub(crate) fn process_sprite_chain(
        &mut self,
        ram: &mut [u8; 0x1_0000],
        display_address: u16,
    ) -> u32 {
        if !self.sprite_enabled {
            self.sprite_busy = false;
            return 0;
        }

        self.sprite_busy = true;
        self.bus_cycles = 0;

        let framebuffer = if self.video_base != 0 {
            self.video_base
        } else {
            display_address
        };

        // The hardware only compares the high byte of the link pointer
        // against zero, so a link of $00xx ends the chain while $0100 does
        // not. The count limit is a runaway guard for malformed chains.
        let mut scb = self.scb_address;
        let mut sprite_count = 0;
        while scb & 0xFF00 != 0 && sprite_count < 256 {
            self.process_sprite(ram, scb, framebuffer);
            scb = self.read_ram16(ram, scb.wrapping_add(3));
            sprite_count += 1;
        }

        self.sprite_busy = false;
        self.bus_cycles
    }

    fn process_sprite(&mut self, ram: &mut [u8; 0x1_0000], scb: u16, framebuffer: u16) {
        let ctl0 = self.read_ram(ram, scb);
        let ctl1 = self.read_ram(ram, scb.wrapping_add(1));
        let coll = self.read_ram(ram, scb.wrapping_add(2));

        // SPRCTL1 bit 2 skips the sprite; the chain link is still followed
        if ctl1 & 0x04 != 0 {
            return;
        }

        let bpp = ((ctl0 >> 6) & 0x03) + 1;
        let sprite_type = SpriteType::from_bits(ctl0);
        let hflip = ctl0 & 0x20 != 0;
        let vflip = ctl0 & 0x10 != 0;

        let start_left = ctl1 & 0x01 != 0;
        let start_up = ctl1 & 0x02 != 0;
        let reload_palette = ctl1 & 0x08 == 0; // active low
        let reload_depth = (ctl1 >> 4) & 0x03;
        let literal = ctl1 & 0x80 != 0;

        let coll_num = coll & 0x0F;
        let dont_collide = coll & 0x20 != 0;

        let mut data_addr = self.read_ram16(ram, scb.wrapping_add(5));
        self.persist_hpos = self.read_ram16(ram, scb.wrapping_add(7)) as i16;
        self.persist_vpos = self.read_ram16(ram, scb.wrapping_add(9)) as i16;

        // Optional SCB fields, presence controlled by the reload depth
        let mut scb_offset = scb.wrapping_add(11);
        let mut enable_stretch = false;
        let mut enable_tilt = false;
        if reload_depth >= 1 {
            self.persist_hsize = self.read_ram16(ram, scb_offset);
            self.persist_vsize = self.read_ram16(ram, scb_offset.wrapping_add(2));
            scb_offset = scb_offset.wrapping_add(4);
            if reload_depth >= 2 {
                enable_stretch = true;
                self.persist_stretch = self.read_ram16(ram, scb_offset) as i16;
                scb_offset = scb_offset.wrapping_add(2);
            }
            if reload_depth >= 3 {
                enable_tilt = true;
                self.persist_tilt = self.read_ram16(ram, scb_offset) as i16;
                scb_offset = scb_offset.wrapping_add(2);
            }
        }

        if reload_palette {
            for i in 0..8u16 {
                let byte = self.read_ram(ram, scb_offset.wrapping_add(i));
                self.pen_index[usize::from(i) * 2] = byte >> 4;
                self.pen_index[usize::from(i) * 2 + 1] = byte & 0x0F;
            }
        }

        let screen_h_start = i32::from(self.h_offset);
        let screen_h_end = screen_h_start + WIDTH;
        let screen_v_start = i32::from(self.v_offset);
        let screen_v_end = screen_v_start + HEIGHT;
        let world_h_mid = screen_h_start + WIDTH / 2;
        let world_v_mid = screen_v_start + HEIGHT / 2;

        // Quadrant layout around the sprite origin:  2 | 1
        //                                           -------
        //                                            3 | 0
        let mut quadrant: usize = if start_left {
            if start_up { 2 } else { 3 }
        } else if start_up {
            1
        } else {
            0
        };

        let spr_h = i32::from(self.persist_hpos);
        let spr_v = i32::from(self.persist_vpos);
        let superclip = spr_h < screen_h_start
            || spr_h >= screen_h_end
            || spr_v < screen_v_start
            || spr_v >= screen_v_end;

        let mut ever_on_screen = false;
        self.sprite_collision = 0;

        // Quadrants after the first that draw in the opposite direction are
        // shifted one pixel so the halves of a multi-quadrant sprite meet
        // instead of overlapping.
        let mut vquad_sign = 0;
        let mut hquad_sign = 0;

        'quadrants: for loop_index in 0..4 {
            let mut hsign: i32 = if quadrant == 0 || quadrant == 1 { 1 } else { -1 };
            let mut vsign: i32 = if quadrant == 0 || quadrant == 3 { 1 } else { -1 };
            if vflip {
                vsign = -vsign;
            }
            if hflip {
                hsign = -hsign;
            }

            // When the origin is off-screen, only render quadrants that can
            // reach the visible area, accounting for flips.
            let render = if superclip {
                const VQUAD_FLIP: [usize; 4] = [1, 0, 3, 2];
                const HQUAD_FLIP: [usize; 4] = [3, 2, 1, 0];
                let mut modquad = quadrant;
                if vflip {
                    modquad = VQUAD_FLIP[modquad];
                }
                if hflip {
                    modquad = HQUAD_FLIP[modquad];
                }
                match modquad {
                    0 => {
                        (spr_h < screen_h_end || spr_h >= world_h_mid)
                            && (spr_v < screen_v_end || spr_v >= world_v_mid)
                    }
                    1 => {
                        (spr_h < screen_h_end || spr_h >= world_h_mid)
                            && (spr_v >= screen_v_start || spr_v <= world_v_mid)
                    }
                    2 => {
                        (spr_h >= screen_h_start || spr_h <= world_h_mid)
                            && (spr_v >= screen_v_start || spr_v <= world_v_mid)
                    }
                    _ => {
                        (spr_h >= screen_h_start || spr_h <= world_h_mid)
                            && (spr_v < screen_v_end || spr_v >= world_v_mid)
                    }
                }
            } else {
                true
            };

            if render {
                let mut voff = i32::from(self.persist_vpos) - screen_v_start;
                let mut tilt_accum: i32 = 0;
                let mut vsiz_accum: u16 = if vsign == 1 { self.v_size_offset } else { 0 };

                if loop_index == 0 {
                    vquad_sign = vsign;
                }
                if vsign != vquad_sign {
                    voff += vsign;
                }

                // Working copies so stretch and tilt restart per quadrant
                let mut hsize = self.persist_hsize;
                let mut vsize = self.persist_vsize;
                let q_stretch = self.persist_stretch;
                let q_tilt = self.persist_tilt;
                let q_hpos = self.persist_hpos;

                loop {
                    vsiz_accum = vsiz_accum.wrapping_add(vsize);
                    let pixel_height = vsiz_accum >> 8;
                    vsiz_accum &= 0x00FF;

                    let line_offset = self.read_ram(ram, data_addr);
                    data_addr = data_addr.wrapping_add(1);

                    if line_offset == 1 {
                        break; // end of quadrant
                    }
                    if line_offset == 0 {
                        break 'quadrants; // end of sprite
                    }

                    let line_end = data_addr.wrapping_add(u16::from(line_offset) - 1);
                    let mut pixels = [0u8; 512];
                    let pixel_count =
                        self.decode_sprite_line(ram, data_addr, line_end, bpp, literal, &mut pixels);
                    data_addr = line_end;

                    for _ in 0..pixel_height {
                        if vsign == 1 && voff >= HEIGHT {
                            break;
                        }
                        if vsign == -1 && voff < 0 {
                            break;
                        }

                        if voff >= 0 && voff < HEIGHT {
                            let mut hoff =
                                i32::from(q_hpos) + (tilt_accum >> 8) - screen_h_start;
                            let mut hsiz_accum = self.h_size_offset;

                            if loop_index == 0 {
                                hquad_sign = hsign;
                            }
                            if hsign != hquad_sign {
                                hoff += hsign;
                            }

                            let mut onscreen = false;
                            for &pixel in &pixels[..pixel_count] {
                                hsiz_accum = hsiz_accum.wrapping_add(hsize);
                                let pixel_width = hsiz_accum >> 8;
                                hsiz_accum &= 0x00FF;

                                let pen = self.pen_index[usize::from(pixel & 0x0F)];

                                for _ in 0..pixel_width {
                                    if hoff >= 0 && hoff < WIDTH {
                                        // Background types draw pen 0 too
                                        if pixel != 0
                                            || sprite_type == SpriteType::BackgroundShadow
                                            || sprite_type == SpriteType::BackgroundNonCollide
                                        {
                                            self.write_sprite_pixel(
                                                ram,
                                                framebuffer,
                                                hoff,
                                                voff,
                                                pen,
                                                coll_num,
                                                dont_collide,
                                                sprite_type,
                                            );
                                        }
                                        onscreen = true;
                                        ever_on_screen = true;
                                    } else if onscreen {
                                        break;
                                    }
                                    hoff += hsign;
                                }
                            }
                        }

                        voff += vsign;

                        if enable_stretch {
                            hsize = hsize.wrapping_add_signed(q_stretch);
                            if self.vstretch {
                                vsize = vsize.wrapping_add_signed(q_stretch);
                            }
                        }
                        if enable_tilt {
                            tilt_accum += i32::from(q_tilt);
                        }
                    }
                }
            } else {
                // Consume this quadrant's data without rendering it
                loop {
                    let line_offset = self.read_ram(ram, data_addr);
                    data_addr = data_addr.wrapping_add(1);
                    if line_offset == 1 {
                        break;
                    }
                    if line_offset == 0 {
                        break 'quadrants;
                    }
                    data_addr = data_addr.wrapping_add(u16::from(line_offset) - 1);
                }
            }

            quadrant = (quadrant + 1) & 0x03;
        }

        if !dont_collide && !self.no_collide && sprite_type.collideable() {
            let depository = scb.wrapping_add(self.coll_offset);
            self.write_ram(ram, depository, self.sprite_collision);
        }

        if self.ever_on {
            let depository = scb.wrapping_add(self.coll_offset);
            let mut value = self.read_ram(ram, depository);
            if ever_on_screen {
                value &= 0x7F;
            } else {
                value |= 0x80;
            }
            self.write_ram(ram, depository, value);
        }
    }

    /// Decode one line of sprite data into pixel values.
    ///
    /// Literal lines are a plain bit-packed run of `bpp`-wide pixels, with
    /// a zero in the final position dropped. Packed lines are packets led
    /// by a literal/repeat flag bit and a 4-bit count: literal packets
    /// carry `count + 1` pixel values, repeat packets one value repeated
    /// `count + 1` times, and a repeat packet with a zero count ends the
    /// line early.
    fn decode_sprite_line(
        &mut self,
        ram: &[u8; 0x1_0000],
        start: u16,
        line_end: u16,
        bpp: u8,
        literal: bool,
        pixels: &mut [u8; 512],
    ) -> usize {
        let mut stream = BitStream::new(ram, start, line_end);
        let mut count = 0;

        if literal {
            let total_pixels = (stream.bits_left / i32::from(bpp)) as usize;
            for _ in 0..total_pixels {
                if count >= pixels.len() {
                    break;
                }
                let pixel = stream.get(i32::from(bpp));
                pixels[count] = pixel;
                count += 1;
                if count == total_pixels && pixel == 0 {
                    count -= 1; // trailing zero marks end of data
                    break;
                }
            }
        } else {
            while stream.bits_left > 0 && count < pixels.len() {
                let is_literal = stream.get(1) != 0;
                if stream.bits_left <= 0 {
                    break;
                }
                let header = stream.get(4);
                if !is_literal && header == 0 {
                    break; // end of line packet
                }
                let run = usize::from(header) + 1;
                if is_literal {
                    for _ in 0..run {
                        if count >= pixels.len() {
                            break;
                        }
                        pixels[count] = stream.get(i32::from(bpp));
                        count += 1;
                    }
                } else {
                    let pixel = stream.get(i32::from(bpp));
                    for _ in 0..run {
                        if count >= pixels.len() {
                            break;
                        }
                        pixels[count] = pixel;
                        count += 1;
                    }
                }
            }
        }

        self.bus_cycles += stream.reads;
        count
    }

    fn write_sprite_pixel(
        &mut self,
        ram: &mut [u8; 0x1_0000],
        framebuffer: u16,
        x: i32,
        y: i32,
        pen: u8,
        coll_num: u8,
        dont_collide: bool,
        sprite_type: SpriteType,
    ) {
        if x < 0 || x >= WIDTH || y < 0 || y >= HEIGHT {
            return;
        }

        let pixel_offset = (y as u16) * STRIDE + (x >> 1) as u16;
        let byte_addr = framebuffer.wrapping_add(pixel_offset);
        let byte = self.read_ram(ram, byte_addr);
        let existing = if x & 1 != 0 { byte & 0x0F } else { byte >> 4 };

        let mut write_pixel = pen & 0x0F;
        let mut do_write = false;
        let mut do_collision = false;

        match sprite_type {
            SpriteType::BackgroundShadow => {
                // Draws everything; marks the collision buffer without
                // reading a collision back
                do_write = true;
                if !self.no_collide && !dont_collide && write_pixel != 0x0E {
                    do_collision = true;
                }
            }
            SpriteType::BackgroundNonCollide => do_write = true,
            SpriteType::BoundaryShadow => {
                if write_pixel != 0x00 && write_pixel != 0x0E && write_pixel != 0x0F {
                    do_write = true;
                }
                if write_pixel != 0x00 && write_pixel != 0x0E {
                    do_collision = !self.no_collide && !dont_collide;
                }
            }
            SpriteType::Boundary => {
                if write_pixel != 0x00 && write_pixel != 0x0F {
                    do_write = true;
                }
                if write_pixel != 0x00 && write_pixel != 0x0E {
                    do_collision = !self.no_collide && !dont_collide;
                }
            }
            SpriteType::Normal | SpriteType::Shadow => {
                if write_pixel != 0x00 {
                    do_write = true;
                }
                if write_pixel != 0x00 && write_pixel != 0x0E {
                    do_collision = !self.no_collide && !dont_collide;
                }
            }
            SpriteType::NonCollidable => {
                if write_pixel != 0x00 {
                    do_write = true;
                }
            }
            SpriteType::XorShadow => {
                if write_pixel != 0x00 {
                    write_pixel = existing ^ write_pixel;
                    do_write = true;
                }
                // Collision keys off the pen before the XOR
                if pen & 0x0F != 0x00 && pen & 0x0F != 0x0E {
                    do_collision = !self.no_collide && !dont_collide;
                }
            }
        }

        if do_write {
            let merged = if x & 1 != 0 {
                (byte & 0xF0) | write_pixel
            } else {
                (byte & 0x0F) | (write_pixel << 4)
            };
            self.write_ram(ram, byte_addr, merged);
        }

        if do_collision && coll_num > 0 {
            let coll_addr = self.collision_base.wrapping_add(pixel_offset);
            let coll_byte = self.read_ram(ram, coll_addr);
            let existing_coll = if x & 1 != 0 {
                coll_byte & 0x0F
            } else {
                coll_byte >> 4
            };

            if sprite_type != SpriteType::BackgroundShadow
                && existing_coll > self.sprite_collision
            {
                self.sprite_collision = existing_coll;
                self.sprite_to_sprite_collision = true;
            }

            let merged = if x & 1 != 0 {
                (coll_byte & 0xF0) | coll_num
            } else {
                (coll_byte & 0x0F) | (coll_num << 4)
            };
            self.write_ram(ram, coll_addr, merged);
        }
    }

    fn read_ram(&mut self, ram: &[u8; 0x1_0000], addr: u16) -> u8 {
        self.bus_cycles += 1;
        ram[usize::from(addr)]
    }

    fn read_ram16(&mut self, ram: &[u8; 0x1_0000], addr: u16) -> u16 {
        let low = self.read_ram(ram, addr);
        let high = self.read_ram(ram, addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    fn write_ram(&mut self, ram: &mut [u8; 0x1_0000], addr: u16, value: u8) {
        self.bus_cycles += 1;
        ram[usize::from(addr)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Suzy {
        let mut suzy = Suzy::new();
        suzy.video_base = 0x8000;
        suzy.collision_base = 0x9000;
        suzy.coll_offset = 0x000B;
        suzy.scb_address = 0x2000;
        suzy.sprite_enabled = true;
        suzy
    }

    fn ram() -> Box<[u8; 0x1_0000]> {
        Box::new([0; 0x1_0000])
    }

    fn poke(ram: &mut [u8; 0x1_0000], addr: u16, bytes: &[u8]) {
        let addr = usize::from(addr);
        ram[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// 11-byte SCB header: control bytes, link, data pointer, position.
    fn scb(ctl0: u8, ctl1: u8, coll: u8, next: u16, data: u16, hpos: i16, vpos: i16) -> [u8; 11] {
        let next = next.to_le_bytes();
        let data = data.to_le_bytes();
        let hpos = hpos.to_le_bytes();
        let vpos = vpos.to_le_bytes();
        [
            ctl0, ctl1, coll, next[0], next[1], data[0], data[1], hpos[0], hpos[1], vpos[0],
            vpos[1],
        ]
    }

    #[test]
    fn literal_sprite_draws_pixels_and_collisions() {
        let mut suzy = engine();
        let mut ram = ram();
        // 4bpp literal Normal sprite at (10, 5), one line of pens A, B, C
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x03, 0xAB, 0xC0, 0x00]);
        ram[0x200B] = 0xEE;

        let stall = suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xAB, "pixels at x=10,11");
        assert_eq!(ram[0x8196], 0xC0, "pixel at x=12");
        assert_eq!(ram[0x9195], 0x11, "collision numbers");
        assert_eq!(ram[0x9196], 0x10);
        assert_eq!(ram[0x200B], 0x00, "depository reports no hit");
        assert!(stall > 0);
        assert!(!suzy.sprite_busy);
    }

    #[test]
    fn packed_repeat_run_expands() {
        let mut suzy = engine();
        let mut ram = ram();
        // Packed line: repeat packet, count 2+1, pen 7, then end-of-line
        poke(&mut ram, 0x2000, &scb(0xC4, 0x08, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x03, 0x13, 0x80, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0x77);
        assert_eq!(ram[0x8196], 0x70);
    }

    #[test]
    fn xor_shadow_xors_existing_pixels() {
        let mut suzy = engine();
        let mut ram = ram();
        poke(&mut ram, 0x2000, &scb(0xC6, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x02, 0x50, 0x00]);
        ram[0x8195] = 0xA0; // existing pen A at (10, 5)

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xF0, "A ^ 5 = F");
    }

    #[test]
    fn background_type_draws_pen_zero() {
        let mut suzy = engine();
        let mut ram = ram();
        // BackgroundShadow, pens A, 0, C; pen 0 must still be painted
        poke(&mut ram, 0x2000, &scb(0xC0, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x03, 0xA0, 0xC0, 0x00]);
        ram[0x8195] = 0xFF;
        ram[0x8196] = 0xFF;
        ram[0x200B] = 0xEE;

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xA0, "pen 0 overwrites at x=11");
        assert_eq!(ram[0x8196], 0xCF);
        assert_eq!(ram[0x9195], 0x11, "pen 0 still marks collisions");
        assert_eq!(ram[0x200B], 0xEE, "background types never deposit");
    }

    #[test]
    fn skip_bit_follows_the_chain() {
        let mut suzy = engine();
        let mut ram = ram();
        // First sprite skipped (SPRCTL1 bit 2), second draws at (0, 0)
        poke(&mut ram, 0x2000, &scb(0xC4, 0x8C, 0x01, 0x2040, 0x2100, 10, 5));
        poke(&mut ram, 0x2040, &scb(0xC4, 0x88, 0x02, 0, 0x2180, 0, 0));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);
        poke(&mut ram, 0x2180, &[0x02, 0xB0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0x00, "skipped sprite drew nothing");
        assert_eq!(ram[0x8000], 0xB0, "linked sprite drew");
    }

    #[test]
    fn chain_ends_when_link_high_byte_is_zero() {
        let mut suzy = engine();
        let mut ram = ram();
        // Link of $00FF has a zero high byte, so the second SCB is ignored
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0x00FF, 0x2100, 10, 5));
        poke(&mut ram, 0x00FF, &scb(0xC4, 0x88, 0x02, 0, 0x2180, 20, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);
        poke(&mut ram, 0x2180, &[0x02, 0xB0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xA0);
        assert_eq!(ram[0x819A], 0x00, "second sprite never processed");
    }

    #[test]
    fn everon_reports_offscreen_sprite() {
        let mut suzy = engine();
        suzy.ever_on = true;
        let mut ram = ram();
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 500, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);
        assert_eq!(ram[0x200B], 0x80, "bit 7 set when never on screen");

        // On-screen sprite clears the flag
        let mut suzy = engine();
        suzy.ever_on = true;
        let mut ram = self::ram();
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);
        ram[0x200B] = 0xEE;

        suzy.process_sprite_chain(&mut ram, 0);
        assert_eq!(ram[0x200B], 0x00);
    }

    #[test]
    fn vertical_scaling_doubles_lines() {
        let mut suzy = engine();
        let mut ram = ram();
        // Reload depth 1: VSIZE $0200 renders each source line twice
        poke(&mut ram, 0x2000, &scb(0xC4, 0x98, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x200B, &[0x00, 0x01, 0x00, 0x02]); // HSIZE, VSIZE
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xA0, "line 5");
        assert_eq!(ram[0x81E5], 0xA0, "line 6");
        assert_eq!(ram[0x8235], 0x00, "line 7 untouched");
    }

    #[test]
    fn horizontal_scaling_uses_persistent_size() {
        let mut suzy = engine();
        suzy.persist_hsize = 0x0200;
        let mut ram = ram();
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xAA, "pixel doubled to x=10,11");
    }

    #[test]
    fn start_left_renders_right_to_left() {
        let mut suzy = engine();
        let mut ram = ram();
        poke(&mut ram, 0x2000, &scb(0xC4, 0x89, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x03, 0xAB, 0xC0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x8195], 0xA0, "A at x=10");
        assert_eq!(ram[0x8194], 0xCB, "B at x=9, C at x=8");
    }

    #[test]
    fn palette_reload_remaps_pens() {
        let mut suzy = engine();
        suzy.coll_offset = 0x0013; // keep the depository clear of the palette
        let mut ram = ram();
        // Reload palette (bit 3 clear): pen table becomes F..0
        poke(&mut ram, 0x2000, &scb(0xC4, 0x80, 0x01, 0, 0x2100, 10, 5));
        poke(
            &mut ram,
            0x200B,
            &[0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54, 0x32, 0x10],
        );
        poke(&mut ram, 0x2100, &[0x02, 0x10, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(suzy.pen_index[1], 0x0E);
        assert_eq!(ram[0x8195], 0xE0, "pixel value 1 mapped to pen E");
    }

    #[test]
    fn collision_depository_records_strongest_hit() {
        let mut suzy = engine();
        let mut ram = ram();
        // Sprite with collision number 3, then an overlapping one with 1
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x03, 0x2040, 0x2100, 10, 5));
        poke(&mut ram, 0x2040, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);
        ram[0x200B] = 0xEE;
        ram[0x204B] = 0xEE;

        suzy.process_sprite_chain(&mut ram, 0);

        assert_eq!(ram[0x200B], 0x00, "first sprite hit nothing");
        assert_eq!(ram[0x204B], 0x03, "second sprite hit the first");
        assert!(suzy.sprite_to_sprite_collision);
        assert_eq!(ram[0x9195] >> 4, 0x01, "buffer keeps the latest number");
    }

    #[test]
    fn stall_counts_bus_accesses() {
        let mut suzy = engine();
        let mut ram = ram();
        // Empty sprite: 9 header reads, 1 end marker, 1 depository write,
        // 2 link reads
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));

        let stall = suzy.process_sprite_chain(&mut ram, 0);
        assert_eq!(stall, 13);
    }

    #[test]
    fn disabled_engine_does_nothing() {
        let mut suzy = engine();
        suzy.sprite_enabled = false;
        let mut ram = ram();
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);

        let stall = suzy.process_sprite_chain(&mut ram, 0);
        assert_eq!(stall, 0);
        assert_eq!(ram[0x8195], 0x00);
    }

    #[test]
    fn uses_display_address_when_video_base_unset() {
        let mut suzy = engine();
        suzy.video_base = 0;
        let mut ram = ram();
        poke(&mut ram, 0x2000, &scb(0xC4, 0x88, 0x01, 0, 0x2100, 10, 5));
        poke(&mut ram, 0x2100, &[0x02, 0xA0, 0x00]);

        suzy.process_sprite_chain(&mut ram, 0xC000);

        assert_eq!(ram[0xC195], 0xA0);
    }
}
