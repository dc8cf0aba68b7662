//! Register file at `$FC00-$FCFF`.
//!
//! Address dispatch takes the low byte of the bus address. Reads of the
//! cart port (`RCART0`/`RCART1`) clock the cartridge address counter, so
//! the debugger-facing [`Suzy::peek_register`] goes through the cart's
//! side-effect-free peek instead.

use emu_core::{Observable, Serializer, Snapshot, Value};
use lynx_cartridge::Cart;

use crate::math::MathUnit;

/// Suzy: the sprite engine, hardware multiply/divide unit, joystick port
/// and cartridge port of the Lynx.
///
/// Suzy has no clock input of its own here. Sprite processing runs to
/// completion inside the `SPRGO` write and reports the bus cycles it
/// consumed, which the caller applies to the CPU as a stall.
pub struct Suzy {
    pub(crate) scb_address: u16,
    pub(crate) sprite_control0: u8,
    pub(crate) sprite_control1: u8,
    pub(crate) sprite_coll: u8,
    pub(crate) sprite_init: u8,
    pub(crate) sprite_busy: bool,
    pub(crate) sprite_enabled: bool,

    pub(crate) math: MathUnit,

    pub(crate) unsafe_access: bool,
    pub(crate) sprite_to_sprite_collision: bool,
    pub(crate) stop_on_current: bool,
    pub(crate) vstretch: bool,
    pub(crate) left_hand: bool,

    pub(crate) collision_buffer: [u8; 16],
    /// Highest collision number read back while drawing the current sprite.
    pub(crate) sprite_collision: u8,

    pub(crate) h_offset: i16,
    pub(crate) v_offset: i16,
    pub(crate) video_base: u16,
    pub(crate) collision_base: u16,
    pub(crate) coll_offset: u16,
    pub(crate) h_size_offset: u16,
    pub(crate) v_size_offset: u16,

    pub(crate) ever_on: bool,
    pub(crate) no_collide: bool,

    joystick: u8,
    switches: u8,

    pub(crate) pen_index: [u8; 16],

    // SCB fields that survive from one sprite to the next
    pub(crate) persist_hpos: i16,
    pub(crate) persist_vpos: i16,
    pub(crate) persist_hsize: u16,
    pub(crate) persist_vsize: u16,
    pub(crate) persist_stretch: i16,
    pub(crate) persist_tilt: i16,

    // Bus accesses made by the sprite engine, not serialized
    pub(crate) bus_cycles: u32,
}

impl Suzy {
    pub fn new() -> Self {
        Self {
            scb_address: 0,
            sprite_control0: 0,
            sprite_control1: 0,
            sprite_coll: 0,
            sprite_init: 0,
            sprite_busy: false,
            sprite_enabled: false,
            math: MathUnit::new(),
            unsafe_access: false,
            sprite_to_sprite_collision: false,
            stop_on_current: false,
            vstretch: false,
            left_hand: false,
            collision_buffer: [0; 16],
            sprite_collision: 0,
            h_offset: 0,
            v_offset: 0,
            video_base: 0,
            collision_base: 0,
            coll_offset: 0,
            h_size_offset: 0x007F,
            v_size_offset: 0x007F,
            ever_on: false,
            no_collide: false,
            // Active low, all buttons released
            joystick: 0xFF,
            switches: 0xFF,
            pen_index: std::array::from_fn(|i| i as u8),
            persist_hpos: 0,
            persist_vpos: 0,
            persist_hsize: 0x0100,
            persist_vsize: 0x0100,
            persist_stretch: 0,
            persist_tilt: 0,
            bus_cycles: 0,
        }
    }

    /// Read a Suzy register. `RCART0`/`RCART1` select a bank and clock a
    /// byte out of the cartridge.
    pub fn read_register(&mut self, addr: u8, cart: &mut Cart) -> u8 {
        match addr {
            0xB2 => {
                cart.select_bank(0);
                cart.read_data()
            }
            0xB3 => {
                cart.select_bank(1);
                cart.read_data()
            }
            _ => self.read_common(addr),
        }
    }

    /// Side-effect-free read for the debugger.
    pub fn peek_register(&self, addr: u8, cart: &Cart) -> u8 {
        match addr {
            0xB2 | 0xB3 => cart.peek_data(),
            _ => self.read_common(addr),
        }
    }

    fn read_common(&self, addr: u8) -> u8 {
        match addr {
            0x00..=0x03 | 0x0C..=0x0F => self.collision_buffer[usize::from(addr)],
            0x04 => self.h_offset as u8,
            0x05 => (self.h_offset >> 8) as u8,
            0x06 => self.v_offset as u8,
            0x07 => (self.v_offset >> 8) as u8,
            0x08 => self.video_base as u8,
            0x09 => (self.video_base >> 8) as u8,
            0x0A => self.collision_base as u8,
            0x0B => (self.collision_base >> 8) as u8,
            0x10 => self.scb_address as u8,
            0x11 => (self.scb_address >> 8) as u8,
            0x52..=0x57 | 0x60..=0x63 | 0x6C..=0x6F => self.math.read(addr),
            0x80 => self.sprite_control0,
            0x81 => self.sprite_control1,
            0x82 => self.sprite_coll,
            0x83 => self.sprite_init,
            // SUZYHREV, hardware revision
            0x88 => 0x01,
            0x90 => u8::from(self.sprite_busy),
            0x91 => u8::from(self.sprite_enabled),
            0x92 => self.sprite_status(),
            0xB0 => self.joystick,
            0xB1 => self.switches,
            _ => 0xFF,
        }
    }

    /// SPRSYS status byte.
    fn sprite_status(&self) -> u8 {
        let mut status = 0;
        if self.sprite_busy {
            status |= 0x01;
        }
        if self.stop_on_current {
            status |= 0x02;
        }
        if self.unsafe_access {
            status |= 0x04;
        }
        if self.left_hand {
            status |= 0x08;
        }
        if self.vstretch {
            status |= 0x10;
        }
        if self.math.last_carry {
            status |= 0x20;
        }
        if self.math.overflow {
            status |= 0x40;
        }
        if self.math.in_progress {
            status |= 0x80;
        }
        status
    }

    /// Write a Suzy register. A `SPRGO` write with the enable bit set runs
    /// the whole sprite chain against `ram` before returning; the returned
    /// value is the number of bus cycles the engine held the bus, which
    /// stalls the CPU. All other writes return 0.
    ///
    /// `display_address` is Mikey's current framebuffer pointer, used when
    /// `VIDBAS` has not been set.
    pub fn write_register(
        &mut self,
        addr: u8,
        value: u8,
        ram: &mut [u8; 0x1_0000],
        display_address: u16,
    ) -> u32 {
        match addr {
            0x00..=0x03 | 0x0C..=0x0F => self.collision_buffer[usize::from(addr)] = value,
            0x04 => word_low_i16(&mut self.h_offset, value),
            0x05 => word_high_i16(&mut self.h_offset, value),
            0x06 => word_low_i16(&mut self.v_offset, value),
            0x07 => word_high_i16(&mut self.v_offset, value),
            0x08 => self.video_base = (self.video_base & 0xFF00) | u16::from(value),
            0x09 => self.video_base = (self.video_base & 0x00FF) | (u16::from(value) << 8),
            0x0A => self.collision_base = (self.collision_base & 0xFF00) | u16::from(value),
            0x0B => self.collision_base = (self.collision_base & 0x00FF) | (u16::from(value) << 8),
            0x10 => self.scb_address = (self.scb_address & 0xFF00) | u16::from(value),
            0x11 => self.scb_address = (self.scb_address & 0x00FF) | (u16::from(value) << 8),
            0x24 => self.coll_offset = (self.coll_offset & 0xFF00) | u16::from(value),
            0x25 => self.coll_offset = (self.coll_offset & 0x00FF) | (u16::from(value) << 8),
            0x28 => self.h_size_offset = (self.h_size_offset & 0xFF00) | u16::from(value),
            0x29 => self.h_size_offset = (self.h_size_offset & 0x00FF) | (u16::from(value) << 8),
            0x2A => self.v_size_offset = (self.v_size_offset & 0xFF00) | u16::from(value),
            0x2B => self.v_size_offset = (self.v_size_offset & 0x00FF) | (u16::from(value) << 8),
            0x52..=0x57 | 0x60..=0x63 | 0x6C..=0x6F => self.math.write(addr, value),
            0x80 => self.sprite_control0 = value,
            0x81 => self.sprite_control1 = value,
            0x82 => self.sprite_coll = value,
            0x83 => self.sprite_init = value,
            0x91 => {
                // SPRGO
                self.sprite_enabled = value & 0x01 != 0;
                self.ever_on = value & 0x04 != 0;
                if self.sprite_enabled {
                    return self.process_sprite_chain(ram, display_address);
                }
            }
            0x92 => {
                // SPRSYS control bits
                self.math.signed_mode = value & 0x80 != 0;
                self.math.accumulate = value & 0x40 != 0;
                self.no_collide = value & 0x20 != 0;
                self.vstretch = value & 0x10 != 0;
                self.left_hand = value & 0x08 != 0;
                if value & 0x04 != 0 {
                    self.unsafe_access = false;
                }
                self.stop_on_current = value & 0x02 != 0;
            }
            _ => {}
        }
        0
    }

    pub fn set_joystick(&mut self, value: u8) {
        self.joystick = value;
    }

    pub fn joystick(&self) -> u8 {
        self.joystick
    }

    pub fn set_switches(&mut self, value: u8) {
        self.switches = value;
    }

    pub fn switches(&self) -> u8 {
        self.switches
    }
}

impl Default for Suzy {
    fn default() -> Self {
        Self::new()
    }
}

fn word_low_i16(word: &mut i16, value: u8) {
    *word = ((*word as u16 & 0xFF00) | u16::from(value)) as i16;
}

fn word_high_i16(word: &mut i16, value: u8) {
    *word = ((*word as u16 & 0x00FF) | (u16::from(value) << 8)) as i16;
}

impl Snapshot for Suzy {
    fn serialize(&mut self, s: &mut Serializer) {
        s.u16(&mut self.scb_address);
        s.u8(&mut self.sprite_control0);
        s.u8(&mut self.sprite_control1);
        s.u8(&mut self.sprite_coll);
        s.u8(&mut self.sprite_init);
        s.bool(&mut self.sprite_busy);
        s.bool(&mut self.sprite_enabled);
        self.math.serialize(s);
        s.bool(&mut self.unsafe_access);
        s.bool(&mut self.sprite_to_sprite_collision);
        s.bool(&mut self.stop_on_current);
        s.bool(&mut self.vstretch);
        s.bool(&mut self.left_hand);
        s.bytes(&mut self.collision_buffer);
        s.u8(&mut self.sprite_collision);
        s.i16(&mut self.h_offset);
        s.i16(&mut self.v_offset);
        s.u16(&mut self.video_base);
        s.u16(&mut self.collision_base);
        s.u16(&mut self.coll_offset);
        s.u16(&mut self.h_size_offset);
        s.u16(&mut self.v_size_offset);
        s.bool(&mut self.ever_on);
        s.bool(&mut self.no_collide);
        s.u8(&mut self.joystick);
        s.u8(&mut self.switches);
        s.bytes(&mut self.pen_index);
        s.i16(&mut self.persist_hpos);
        s.i16(&mut self.persist_vpos);
        s.u16(&mut self.persist_hsize);
        s.u16(&mut self.persist_vsize);
        s.i16(&mut self.persist_stretch);
        s.i16(&mut self.persist_tilt);
    }
}

impl Observable for Suzy {
    fn query(&self, path: &str) -> Option<Value> {
        Some(match path {
            "scb" => Value::U16(self.scb_address),
            "sprsys" => Value::U8(self.sprite_status()),
            "busy" => Value::Bool(self.sprite_busy),
            "video_base" => Value::U16(self.video_base),
            "collision_base" => Value::U16(self.collision_base),
            "joystick" => Value::U8(self.joystick),
            "switches" => Value::U8(self.switches),
            "math.abcd" => Value::U32(self.math.abcd),
            "math.efgh" => Value::U32(self.math.efgh),
            "math.jklm" => Value::U32(self.math.jklm),
            "math.np" => Value::U16(self.math.np),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "scb",
            "sprsys",
            "busy",
            "video_base",
            "collision_base",
            "joystick",
            "switches",
            "math.abcd",
            "math.efgh",
            "math.jklm",
            "math.np",
        ]
    }
}
