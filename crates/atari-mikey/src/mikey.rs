//! Mikey's register file, interrupt controller and I/O port glue.
//!
//! Beyond the timer block at `$FD00-$FD1F` and the audio block at
//! `$FD20-$FD50`, the chip decodes:
//!
//! | Addr       | Register  | |
//! |------------|-----------|----------------------------------------|
//! | `$FD80`    | INTSET    | pending interrupts, write sets bits    |
//! | `$FD81`    | INTRST    | write clears pending bits              |
//! | `$FD84`    | MIKEYHREV | hardware revision                      |
//! | `$FD87`    | SYSCTL1   | power/cart strobes, nothing to latch   |
//! | `$FD88`    | IODIR     | parallel port direction                |
//! | `$FD89`    | IODAT     | parallel port data, EEPROM wires       |
//! | `$FD8C`    | SERCTL    | UART control/status                    |
//! | `$FD8D`    | SERDAT    | UART data                              |
//! | `$FD91`    | CPUSLEEP  | write parks the CPU until an interrupt |
//! | `$FD92`    | DISPCTL   | display control                        |
//! | `$FD94/95` | DISPADR   | display buffer address, low/high       |
//! | `$FDA0-AF` | GREEN     | palette green nibbles                  |
//! | `$FDB0-BF` | BLUERED   | palette blue/red nibble pairs          |

use emu_core::{Observable, Serializer, Snapshot, Value};
use lynx_cartridge::Eeprom;

use crate::audio::Apu;
use crate::timers::Timer;
use crate::uart::Uart;
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// The Lynx's timer, interrupt, display and sound controller.
pub struct Mikey {
    pub(crate) timers: [Timer; 8],
    /// Mirror of each timer's CTLA interrupt enable bit.
    irq_enabled: u8,
    pub(crate) irq_pending: u8,
    pub(crate) display_address: u16,
    pub(crate) display_control: u8,
    pub(crate) current_scanline: u16,
    /// ARGB entries derived from the green and blue/red registers.
    pub(crate) palette: [u32; 16],
    pub(crate) palette_green: [u8; 16],
    pub(crate) palette_br: [u8; 16],
    pub(crate) uart: Uart,
    hardware_revision: u8,
    io_dir: u8,
    io_data: u8,
    pub(crate) apu: Apu,
    pub(crate) framebuffer: Box<[u32; SCREEN_WIDTH * SCREEN_HEIGHT]>,
    pub(crate) frame_complete: bool,
    cpu_sleep_pending: bool,
}

impl Mikey {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: <[Timer; 8]>::default(),
            irq_enabled: 0,
            irq_pending: 0,
            display_address: 0,
            display_control: 0,
            current_scanline: 0,
            palette: [0xFF00_0000; 16],
            palette_green: [0; 16],
            palette_br: [0; 16],
            uart: Uart::new(),
            hardware_revision: 0x04,
            io_dir: 0,
            io_data: 0,
            apu: Apu::new(),
            framebuffer: Box::new([0xFF00_0000; SCREEN_WIDTH * SCREEN_HEIGHT]),
            frame_complete: false,
            cpu_sleep_pending: false,
        }
    }

    /// Read a Mikey register, `addr` relative to `$FD00`. Reading SERDAT
    /// consumes the received frame.
    pub fn read_register(&mut self, addr: u8, eeprom: &Eeprom) -> u8 {
        match addr {
            0x00..=0x1F => {
                let timer = &self.timers[usize::from(addr >> 2)];
                match addr & 0x03 {
                    0 => timer.backup,
                    1 => timer.control_a,
                    2 => timer.count,
                    _ => timer.control_b,
                }
            }
            0x20..=0x50 => self.apu.read(addr - 0x20),
            0x80 => self.irq_pending,
            0x81 => 0xFF,
            0x84 => self.hardware_revision,
            0x87 => 0,
            0x88 => self.io_dir,
            0x89 => self.read_io_data(eeprom),
            0x8C => self.uart.status(),
            0x8D => {
                let value = self.uart.read_data();
                self.refresh_uart_irq();
                value
            }
            0x92 => self.display_control,
            0x94 => (self.display_address & 0xFF) as u8,
            0x95 => (self.display_address >> 8) as u8,
            0xA0..=0xAF => self.palette_green[usize::from(addr & 0x0F)],
            0xB0..=0xBF => self.palette_br[usize::from(addr & 0x0F)],
            _ => 0xFF,
        }
    }

    /// Side-effect-free read for the debugger.
    #[must_use]
    pub fn peek_register(&self, addr: u8, eeprom: &Eeprom) -> u8 {
        match addr {
            0x00..=0x1F => {
                let timer = &self.timers[usize::from(addr >> 2)];
                match addr & 0x03 {
                    0 => timer.backup,
                    1 => timer.control_a,
                    2 => timer.count,
                    _ => timer.control_b,
                }
            }
            0x20..=0x50 => self.apu.read(addr - 0x20),
            0x80 => self.irq_pending,
            0x81 => 0xFF,
            0x84 => self.hardware_revision,
            0x87 => 0,
            0x88 => self.io_dir,
            0x89 => self.read_io_data(eeprom),
            0x8C => self.uart.status(),
            0x8D => self.uart.peek_data(),
            0x92 => self.display_control,
            0x94 => (self.display_address & 0xFF) as u8,
            0x95 => (self.display_address >> 8) as u8,
            0xA0..=0xAF => self.palette_green[usize::from(addr & 0x0F)],
            0xB0..=0xBF => self.palette_br[usize::from(addr & 0x0F)],
            _ => 0xFF,
        }
    }

    /// Write a Mikey register, `addr` relative to `$FD00`.
    pub fn write_register(&mut self, addr: u8, value: u8, eeprom: &mut Eeprom) {
        match addr {
            0x00..=0x1F => self.write_timer_register(addr, value),
            0x20..=0x50 => self.apu.write(addr - 0x20, value),
            0x80 => self.irq_pending |= value,
            0x81 => self.irq_pending &= !value,
            0x87 => {}
            0x88 => self.io_dir = value,
            0x89 => self.write_io_data(value, eeprom),
            0x8C => {
                self.uart.write_control(value);
                self.refresh_uart_irq();
            }
            0x8D => self.uart.write_data(value),
            0x91 => self.cpu_sleep_pending = true,
            0x92 => self.display_control = value,
            0x94 => self.display_address = (self.display_address & 0xFF00) | u16::from(value),
            0x95 => {
                self.display_address = (self.display_address & 0x00FF) | (u16::from(value) << 8);
            }
            0xA0..=0xAF => {
                self.palette_green[usize::from(addr & 0x0F)] = value;
                self.update_palette(usize::from(addr & 0x0F));
            }
            0xB0..=0xBF => {
                self.palette_br[usize::from(addr & 0x0F)] = value;
                self.update_palette(usize::from(addr & 0x0F));
            }
            _ => {}
        }
    }

    fn write_timer_register(&mut self, addr: u8, value: u8) {
        let index = usize::from(addr >> 2);
        match addr & 0x03 {
            0 => self.timers[index].backup = value,
            1 => {
                // Bit 6 is the reset strobe and is not stored.
                self.timers[index].control_a = value & !0x40;
                self.timers[index].linked = value & 0x07 == 0x07;
                if value & 0x40 != 0 {
                    self.timers[index].count = self.timers[index].backup;
                }
                if value & 0x80 != 0 {
                    self.irq_enabled |= 1 << index;
                } else {
                    self.irq_enabled &= !(1 << index);
                }
            }
            2 => self.timers[index].count = value,
            _ => {
                // Any CTLB write clears the done flag. The written value
                // is otherwise ignored.
                self.timers[index].done = false;
                self.timers[index].control_b &= !0x08;
            }
        }
    }

    fn read_io_data(&self, eeprom: &Eeprom) -> u8 {
        let mut value = self.io_data & self.io_dir;
        // Bit 1 reads the EEPROM data line when configured as input.
        if self.io_dir & 0x02 == 0 && eeprom.data_out() {
            value |= 0x02;
        }
        value
    }

    fn write_io_data(&mut self, value: u8, eeprom: &mut Eeprom) {
        let previous = self.io_data;
        self.io_data = value;
        eeprom.set_chip_select(value & 0x01 != 0);
        // Bit 2 clocks the EEPROM on its rising edge, bit 1 is the data.
        if previous & 0x04 == 0 && value & 0x04 != 0 {
            eeprom.clock_data(value & 0x02 != 0);
        }
    }

    pub(crate) fn clock_uart(&mut self) {
        self.uart.tick();
        self.refresh_uart_irq();
    }

    /// The UART shares timer 4's interrupt bit and is level sensitive:
    /// cleared through INTRST, the bit reasserts on the next baud tick
    /// while the condition holds.
    fn refresh_uart_irq(&mut self) {
        if self.uart.irq_asserted() {
            self.irq_pending |= 0x10;
        }
    }

    /// Feed a frame arriving from the ComLynx cable.
    pub fn comlynx_receive(&mut self, data: u16) {
        self.uart.receive(data);
    }

    /// Level of the maskable interrupt line into the CPU.
    #[must_use]
    pub fn irq_line(&self) -> bool {
        self.irq_pending != 0
    }

    #[must_use]
    pub fn irq_pending(&self) -> u8 {
        self.irq_pending
    }

    /// True once per CPUSLEEP write. The caller parks the CPU until the
    /// next interrupt.
    pub fn take_sleep_request(&mut self) -> bool {
        std::mem::take(&mut self.cpu_sleep_pending)
    }

    /// True once per completed frame, set when the line counter wraps.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer[..]
    }

    #[must_use]
    pub fn current_scanline(&self) -> u16 {
        self.current_scanline
    }

    /// Current display DMA base pointer (DISPADR). Suzy falls back to this
    /// framebuffer address when VIDBAS was never programmed.
    #[must_use]
    pub fn display_address(&self) -> u16 {
        self.display_address
    }

    #[must_use]
    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn apu_mut(&mut self) -> &mut Apu {
        &mut self.apu
    }
}

impl Default for Mikey {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot for Mikey {
    fn serialize(&mut self, s: &mut Serializer) {
        for timer in &mut self.timers {
            timer.serialize(s);
        }
        s.u8(&mut self.irq_enabled);
        s.u8(&mut self.irq_pending);
        s.u16(&mut self.display_address);
        s.u8(&mut self.display_control);
        s.u16(&mut self.current_scanline);
        s.bytes(&mut self.palette_green);
        s.bytes(&mut self.palette_br);
        self.uart.serialize(s);
        s.u8(&mut self.hardware_revision);
        s.u8(&mut self.io_dir);
        s.u8(&mut self.io_data);

        // The ARGB palette and the framebuffer are derived state; the
        // palette is rebuilt here, the framebuffer on the next frame.
        if !s.is_saving() {
            for index in 0..16 {
                self.update_palette(index);
            }
        }
    }
}

impl Mikey {
    /// Single-timer register paths, `timer0.count` through `timer7.ctlb`.
    fn query_timer(&self, path: &str) -> Option<Value> {
        let (name, field) = path.split_once('.')?;
        let index: usize = name.strip_prefix("timer")?.parse().ok()?;
        let timer = self.timers.get(index)?;
        let value = match field {
            "count" => Value::U8(timer.count),
            "backup" => Value::U8(timer.backup),
            "ctla" => Value::U8(timer.control_a),
            "ctlb" => Value::U8(timer.control_b),
            _ => return None,
        };
        Some(value)
    }
}

impl Observable for Mikey {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "intset" => Some(Value::U8(self.irq_pending)),
            "inten" => Some(Value::U8(self.irq_enabled)),
            "scanline" => Some(Value::U16(self.current_scanline)),
            "dispctl" => Some(Value::U8(self.display_control)),
            "dispadr" => Some(Value::U16(self.display_address)),
            "serctl" => Some(Value::U8(self.uart.status())),
            "timers.count" => Some(Value::Array(
                self.timers.iter().map(|t| Value::U8(t.count)).collect(),
            )),
            "timers.backup" => Some(Value::Array(
                self.timers.iter().map(|t| Value::U8(t.backup)).collect(),
            )),
            _ => self.query_timer(path),
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "intset",
            "inten",
            "scanline",
            "dispctl",
            "dispadr",
            "serctl",
            "timers.count",
            "timers.backup",
        ]
    }
}
