//! CPU-visible memory map.
//!
//! The Lynx backs the full 64 KB address space with work RAM and overlays
//! the top pages with hardware: Suzy registers at `$FC00`, Mikey registers
//! at `$FD00`, boot ROM at `$FE00` and the interrupt vectors at `$FFFA`.
//! `MAPCTL` (`$FFF9`) disables each overlay individually, exposing the RAM
//! underneath; writes to `$FFF9` also land in RAM so the shadow copy stays
//! in sync.

use atari_mikey::Mikey;
use atari_suzy::Suzy;
use emu_core::{
    AddressInfo, Bus, MemoryOperation, MemoryOperationType, MemoryType, Serializer, Snapshot,
};
use emu_debugger::{CdlRecorder, Cheats, FrozenAddresses};
use lynx_cartridge::{Cart, Eeprom};

const RAM_SIZE: usize = 0x1_0000;
const BOOT_ROM_SIZE: usize = 0x200;

const SUZY_BASE: u16 = 0xFC00;
const MIKEY_BASE: u16 = 0xFD00;
const BOOT_ROM_BASE: u16 = 0xFE00;
const MAPCTL_ADDR: u16 = 0xFFF9;

/// One bus access paired with the absolute address it resolved to. The
/// console drains these between instructions and feeds them to the
/// debugger.
#[derive(Debug, Clone, Copy)]
pub struct TrackedAccess {
    pub op: MemoryOperation,
    pub abs: Option<AddressInfo>,
}

/// The Lynx bus: 64 KB work RAM, both custom chips, the cartridge and its
/// EEPROM, plus the `MAPCTL` overlay switches.
pub struct LynxBus {
    pub ram: Box<[u8; RAM_SIZE]>,
    boot_rom: Option<Box<[u8; BOOT_ROM_SIZE]>>,
    pub suzy: Suzy,
    pub mikey: Mikey,
    pub cart: Cart,
    pub eeprom: Eeprom,

    mapctl: u8,
    suzy_visible: bool,
    mikey_visible: bool,
    rom_visible: bool,
    vectors_visible: bool,

    // Cycles Suzy held the bus for, charged to the CPU by the console.
    stall_cycles: u64,
    // Set whenever JOYSTICK is read; cleared per frame for lag counting.
    joypad_read: bool,

    recording: bool,
    pub(crate) accesses: Vec<TrackedAccess>,
    pub(crate) cheats: Cheats,
    pub(crate) frozen: FrozenAddresses,
    pub(crate) coverage: CdlRecorder,
}

impl LynxBus {
    pub fn new(cart: Cart, eeprom: Eeprom, boot_rom: Option<Vec<u8>>) -> Self {
        let rom_len = cart.rom().len();
        let boot_rom = boot_rom.map(|data| {
            let mut rom = Box::new([0u8; BOOT_ROM_SIZE]);
            let len = data.len().min(BOOT_ROM_SIZE);
            rom[..len].copy_from_slice(&data[..len]);
            rom
        });
        Self {
            ram: Box::new([0u8; RAM_SIZE]),
            boot_rom,
            suzy: Suzy::new(),
            mikey: Mikey::new(),
            cart,
            eeprom,
            mapctl: 0,
            suzy_visible: true,
            mikey_visible: true,
            rom_visible: true,
            vectors_visible: true,
            stall_cycles: 0,
            joypad_read: false,
            recording: false,
            accesses: Vec::new(),
            cheats: Cheats::new(),
            frozen: FrozenAddresses::new(),
            coverage: CdlRecorder::new(rom_len),
        }
    }

    /// Advance Mikey to `current_cycle`. Display DMA reads straight out of
    /// work RAM.
    pub fn tick(&mut self, current_cycle: u64) {
        self.mikey.tick(current_cycle, &self.ram);
    }

    #[must_use]
    pub fn boot_rom_present(&self) -> bool {
        self.boot_rom.is_some()
    }

    #[must_use]
    pub fn mapctl(&self) -> u8 {
        self.mapctl
    }

    /// Cycles Suzy stalled the CPU for since the last call.
    pub(crate) fn take_stall_cycles(&mut self) -> u64 {
        std::mem::take(&mut self.stall_cycles)
    }

    /// Whether `JOYSTICK` was read since the last call.
    pub(crate) fn take_joypad_read(&mut self) -> bool {
        std::mem::take(&mut self.joypad_read)
    }

    /// Enable or disable per-access recording for the debugger. Disabling
    /// drops anything still queued.
    pub(crate) fn set_recording(&mut self, enabled: bool) {
        self.recording = enabled;
        if !enabled {
            self.accesses.clear();
        }
    }

    // MAPCTL bits are active-low enables: 0 = overlay visible.
    fn update_mapctl(&mut self, value: u8) {
        self.mapctl = value;
        self.suzy_visible = value & 0x01 == 0;
        self.mikey_visible = value & 0x02 == 0;
        self.rom_visible = value & 0x04 == 0;
        self.vectors_visible = value & 0x08 == 0;
    }

    /// Where `address` currently resolves in absolute terms. Register
    /// overlays have no backing store and map to `None`.
    #[must_use]
    pub fn absolute_address(&self, address: u16) -> Option<AddressInfo> {
        let work_ram = AddressInfo::new(u32::from(address), MemoryType::LynxWorkRam);
        match address {
            MAPCTL_ADDR => Some(work_ram),
            SUZY_BASE..=0xFCFF if self.suzy_visible => None,
            MIKEY_BASE..=0xFDFF if self.mikey_visible => None,
            0xFFFA..=0xFFFF if self.vectors_visible && self.boot_rom.is_some() => Some(
                AddressInfo::new(u32::from(address - BOOT_ROM_BASE), MemoryType::LynxBootRom),
            ),
            BOOT_ROM_BASE..=0xFFF7 if self.rom_visible && self.boot_rom.is_some() => Some(
                AddressInfo::new(u32::from(address - BOOT_ROM_BASE), MemoryType::LynxBootRom),
            ),
            _ => Some(work_ram),
        }
    }

    /// Map an absolute address back to the CPU view, if the relevant
    /// overlay is currently visible.
    #[must_use]
    pub fn relative_address(&self, info: AddressInfo) -> Option<u16> {
        match info.memory_type {
            MemoryType::LynxWorkRam => Some(info.address as u16),
            MemoryType::LynxBootRom => {
                if info.address >= BOOT_ROM_SIZE as u32 {
                    return None;
                }
                let cpu_addr = BOOT_ROM_BASE + info.address as u16;
                match cpu_addr {
                    0xFFFA..=0xFFFF if self.vectors_visible => Some(cpu_addr),
                    BOOT_ROM_BASE..=0xFFF7 if self.rom_visible => Some(cpu_addr),
                    _ => None,
                }
            }
            // Cart ROM and EEPROM are only reachable through Suzy's serial
            // port, never mapped into the CPU space.
            _ => None,
        }
    }

    /// Debugger write: routes through the live register path but charges
    /// no cycles and records nothing.
    pub fn poke(&mut self, address: u16, value: u8) {
        match address {
            MAPCTL_ADDR => {
                self.update_mapctl(value);
                self.ram[usize::from(address)] = value;
            }
            SUZY_BASE..=0xFCFF if self.suzy_visible => {
                let display = self.mikey.display_address();
                self.suzy
                    .write_register((address & 0xFF) as u8, value, &mut self.ram, display);
            }
            MIKEY_BASE..=0xFDFF if self.mikey_visible => {
                self.mikey
                    .write_register((address & 0xFF) as u8, value, &mut self.eeprom);
            }
            BOOT_ROM_BASE..=0xFFF7 if self.rom_visible && self.boot_rom.is_some() => {}
            _ => self.ram[usize::from(address)] = value,
        }
    }

    fn boot_rom_read(&self, address: u16, abs: &mut Option<AddressInfo>) -> u8 {
        let offset = address - BOOT_ROM_BASE;
        if let Some(rom) = &self.boot_rom {
            *abs = Some(AddressInfo::new(
                u32::from(offset),
                MemoryType::LynxBootRom,
            ));
            rom[usize::from(offset)]
        } else {
            *abs = Some(AddressInfo::new(
                u32::from(address),
                MemoryType::LynxWorkRam,
            ));
            self.ram[usize::from(address)]
        }
    }

    fn read_dispatch(&mut self, address: u16, abs: &mut Option<AddressInfo>) -> u8 {
        match address {
            MAPCTL_ADDR => {
                *abs = Some(AddressInfo::new(
                    u32::from(address),
                    MemoryType::LynxWorkRam,
                ));
                self.mapctl
            }
            SUZY_BASE..=0xFCFF if self.suzy_visible => {
                let reg = (address & 0xFF) as u8;
                if reg == 0xB0 {
                    // JOYSTICK read, feeds the lag counter.
                    self.joypad_read = true;
                }
                if reg == 0xB2 || reg == 0xB3 {
                    self.cart.tick();
                    // Capture the ROM address before the read advances the
                    // cartridge counter.
                    self.cart.select_bank(reg & 1);
                    let rom_addr = self.cart.current_rom_address();
                    *abs = Some(AddressInfo::new(rom_addr, MemoryType::LynxPrgRom));
                    self.coverage.record_data(rom_addr);
                }
                self.suzy.read_register(reg, &mut self.cart)
            }
            MIKEY_BASE..=0xFDFF if self.mikey_visible => self
                .mikey
                .read_register((address & 0xFF) as u8, &self.eeprom),
            0xFFFA..=0xFFFF if self.vectors_visible => self.boot_rom_read(address, abs),
            BOOT_ROM_BASE..=0xFFF7 if self.rom_visible => self.boot_rom_read(address, abs),
            _ => {
                *abs = Some(AddressInfo::new(
                    u32::from(address),
                    MemoryType::LynxWorkRam,
                ));
                self.ram[usize::from(address)]
            }
        }
    }
}

impl Bus for LynxBus {
    fn read(&mut self, address: u16, op: MemoryOperationType) -> u8 {
        let mut abs = None;
        let raw = self.read_dispatch(address, &mut abs);
        let value = self.cheats.apply(address, raw);
        if self.recording {
            self.accesses.push(TrackedAccess {
                op: MemoryOperation {
                    address,
                    value,
                    op_type: op,
                },
                abs,
            });
        }
        value
    }

    fn write(&mut self, address: u16, value: u8, op: MemoryOperationType) {
        if self.recording {
            let abs = self.absolute_address(address);
            self.accesses.push(TrackedAccess {
                op: MemoryOperation {
                    address,
                    value,
                    op_type: op,
                },
                abs,
            });
        }
        if self.frozen.is_frozen(address) {
            return;
        }
        match address {
            MAPCTL_ADDR => {
                self.update_mapctl(value);
                self.ram[usize::from(address)] = value;
            }
            SUZY_BASE..=0xFCFF if self.suzy_visible => {
                let display = self.mikey.display_address();
                let stall =
                    self.suzy
                        .write_register((address & 0xFF) as u8, value, &mut self.ram, display);
                self.stall_cycles += u64::from(stall);
            }
            MIKEY_BASE..=0xFDFF if self.mikey_visible => {
                self.mikey
                    .write_register((address & 0xFF) as u8, value, &mut self.eeprom);
            }
            // Boot ROM is read-only; the write never reaches the RAM
            // underneath while the overlay is up.
            BOOT_ROM_BASE..=0xFFF7 if self.rom_visible && self.boot_rom.is_some() => {}
            _ => self.ram[usize::from(address)] = value,
        }
    }

    fn peek(&self, address: u16) -> u8 {
        match address {
            MAPCTL_ADDR => self.mapctl,
            SUZY_BASE..=0xFCFF if self.suzy_visible => {
                self.suzy.peek_register((address & 0xFF) as u8, &self.cart)
            }
            MIKEY_BASE..=0xFDFF if self.mikey_visible => {
                self.mikey.peek_register((address & 0xFF) as u8, &self.eeprom)
            }
            0xFFFA..=0xFFFF if self.vectors_visible => self.peek_boot(address),
            BOOT_ROM_BASE..=0xFFF7 if self.rom_visible => self.peek_boot(address),
            _ => self.ram[usize::from(address)],
        }
    }
}

impl LynxBus {
    fn peek_boot(&self, address: u16) -> u8 {
        self.boot_rom.as_ref().map_or_else(
            || self.ram[usize::from(address)],
            |rom| rom[usize::from(address - BOOT_ROM_BASE)],
        )
    }
}

impl Snapshot for LynxBus {
    fn serialize(&mut self, s: &mut Serializer) {
        s.u8(&mut self.mapctl);
        if !s.is_saving() {
            let mapctl = self.mapctl;
            self.update_mapctl(mapctl);
        }
    }
}
