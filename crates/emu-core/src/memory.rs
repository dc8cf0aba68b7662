//! Memory region and access classification.
//!
//! Debugger artifacts (CDL, profiler keys, callstack entries) are keyed by
//! absolute addresses so bank switching cannot alias two distinct bytes.
//! Every bus access carries a [`MemoryOperationType`] so instrumentation can
//! tell real traffic from side-effect-only cycles.

/// A physically distinct memory region.
///
/// `LynxMemory` is the CPU-visible 64 KiB space (relative addressing); the
/// remaining variants name the physical arrays behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MemoryType {
    /// CPU-visible address space (relative addresses).
    LynxMemory = 0,
    /// 64 KiB work RAM.
    LynxWorkRam = 1,
    /// 512-byte boot ROM at `$FE00`.
    LynxBootRom = 2,
    /// Cartridge ROM (banked behind the cart port).
    LynxPrgRom = 3,
    /// Serial EEPROM contents.
    LynxEeprom = 4,
    /// No backing region (unmapped).
    #[default]
    None = 255,
}

impl MemoryType {
    /// True for the CPU-visible (relative) address space.
    #[must_use]
    pub const fn is_relative(self) -> bool {
        matches!(self, Self::LynxMemory)
    }

    /// True for read-only regions.
    #[must_use]
    pub const fn is_rom(self) -> bool {
        matches!(self, Self::LynxBootRom | Self::LynxPrgRom)
    }

    /// Short lowercase name for display and query paths.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::LynxMemory => "mem",
            Self::LynxWorkRam => "ram",
            Self::LynxBootRom => "boot",
            Self::LynxPrgRom => "rom",
            Self::LynxEeprom => "eeprom",
            Self::None => "n/a",
        }
    }
}

/// Classification of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MemoryOperationType {
    /// Ordinary data read.
    #[default]
    Read = 0,
    /// Ordinary data write.
    Write = 1,
    /// Opcode fetch.
    ExecOpcode = 2,
    /// Operand byte fetch.
    ExecOperand = 3,
    /// Read performed by a DMA engine.
    DmaRead = 4,
    /// Write performed by a DMA engine.
    DmaWrite = 5,
    /// Read whose value is discarded (timing only).
    DummyRead = 6,
    /// Write of a stale value during read-modify-write.
    DummyWrite = 7,
    /// Internal cycle with no bus traffic.
    Idle = 8,
}

impl MemoryOperationType {
    /// True for any access that returns a value to the CPU or DMA engine.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(
            self,
            Self::Read | Self::ExecOpcode | Self::ExecOperand | Self::DmaRead | Self::DummyRead
        )
    }

    /// True for any access that drives a value onto the bus.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::DmaWrite | Self::DummyWrite)
    }

    /// True for opcode and operand fetches.
    #[must_use]
    pub const fn is_exec(self) -> bool {
        matches!(self, Self::ExecOpcode | Self::ExecOperand)
    }

    /// True for DMA engine traffic.
    #[must_use]
    pub const fn is_dma(self) -> bool {
        matches!(self, Self::DmaRead | Self::DmaWrite)
    }

    /// True for accesses whose value is not used (timing side effects only).
    #[must_use]
    pub const fn is_dummy(self) -> bool {
        matches!(self, Self::DummyRead | Self::DummyWrite)
    }
}

/// One bus access as seen by debugger hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOperation {
    /// CPU-visible address.
    pub address: u16,
    /// Value read or written.
    pub value: u8,
    /// Access classification.
    pub op_type: MemoryOperationType,
}

/// An absolute address: offset into a physical region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressInfo {
    /// Offset within the region.
    pub address: u32,
    /// Which region.
    pub memory_type: MemoryType,
}

impl AddressInfo {
    #[must_use]
    pub const fn new(address: u32, memory_type: MemoryType) -> Self {
        Self {
            address,
            memory_type,
        }
    }

    /// Pack into a single map key. Offsets stay below 2^24 on supported
    /// machines, so the region discriminant lives in the top byte.
    #[must_use]
    pub const fn key(self) -> u32 {
        self.address | ((self.memory_type as u32) << 24)
    }
}
