//! WDC 65C02 CPU implementation.
//!
//! Instruction-stepped emulation where `exec()` runs one complete
//! instruction. Every bus access costs one CPU cycle, so instruction timing
//! (including page-cross penalties, read-modify-write dummy reads, and the
//! decimal-mode extra cycle) falls out of the access sequence instead of a
//! per-opcode cycle table.

use emu_core::{Bus, Cpu, MemoryOperationType, Observable, Serializer, Snapshot, Value};

use crate::flags::{C, D, I, N, V, Z};
use crate::{Registers, Status};

/// Addressing modes.
///
/// The `W` variants are the write forms of the indexed modes: the index
/// penalty cycle is always paid, page cross or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddrMode {
    /// No operand fetch at all (BRK reads its signature byte itself).
    None,
    Acc,
    Imp,
    Imm,
    Rel,
    Zpg,
    ZpgX,
    ZpgY,
    Abs,
    AbsX,
    AbsXW,
    AbsY,
    AbsYW,
    Ind,
    IndX,
    IndY,
    IndYW,
    ZpgInd,
    AbsIndX,
}

impl AddrMode {
    /// Operand names a memory location rather than an immediate byte.
    pub(crate) const fn is_memory(self) -> bool {
        !matches!(
            self,
            Self::None | Self::Acc | Self::Imp | Self::Imm | Self::Rel
        )
    }
}

/// Addressing mode for each opcode. Undefined opcodes decode as implied,
/// immediate, or absolute NOPs of the documented sizes.
pub(crate) const fn addr_mode(opcode: u8) -> AddrMode {
    match opcode {
        0x00 => AddrMode::None,

        0x0A | 0x1A | 0x2A | 0x3A | 0x4A | 0x6A => AddrMode::Acc,

        0x02 | 0x09 | 0x22 | 0x29 | 0x42 | 0x44 | 0x49 | 0x62 | 0x69 | 0x82 | 0x89 | 0xA0
        | 0xA2 | 0xA9 | 0xC0 | 0xC2 | 0xC9 | 0xE0 | 0xE2 | 0xE9 => AddrMode::Imm,

        0x10 | 0x30 | 0x50 | 0x70 | 0x80 | 0x90 | 0xB0 | 0xD0 | 0xF0 => AddrMode::Rel,

        0x04 | 0x05 | 0x06 | 0x14 | 0x24 | 0x25 | 0x26 | 0x45 | 0x46 | 0x64 | 0x65 | 0x66
        | 0x84 | 0x85 | 0x86 | 0xA4 | 0xA5 | 0xA6 | 0xC4 | 0xC5 | 0xC6 | 0xE4 | 0xE5 | 0xE6 => {
            AddrMode::Zpg
        }

        0x15 | 0x16 | 0x34 | 0x35 | 0x36 | 0x55 | 0x56 | 0x74 | 0x75 | 0x76 | 0x94 | 0x95
        | 0xB4 | 0xB5 | 0xD5 | 0xD6 | 0xF5 | 0xF6 => AddrMode::ZpgX,

        0x96 | 0xB6 => AddrMode::ZpgY,

        0x0C | 0x0D | 0x0E | 0x1C | 0x20 | 0x2C | 0x2D | 0x2E | 0x4C | 0x4D | 0x4E | 0x5C
        | 0x6D | 0x6E | 0x8C | 0x8D | 0x8E | 0x9C | 0xAC | 0xAD | 0xAE | 0xCC | 0xCD | 0xCE
        | 0xDC | 0xEC | 0xED | 0xEE | 0xFC => AddrMode::Abs,

        0x1D | 0x3C | 0x3D | 0x5D | 0x7D | 0xBC | 0xBD | 0xDD | 0xFD => AddrMode::AbsX,

        0x1E | 0x3E | 0x5E | 0x7E | 0x9D | 0x9E | 0xDE | 0xFE => AddrMode::AbsXW,

        0x19 | 0x39 | 0x59 | 0x79 | 0xB9 | 0xBE | 0xD9 | 0xF9 => AddrMode::AbsY,

        0x99 => AddrMode::AbsYW,

        0x6C => AddrMode::Ind,

        0x01 | 0x21 | 0x41 | 0x61 | 0x81 | 0xA1 | 0xC1 | 0xE1 => AddrMode::IndX,

        0x11 | 0x31 | 0x51 | 0x71 | 0xB1 | 0xD1 | 0xF1 => AddrMode::IndY,

        0x91 => AddrMode::IndYW,

        0x12 | 0x32 | 0x52 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => AddrMode::ZpgInd,

        0x7C => AddrMode::AbsIndX,

        _ => AddrMode::Imp,
    }
}

/// CPU stop states beyond normal execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StopState {
    #[default]
    Running = 0,
    /// STP executed; only reset recovers.
    Stopped = 1,
    /// WAI executed; wakes when the IRQ line is high with I clear.
    WaitingForIrq = 2,
}

impl StopState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Stopped,
            2 => Self::WaitingForIrq,
            _ => Self::Running,
        }
    }
}

/// A hardware interrupt entry that happened inside the last `exec()` call.
///
/// Surfaced as a side channel so a debugger can push a synthetic callstack
/// frame without hooking the CPU internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqEntry {
    /// The address pushed as the return address (next instruction).
    pub from_pc: u16,
    /// Handler address loaded from the IRQ vector.
    pub handler: u16,
}

/// The WDC 65C02 CPU.
///
/// `exec()` runs one full instruction and samples the IRQ line afterwards,
/// so an interrupt raised while an instruction runs is serviced only after
/// the following instruction retires.
#[derive(Debug)]
pub struct Wdc65c02 {
    /// CPU registers.
    pub regs: Registers,

    stop_state: StopState,

    /// Level-sensitive IRQ input.
    irq_line: bool,

    /// Addressing mode of the instruction being executed.
    mode: AddrMode,

    /// Resolved operand: an effective address for memory modes, the operand
    /// byte for immediate/relative modes.
    operand: u16,

    /// Total cycles since power-on; incremented once per bus access.
    cycles: u64,

    /// Set when `exec()` entered the IRQ handler; taken by the machine.
    irq_entry: Option<IrqEntry>,
}

impl Default for Wdc65c02 {
    fn default() -> Self {
        Self::new()
    }
}

impl Wdc65c02 {
    /// Create a new 65C02 in reset state. The reset vector is read by
    /// [`Cpu::reset`], which needs a bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            stop_state: StopState::Running,
            irq_line: false,
            mode: AddrMode::Imp,
            operand: 0,
            cycles: 0,
            irq_entry: None,
        }
    }

    /// Execute one instruction (or one waiting cycle while asleep) and
    /// return the cycles consumed.
    pub fn exec<B: Bus>(&mut self, bus: &mut B) -> u64 {
        let start = self.cycles;

        match self.stop_state {
            StopState::Running => {}
            StopState::WaitingForIrq => {
                self.cycles += 1;
                if self.irq_line && !self.regs.p.is_set(I) {
                    self.stop_state = StopState::Running;
                    // Fall through and execute the next instruction; the
                    // post-instruction check then enters the handler.
                } else {
                    return self.cycles - start;
                }
            }
            StopState::Stopped => {
                self.cycles += 1;
                return self.cycles - start;
            }
        }

        let opcode = self.read(bus, self.regs.pc, MemoryOperationType::ExecOpcode);
        self.regs.pc = self.regs.pc.wrapping_add(1);

        self.mode = addr_mode(opcode);
        self.operand = self.fetch_operand(bus);
        self.dispatch(bus, opcode);

        if self.irq_line && !self.regs.p.is_set(I) {
            self.handle_irq(bus);
        }

        self.cycles - start
    }

    /// Current stop state.
    #[must_use]
    pub const fn stop_state(&self) -> StopState {
        self.stop_state
    }

    /// Mutable register access for debugger pokes. Never touches the bus.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Put the CPU to sleep as if WAI had executed. The CPUSLEEP hardware
    /// register uses this.
    pub fn wait_for_irq(&mut self) {
        self.stop_state = StopState::WaitingForIrq;
    }

    /// The interrupt entry performed by the last `exec()`, if any. Clears
    /// the record.
    pub fn take_irq_entry(&mut self) -> Option<IrqEntry> {
        self.irq_entry.take()
    }

    /// Charge cycles for time another bus master held the bus, e.g. a
    /// sprite engine stalling the CPU.
    pub fn add_cycles(&mut self, n: u64) {
        self.cycles += n;
    }

    // ========================================================================
    // Memory access - each access is one CPU cycle
    // ========================================================================

    fn read<B: Bus>(&mut self, bus: &mut B, addr: u16, op: MemoryOperationType) -> u8 {
        self.cycles += 1;
        bus.read(addr, op)
    }

    fn write<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        self.cycles += 1;
        bus.write(addr, value, MemoryOperationType::Write);
    }

    /// Fetch the next operand byte at PC.
    fn read_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read(bus, self.regs.pc, MemoryOperationType::ExecOperand);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn read_word<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = self.read(bus, addr, MemoryOperationType::Read);
        let hi = self.read(bus, addr.wrapping_add(1), MemoryOperationType::Read);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Read and discard a byte at PC. Burns the cycle.
    fn dummy_read<B: Bus>(&mut self, bus: &mut B) {
        let _ = self.read(bus, self.regs.pc, MemoryOperationType::DummyRead);
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push();
        self.write(bus, addr, value);
    }

    fn push_word<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, (value & 0xFF) as u8);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.regs.pop();
        self.read(bus, addr, MemoryOperationType::Read)
    }

    fn pop_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    // ========================================================================
    // Operand fetching
    // ========================================================================

    fn fetch_operand<B: Bus>(&mut self, bus: &mut B) -> u16 {
        match self.mode {
            AddrMode::Acc | AddrMode::Imp => {
                self.dummy_read(bus);
                0
            }
            AddrMode::Imm | AddrMode::Rel | AddrMode::Zpg => u16::from(self.read_byte(bus)),
            AddrMode::ZpgX => {
                let base = self.read_byte(bus);
                self.dummy_read(bus);
                u16::from(base.wrapping_add(self.regs.x))
            }
            AddrMode::ZpgY => {
                let base = self.read_byte(bus);
                self.dummy_read(bus);
                u16::from(base.wrapping_add(self.regs.y))
            }
            AddrMode::Abs => self.abs_addr(bus),
            AddrMode::AbsX => self.abs_indexed(bus, self.regs.x, false),
            AddrMode::AbsXW => self.abs_indexed(bus, self.regs.x, true),
            AddrMode::AbsY => self.abs_indexed(bus, self.regs.y, false),
            AddrMode::AbsYW => self.abs_indexed(bus, self.regs.y, true),
            AddrMode::Ind => {
                let ptr = self.abs_addr(bus);
                self.read_word(bus, ptr)
            }
            AddrMode::IndX => {
                let zp = self.read_byte(bus);
                self.dummy_read(bus);
                self.zp_word(bus, zp.wrapping_add(self.regs.x))
            }
            AddrMode::IndY => self.ind_indexed(bus, false),
            AddrMode::IndYW => self.ind_indexed(bus, true),
            AddrMode::ZpgInd => {
                let zp = self.read_byte(bus);
                self.zp_word(bus, zp)
            }
            AddrMode::AbsIndX => {
                let ptr = self.abs_addr(bus);
                self.dummy_read(bus);
                self.read_word(bus, ptr.wrapping_add(u16::from(self.regs.x)))
            }
            AddrMode::None => 0,
        }
    }

    fn abs_addr<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read_byte(bus);
        let hi = self.read_byte(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Absolute indexed. Write forms always pay the index cycle; read forms
    /// only on page cross.
    fn abs_indexed<B: Bus>(&mut self, bus: &mut B, index: u8, for_write: bool) -> u16 {
        let lo = self.read_byte(bus);
        let hi = self.read_byte(bus);
        if for_write || u16::from(lo) + u16::from(index) > 0xFF {
            self.dummy_read(bus);
        }
        (u16::from(lo) | (u16::from(hi) << 8)).wrapping_add(u16::from(index))
    }

    /// Pointer read that wraps within the zero page.
    fn zp_word<B: Bus>(&mut self, bus: &mut B, zp: u8) -> u16 {
        let lo = self.read(bus, u16::from(zp), MemoryOperationType::Read);
        let hi = self.read(
            bus,
            u16::from(zp.wrapping_add(1)),
            MemoryOperationType::Read,
        );
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn ind_indexed<B: Bus>(&mut self, bus: &mut B, for_write: bool) -> u16 {
        let zp = self.read_byte(bus);
        let lo = self.read(bus, u16::from(zp), MemoryOperationType::Read);
        let hi = self.read(
            bus,
            u16::from(zp.wrapping_add(1)),
            MemoryOperationType::Read,
        );
        if for_write || u16::from(lo) + u16::from(self.regs.y) > 0xFF {
            self.dummy_read(bus);
        }
        (u16::from(lo) | (u16::from(hi) << 8)).wrapping_add(u16::from(self.regs.y))
    }

    /// Operand value: dereferences memory modes, returns the raw byte for
    /// immediate and relative modes.
    fn operand_value<B: Bus>(&mut self, bus: &mut B) -> u8 {
        if self.mode.is_memory() {
            self.read(bus, self.operand, MemoryOperationType::Read)
        } else {
            self.operand as u8
        }
    }

    // ========================================================================
    // Register helpers
    // ========================================================================

    fn set_a(&mut self, value: u8) {
        self.regs.a = value;
        self.regs.p.update_nz(value);
    }

    fn set_x(&mut self, value: u8) {
        self.regs.x = value;
        self.regs.p.update_nz(value);
    }

    fn set_y(&mut self, value: u8) {
        self.regs.y = value;
        self.regs.p.update_nz(value);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn dispatch<B: Bus>(&mut self, bus: &mut B, opcode: u8) {
        match opcode {
            // BRK
            0x00 => self.op_brk(bus),

            // ORA
            0x01 | 0x05 | 0x09 | 0x0D | 0x11 | 0x12 | 0x15 | 0x19 | 0x1D => {
                let value = self.operand_value(bus);
                self.set_a(self.regs.a | value);
            }

            // AND
            0x21 | 0x25 | 0x29 | 0x2D | 0x31 | 0x32 | 0x35 | 0x39 | 0x3D => {
                let value = self.operand_value(bus);
                self.set_a(self.regs.a & value);
            }

            // EOR
            0x41 | 0x45 | 0x49 | 0x4D | 0x51 | 0x52 | 0x55 | 0x59 | 0x5D => {
                let value = self.operand_value(bus);
                self.set_a(self.regs.a ^ value);
            }

            // ADC / SBC
            0x61 | 0x65 | 0x69 | 0x6D | 0x71 | 0x72 | 0x75 | 0x79 | 0x7D => self.do_adc(bus),
            0xE1 | 0xE5 | 0xE9 | 0xED | 0xF1 | 0xF2 | 0xF5 | 0xF9 | 0xFD => self.do_sbc(bus),

            // CMP / CPX / CPY
            0xC1 | 0xC5 | 0xC9 | 0xCD | 0xD1 | 0xD2 | 0xD5 | 0xD9 | 0xDD => {
                let value = self.operand_value(bus);
                self.do_cmp(self.regs.a, value);
            }
            0xE0 | 0xE4 | 0xEC => {
                let value = self.operand_value(bus);
                self.do_cmp(self.regs.x, value);
            }
            0xC0 | 0xC4 | 0xCC => {
                let value = self.operand_value(bus);
                self.do_cmp(self.regs.y, value);
            }

            // LDA / LDX / LDY
            0xA1 | 0xA5 | 0xA9 | 0xAD | 0xB1 | 0xB2 | 0xB5 | 0xB9 | 0xBD => {
                let value = self.operand_value(bus);
                self.set_a(value);
            }
            0xA2 | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let value = self.operand_value(bus);
                self.set_x(value);
            }
            0xA0 | 0xA4 | 0xAC | 0xB4 | 0xBC => {
                let value = self.operand_value(bus);
                self.set_y(value);
            }

            // STA / STX / STY / STZ
            0x81 | 0x85 | 0x8D | 0x91 | 0x92 | 0x95 | 0x99 | 0x9D => {
                let addr = self.operand;
                let value = self.regs.a;
                self.write(bus, addr, value);
            }
            0x86 | 0x8E | 0x96 => {
                let addr = self.operand;
                let value = self.regs.x;
                self.write(bus, addr, value);
            }
            0x84 | 0x8C | 0x94 => {
                let addr = self.operand;
                let value = self.regs.y;
                self.write(bus, addr, value);
            }
            0x64 | 0x74 | 0x9C | 0x9E => {
                let addr = self.operand;
                self.write(bus, addr, 0);
            }

            // Transfers
            0xAA => self.set_x(self.regs.a),
            0xA8 => self.set_y(self.regs.a),
            0x8A => self.set_a(self.regs.x),
            0x98 => self.set_a(self.regs.y),
            0xBA => self.set_x(self.regs.s),
            0x9A => self.regs.s = self.regs.x, // TXS does not affect flags

            // Stack
            0x48 => {
                let value = self.regs.a;
                self.push(bus, value);
            }
            0x68 => {
                self.dummy_read(bus);
                let value = self.pop(bus);
                self.set_a(value);
            }
            0x08 => {
                let value = self.regs.p.push_byte();
                self.push(bus, value);
            }
            0x28 => {
                self.dummy_read(bus);
                let value = self.pop(bus);
                self.regs.p = Status::from_byte(value);
            }
            0xDA => {
                let value = self.regs.x;
                self.push(bus, value);
            }
            0xFA => {
                self.dummy_read(bus);
                let value = self.pop(bus);
                self.set_x(value);
            }
            0x5A => {
                let value = self.regs.y;
                self.push(bus, value);
            }
            0x7A => {
                self.dummy_read(bus);
                let value = self.pop(bus);
                self.set_y(value);
            }

            // INC / DEC
            0xE6 | 0xEE | 0xF6 | 0xFE => self.rmw(bus, Self::do_inc),
            0xC6 | 0xCE | 0xD6 | 0xDE => self.rmw(bus, Self::do_dec),
            0x1A => {
                let value = self.regs.a.wrapping_add(1);
                self.set_a(value);
            }
            0x3A => {
                let value = self.regs.a.wrapping_sub(1);
                self.set_a(value);
            }
            0xE8 => {
                let value = self.regs.x.wrapping_add(1);
                self.set_x(value);
            }
            0xC8 => {
                let value = self.regs.y.wrapping_add(1);
                self.set_y(value);
            }
            0xCA => {
                let value = self.regs.x.wrapping_sub(1);
                self.set_x(value);
            }
            0x88 => {
                let value = self.regs.y.wrapping_sub(1);
                self.set_y(value);
            }

            // Shifts and rotates
            0x0A => {
                let value = self.do_asl(self.regs.a);
                self.regs.a = value;
            }
            0x06 | 0x0E | 0x16 | 0x1E => self.rmw(bus, Self::do_asl),
            0x4A => {
                let value = self.do_lsr(self.regs.a);
                self.regs.a = value;
            }
            0x46 | 0x4E | 0x56 | 0x5E => self.rmw(bus, Self::do_lsr),
            0x2A => {
                let value = self.do_rol(self.regs.a);
                self.regs.a = value;
            }
            0x26 | 0x2E | 0x36 | 0x3E => self.rmw(bus, Self::do_rol),
            0x6A => {
                let value = self.do_ror(self.regs.a);
                self.regs.a = value;
            }
            0x66 | 0x6E | 0x76 | 0x7E => self.rmw(bus, Self::do_ror),

            // BIT
            0x24 | 0x2C | 0x34 | 0x3C => {
                let value = self.operand_value(bus);
                self.regs.p.set_if(Z, self.regs.a & value == 0);
                self.regs.p.set_if(V, value & 0x40 != 0);
                self.regs.p.set_if(N, value & 0x80 != 0);
            }
            // BIT immediate only affects Z
            0x89 => {
                let value = self.operand_value(bus);
                self.regs.p.set_if(Z, self.regs.a & value == 0);
            }

            // TSB / TRB
            0x04 | 0x0C => self.rmw(bus, Self::do_tsb),
            0x14 | 0x1C => self.rmw(bus, Self::do_trb),

            // Branches
            0x90 => self.op_branch(bus, !self.regs.p.is_set(C)),
            0xB0 => self.op_branch(bus, self.regs.p.is_set(C)),
            0xF0 => self.op_branch(bus, self.regs.p.is_set(Z)),
            0xD0 => self.op_branch(bus, !self.regs.p.is_set(Z)),
            0x30 => self.op_branch(bus, self.regs.p.is_set(N)),
            0x10 => self.op_branch(bus, !self.regs.p.is_set(N)),
            0x70 => self.op_branch(bus, self.regs.p.is_set(V)),
            0x50 => self.op_branch(bus, !self.regs.p.is_set(V)),
            0x80 => self.op_branch(bus, true),

            // Jumps and calls
            0x4C | 0x6C | 0x7C => self.regs.pc = self.operand,
            0x20 => self.op_jsr(bus),
            0x60 => self.op_rts(bus),
            0x40 => self.op_rti(bus),

            // Flag set/clear
            0x18 => self.regs.p.clear(C),
            0x38 => self.regs.p.set(C),
            0xD8 => self.regs.p.clear(D),
            0xF8 => self.regs.p.set(D),
            0x58 => self.regs.p.clear(I),
            0x78 => self.regs.p.set(I),
            0xB8 => self.regs.p.clear(V),

            // WAI / STP
            0xCB => self.stop_state = StopState::WaitingForIrq,
            0xDB => self.stop_state = StopState::Stopped,

            // NOP ($EA) and every undefined opcode. The operand fetch for
            // the decoded size already happened; nothing else to do.
            _ => {}
        }
    }

    // ========================================================================
    // ALU helpers
    // ========================================================================

    fn do_adc<B: Bus>(&mut self, bus: &mut B) {
        let operand = self.operand_value(bus);
        let a = self.regs.a;
        let carry = u8::from(self.regs.p.is_set(C));

        if self.regs.p.is_set(D) {
            let mut al = u16::from(a & 0x0F) + u16::from(operand & 0x0F) + u16::from(carry);
            if al > 9 {
                al += 6;
            }
            let mut ah = u16::from(a >> 4) + u16::from(operand >> 4) + u16::from(al > 15);
            al &= 0x0F;

            // Overflow comes from the binary intermediate.
            let bin = u16::from(a) + u16::from(operand) + u16::from(carry);
            self.regs
                .p
                .set_if(V, !(a ^ operand) & (a ^ (bin as u8)) & 0x80 != 0);

            if ah > 9 {
                ah += 6;
            }
            self.regs.p.set_if(C, ah > 15);

            let result = ((al & 0x0F) | ((ah & 0x0F) << 4)) as u8;
            // 65C02: Z and N reflect the BCD result
            self.regs.p.update_nz(result);
            self.regs.a = result;

            self.dummy_read(bus); // decimal-mode extra cycle
        } else {
            let result = u16::from(a) + u16::from(operand) + u16::from(carry);
            self.regs.p.set_if(C, result > 0xFF);
            self.regs
                .p
                .set_if(V, !(a ^ operand) & (a ^ (result as u8)) & 0x80 != 0);
            self.set_a(result as u8);
        }
    }

    fn do_sbc<B: Bus>(&mut self, bus: &mut B) {
        let operand = self.operand_value(bus);
        let a = self.regs.a;
        let borrow = u8::from(!self.regs.p.is_set(C));

        if self.regs.p.is_set(D) {
            let mut al = i16::from(a & 0x0F) - i16::from(operand & 0x0F) - i16::from(borrow);
            let low_borrow = al < 0;
            if low_borrow {
                al = (al - 6) & 0x0F;
            }
            let mut ah = i16::from(a >> 4) - i16::from(operand >> 4) - i16::from(low_borrow);
            al &= 0x0F;

            let bin = u16::from(a)
                .wrapping_sub(u16::from(operand))
                .wrapping_sub(u16::from(borrow));
            self.regs.p.set_if(C, bin < 0x100);
            self.regs
                .p
                .set_if(V, (a ^ operand) & (a ^ (bin as u8)) & 0x80 != 0);

            if ah < 0 {
                ah -= 6;
            }

            let result = ((al & 0x0F) | ((ah & 0x0F) << 4)) as u8;
            self.regs.p.update_nz(result);
            self.regs.a = result;

            self.dummy_read(bus); // decimal-mode extra cycle
        } else {
            let result = u16::from(a)
                .wrapping_sub(u16::from(operand))
                .wrapping_sub(u16::from(borrow));
            self.regs.p.set_if(C, result < 0x100);
            self.regs
                .p
                .set_if(V, (a ^ operand) & (a ^ (result as u8)) & 0x80 != 0);
            self.set_a(result as u8);
        }
    }

    fn do_cmp(&mut self, reg: u8, value: u8) {
        let result = reg.wrapping_sub(value);
        self.regs.p.set_if(C, reg >= value);
        self.regs.p.update_nz(result);
    }

    fn do_asl(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x80 != 0);
        let result = value << 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_lsr(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x01 != 0);
        let result = value >> 1;
        self.regs.p.update_nz(result);
        result
    }

    fn do_rol(&mut self, value: u8) -> u8 {
        let carry = u8::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, value & 0x80 != 0);
        let result = (value << 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_ror(&mut self, value: u8) -> u8 {
        let carry = if self.regs.p.is_set(C) { 0x80 } else { 0 };
        self.regs.p.set_if(C, value & 0x01 != 0);
        let result = (value >> 1) | carry;
        self.regs.p.update_nz(result);
        result
    }

    fn do_inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.regs.p.update_nz(result);
        result
    }

    fn do_dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.regs.p.update_nz(result);
        result
    }

    fn do_tsb(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(Z, self.regs.a & value == 0);
        value | self.regs.a
    }

    fn do_trb(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(Z, self.regs.a & value == 0);
        value & !self.regs.a
    }

    /// Memory read-modify-write: read, dummy read, write. The 65C02 does not
    /// write the stale value back the way the NMOS 6502 does.
    fn rmw<B: Bus>(&mut self, bus: &mut B, op: fn(&mut Self, u8) -> u8) {
        let addr = self.operand;
        let value = self.read(bus, addr, MemoryOperationType::Read);
        self.dummy_read(bus);
        let result = op(self, value);
        self.write(bus, addr, result);
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn op_branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.operand as u8 as i8;
        if taken {
            self.dummy_read(bus);
            let target = self.regs.pc.wrapping_add(offset as u16);
            if target & 0xFF00 != self.regs.pc & 0xFF00 {
                self.dummy_read(bus); // page-cross penalty
            }
            self.regs.pc = target;
        }
    }

    fn op_jsr<B: Bus>(&mut self, bus: &mut B) {
        let target = self.operand;
        self.dummy_read(bus); // internal operation
        let return_addr = self.regs.pc.wrapping_sub(1);
        self.push_word(bus, return_addr);
        self.regs.pc = target;
    }

    fn op_rts<B: Bus>(&mut self, bus: &mut B) {
        self.dummy_read(bus);
        let addr = self.pop_word(bus);
        self.dummy_read(bus);
        self.regs.pc = addr.wrapping_add(1);
    }

    fn op_rti<B: Bus>(&mut self, bus: &mut B) {
        self.dummy_read(bus);
        let status = self.pop(bus);
        self.regs.p = Status::from_byte(status);
        self.regs.pc = self.pop_word(bus);
    }

    fn op_brk<B: Bus>(&mut self, bus: &mut B) {
        let _ = self.read_byte(bus); // signature byte, discarded
        let pc = self.regs.pc;
        self.push_word(bus, pc);
        let status = self.regs.p.push_byte();
        self.push(bus, status);
        self.regs.p.set(I);
        self.regs.p.clear(D); // 65C02: BRK clears decimal mode
        self.regs.pc = self.read_word(bus, 0xFFFE);
    }

    fn handle_irq<B: Bus>(&mut self, bus: &mut B) {
        let from_pc = self.regs.pc;
        self.dummy_read(bus);
        self.dummy_read(bus);
        self.push_word(bus, from_pc);
        let status = self.regs.p.irq_byte();
        self.push(bus, status);
        self.regs.p.set(I);
        self.regs.p.clear(D); // 65C02: IRQ clears decimal mode
        self.regs.pc = self.read_word(bus, 0xFFFE);
        self.irq_entry = Some(IrqEntry {
            from_pc,
            handler: self.regs.pc,
        });
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl Cpu for Wdc65c02 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u64 {
        self.exec(bus)
    }

    fn reset<B: Bus>(&mut self, bus: &mut B, soft: bool) {
        self.regs = Registers::new();
        self.stop_state = StopState::Running;
        self.irq_line = false;
        self.irq_entry = None;
        if !soft {
            self.cycles = 0;
        }
        self.regs.pc = self.read_word(bus, 0xFFFC);
    }

    fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn set_pc(&mut self, pc: u32) {
        self.regs.pc = pc as u16;
    }

    fn cycle_count(&self) -> u64 {
        self.cycles
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.stop_state != StopState::Running
    }
}

impl Snapshot for Wdc65c02 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.u16(&mut self.regs.pc);
        s.u8(&mut self.regs.s);
        s.u8(&mut self.regs.p.0);
        s.u8(&mut self.regs.a);
        s.u8(&mut self.regs.x);
        s.u8(&mut self.regs.y);
        s.u64(&mut self.cycles);
        let mut stop = self.stop_state as u8;
        s.u8(&mut stop);
        s.bool(&mut self.irq_line);
        if !s.is_saving() {
            self.stop_state = StopState::from_u8(stop);
            self.irq_entry = None;
        }
    }
}

impl Observable for Wdc65c02 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.regs.p.0.into()),
            "cycle" => Some(Value::U64(self.cycles)),
            "halted" => Some(self.is_halted().into()),
            "flags.c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" => Some(self.regs.p.is_set(D).into()),
            "flags.v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" => Some(self.regs.p.is_set(N).into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "a", "x", "y", "s", "p", "cycle", "halted", "flags.c", "flags.z", "flags.i",
            "flags.d", "flags.v", "flags.n",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    #[test]
    fn lda_immediate() {
        let mut cpu = Wdc65c02::new();
        let mut bus = SimpleBus::new();
        bus.load(0x0200, &[0xA9, 0x80]); // LDA #$80
        cpu.regs.pc = 0x0200;

        let cycles = cpu.exec(&mut bus);

        assert_eq!(cycles, 2);
        assert_eq!(cpu.regs.a, 0x80);
        assert_eq!(cpu.regs.pc, 0x0202);
        assert!(cpu.regs.p.is_set(N));
        assert!(!cpu.regs.p.is_set(Z));
    }

    #[test]
    fn sta_zeropage() {
        let mut cpu = Wdc65c02::new();
        let mut bus = SimpleBus::new();
        cpu.regs.a = 0xC7;
        bus.load(0x0200, &[0x85, 0x3C]); // STA $3C
        cpu.regs.pc = 0x0200;

        let cycles = cpu.exec(&mut bus);

        assert_eq!(cycles, 3);
        assert_eq!(bus.peek(0x003C), 0xC7);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut cpu = Wdc65c02::new();
        cpu.regs.pc = 0x1234;
        cpu.regs.a = 0xAB;
        cpu.regs.s = 0xF0;
        cpu.set_irq_line(true);

        let mut s = Serializer::writer();
        cpu.serialize(&mut s);
        let data = s.finish();

        let mut other = Wdc65c02::new();
        let mut s = Serializer::reader(data);
        other.serialize(&mut s);
        assert!(!s.has_failed());
        assert_eq!(other.regs, cpu.regs);
        assert_eq!(other.stop_state(), StopState::Running);
    }
}
