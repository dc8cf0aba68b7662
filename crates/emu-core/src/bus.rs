//! Memory and I/O bus interface.

use crate::memory::{MemoryOperation, MemoryOperationType};

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding, routing to the appropriate device, and the
/// per-access bookkeeping (open-bus shadow, debugger hooks). Every access
/// carries its [`MemoryOperationType`] so instrumentation can distinguish
/// opcode fetches, operands, dummy cycles, and DMA traffic.
pub trait Bus {
    /// Read a byte. Costs one CPU cycle of bus time.
    fn read(&mut self, address: u16, op: MemoryOperationType) -> u8;

    /// Write a byte. Costs one CPU cycle of bus time.
    fn write(&mut self, address: u16, value: u8, op: MemoryOperationType);

    /// Read without side effects, cycles, or hooks.
    ///
    /// Register reads that would normally consume state (FIFO pops, flag
    /// clears) return the current value untouched. Memory viewers and the
    /// disassembler use this.
    fn peek(&self, address: u16) -> u8;

    /// Fill `out` using [`Bus::peek`] semantics starting at `start`.
    fn peek_block(&self, start: u16, out: &mut [u8]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.peek(start.wrapping_add(i as u16));
        }
    }
}

/// Flat 64 KiB RAM bus for CPU-level tests.
///
/// Records every access in order so tests can assert exact dummy-read and
/// dummy-write placement, not just cycle totals.
pub struct SimpleBus {
    pub ram: Box<[u8; 0x1_0000]>,
    /// Every access since construction or [`SimpleBus::clear_accesses`].
    pub accesses: Vec<MemoryOperation>,
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0u8; 0x1_0000]),
            accesses: Vec::new(),
        }
    }

    /// Copy `bytes` into RAM starting at `origin`.
    pub fn load(&mut self, origin: u16, bytes: &[u8]) {
        let start = origin as usize;
        self.ram[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Set the reset vector at `$FFFC/$FFFD`.
    pub fn set_reset_vector(&mut self, target: u16) {
        self.ram[0xFFFC] = (target & 0xFF) as u8;
        self.ram[0xFFFD] = (target >> 8) as u8;
    }

    /// Set the IRQ/BRK vector at `$FFFE/$FFFF`.
    pub fn set_irq_vector(&mut self, target: u16) {
        self.ram[0xFFFE] = (target & 0xFF) as u8;
        self.ram[0xFFFF] = (target >> 8) as u8;
    }

    pub fn clear_accesses(&mut self) {
        self.accesses.clear();
    }

    /// Accesses of the given type, in order.
    #[must_use]
    pub fn accesses_of(&self, op: MemoryOperationType) -> Vec<MemoryOperation> {
        self.accesses
            .iter()
            .copied()
            .filter(|a| a.op_type == op)
            .collect()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16, op: MemoryOperationType) -> u8 {
        let value = self.ram[address as usize];
        self.accesses.push(MemoryOperation {
            address,
            value,
            op_type: op,
        });
        value
    }

    fn write(&mut self, address: u16, value: u8, op: MemoryOperationType) {
        self.accesses.push(MemoryOperation {
            address,
            value,
            op_type: op,
        });
        self.ram[address as usize] = value;
    }

    fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_bus_records_accesses() {
        let mut bus = SimpleBus::new();
        bus.load(0x0200, &[0xAA, 0xBB]);
        assert_eq!(bus.read(0x0200, MemoryOperationType::Read), 0xAA);
        bus.write(0x0201, 0xCC, MemoryOperationType::Write);
        assert_eq!(bus.accesses.len(), 2);
        assert_eq!(bus.accesses[0].value, 0xAA);
        assert_eq!(bus.accesses[1].address, 0x0201);
        assert_eq!(bus.peek(0x0201), 0xCC);
        assert_eq!(bus.accesses.len(), 2, "peek must not record an access");
    }

    #[test]
    fn peek_block_wraps_around() {
        let mut bus = SimpleBus::new();
        bus.ram[0xFFFF] = 0x11;
        bus.ram[0x0000] = 0x22;
        let mut out = [0u8; 2];
        bus.peek_block(0xFFFF, &mut out);
        assert_eq!(out, [0x11, 0x22]);
    }
}
