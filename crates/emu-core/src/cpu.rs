//! CPU core trait.

use crate::Bus;

/// An instruction-stepped CPU core.
///
/// CPUs execute one whole instruction per `step`, driving the bus for every
/// access (each access is one CPU cycle) and counting their own cycles.
/// Peripherals catch up to the CPU's cycle count between steps.
///
/// The trait is the framework seam; machines hold the concrete CPU type and
/// never dispatch through it in the frame loop. Interrupt wiring beyond the
/// level-sensitive IRQ line (NMI edges, coprocessor buses) is machine
/// specific and lives on the concrete type.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute exactly one instruction (or one waiting step while asleep).
    ///
    /// Returns the CPU cycles consumed, including interrupt entry when the
    /// post-instruction IRQ test fires.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u64;

    /// Reset. Reads the reset vector through the bus; a soft reset keeps
    /// whatever memory the machine chooses to preserve.
    fn reset<B: Bus>(&mut self, bus: &mut B, soft: bool);

    /// Drive the level-sensitive IRQ input.
    ///
    /// The line is sampled after each retired instruction, masked by the
    /// interrupt-disable flag. Raising it mid-instruction therefore takes
    /// effect one instruction later. Wakes a sleeping CPU regardless of the
    /// mask state.
    fn set_irq_line(&mut self, asserted: bool);

    /// Current program counter.
    ///
    /// Returns `u32` to cover all supported address widths; narrower CPUs
    /// zero-extend.
    fn pc(&self) -> u32;

    /// Move the program counter without touching the bus.
    fn set_pc(&mut self, pc: u32);

    /// Total CPU cycles since power-on.
    fn cycle_count(&self) -> u64;

    /// Snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// True while stopped or waiting for an interrupt.
    fn is_halted(&self) -> bool;
}
