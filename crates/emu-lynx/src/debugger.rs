//! Debugger facade for the Lynx.
//!
//! The console drives three hooks: [`LynxDebugger::process_instruction`]
//! before each instruction executes, [`LynxDebugger::process_access`] for
//! every bus access the instruction made, and
//! [`LynxDebugger::process_interrupt`] when the CPU vectors to a handler.
//! Everything else (callstack, coverage, trace, events, step control)
//! hangs off those three.

use emu_core::{AddressInfo, MemoryOperation, MemoryOperationType, MemoryType};
use emu_debugger::{
    BreakEvent, BreakSource, Breakpoint, Breakpoints, Callstack, CdlFlags, CodeDataLogger,
    DebugEvent, DebugEventType, EvalContext, EventLog, StackFrame, StackFrameFlags, StepKind,
    StepRequest, TraceLogger,
};
use wdc_65c02::{op_size, IrqEntry, Registers};

use crate::memory::TrackedAccess;
use crate::CPU_CYCLES_PER_SCANLINE;

/// Rows kept in the execution trace ring.
const TRACE_CAPACITY: usize = 30_000;

const JSR: u8 = 0x20;
const RTI: u8 = 0x40;
const RTS: u8 = 0x60;

/// Optional break conditions, all off by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebuggerConfig {
    pub break_on_brk: bool,
    pub break_on_stp: bool,
    /// Break when a read hits work RAM no write has touched since power-on.
    pub break_on_uninit_read: bool,
}

/// Per-console debugger state.
pub struct LynxDebugger {
    config: DebuggerConfig,
    breakpoints: Breakpoints,
    callstack: Callstack,
    cdl: CodeDataLogger,
    trace: TraceLogger,
    events: EventLog,
    step: StepRequest,

    prev_opcode: u8,
    prev_pc: u16,
    prev_abs: Option<AddressInfo>,
    /// One bit per work RAM byte, set on first write.
    ram_written: Box<[u8; 0x2000]>,
}

/// True for every opcode that redirects the program counter without a
/// matching return: JMP, BRA, the conditional branches, RTS and RTI.
const fn is_jump(opcode: u8) -> bool {
    matches!(opcode, 0x4C | 0x6C | 0x7C | 0x80 | RTS | RTI) || opcode & 0x1F == 0x10
}

fn cycle_in_line(cycle: u64) -> u16 {
    (cycle % CPU_CYCLES_PER_SCANLINE) as u16
}

impl LynxDebugger {
    #[must_use]
    pub fn new(rom: &[u8], config: DebuggerConfig) -> Self {
        Self {
            config,
            breakpoints: Breakpoints::new(),
            callstack: Callstack::new(),
            cdl: CodeDataLogger::new(rom),
            trace: TraceLogger::new(TRACE_CAPACITY),
            events: EventLog::new(),
            step: StepRequest::default(),
            prev_opcode: 0x01,
            prev_pc: 0,
            prev_abs: None,
            ram_written: Box::new([0u8; 0x2000]),
        }
    }

    /// Pre-execution hook. `bytes` are the instruction bytes at `pc` (up
    /// to three, unused ones zero); `resolve` maps a CPU address to its
    /// current absolute location for callstack bookkeeping.
    pub fn process_instruction(
        &mut self,
        pc: u16,
        bytes: [u8; 3],
        abs: Option<AddressInfo>,
        regs: &Registers,
        cycle: u64,
        scanline: u16,
        resolve: impl Fn(u16) -> Option<AddressInfo>,
    ) {
        let opcode = bytes[0];
        let sp = 0x0100 | u16::from(regs.s);

        if let Some(info) = abs {
            if info.memory_type == MemoryType::LynxPrgRom {
                let extra = if self.prev_opcode == JSR {
                    CdlFlags::SUB_ENTRY
                } else if is_jump(self.prev_opcode) {
                    CdlFlags::JUMP_TARGET
                } else {
                    CdlFlags::NONE
                };
                self.cdl.set_code(info.address, extra);
            }
        }

        // The previous instruction's control transfer lands here.
        match self.prev_opcode {
            JSR => {
                let return_addr = self.prev_pc.wrapping_add(3);
                self.callstack.push(
                    StackFrame {
                        source: self.prev_pc,
                        abs_source: self.prev_abs,
                        target: pc,
                        abs_target: abs,
                        return_addr,
                        abs_return: resolve(return_addr),
                        return_sp: sp.wrapping_add(2),
                        flags: StackFrameFlags::None,
                    },
                    cycle,
                );
            }
            RTS | RTI => {
                self.callstack.pop(pc, abs, sp, cycle);
                if self.step.matches_return(pc, sp) {
                    self.step.break_now(BreakSource::CpuStep);
                }
            }
            _ => {}
        }

        if opcode == 0x00 && self.config.break_on_brk {
            self.step.break_now(BreakSource::BreakOnBrk);
        }

        self.prev_opcode = opcode;
        self.prev_pc = pc;
        self.prev_abs = abs;

        if let Some(row) = self.trace.begin_row() {
            let len = op_size(opcode);
            row.pc = pc;
            row.opcode = bytes;
            row.opcode_len = len as u8;
            row.a = regs.a;
            row.x = regs.x;
            row.y = regs.y;
            row.s = regs.s;
            row.p = regs.p.0;
            row.cycle = cycle;
            row.scanline = scanline;
            let _ = wdc_65c02::disassemble(row, pc, &bytes[..len]);
        }

        self.step.process_exec();

        if self.breakpoints.has_any() {
            let op = MemoryOperation {
                address: pc,
                value: opcode,
                op_type: MemoryOperationType::ExecOpcode,
            };
            let ctx = EvalContext {
                a: regs.a,
                x: regs.x,
                y: regs.y,
                s: regs.s,
                p: regs.p.0,
                pc,
                address: pc,
                value: opcode,
                scanline,
            };
            if let Some(bp) = self.breakpoints.check(op, abs, &ctx) {
                let (id, mark_only) = (bp.id, bp.mark_only);
                if !mark_only {
                    self.step.break_now(BreakSource::Breakpoint);
                }
                self.events.add(DebugEvent {
                    event_type: DebugEventType::Breakpoint,
                    operation: op,
                    pc,
                    scanline,
                    cycle: cycle_in_line(cycle),
                    breakpoint_id: Some(id),
                });
            }
        }
    }

    /// Post-execution hook for one bus access the instruction made.
    pub fn process_access(
        &mut self,
        access: TrackedAccess,
        regs: &Registers,
        cycle: u64,
        scanline: u16,
    ) {
        let TrackedAccess { op, abs } = access;

        // Chip register traffic shows up on the event viewer.
        if abs.is_none() && (0xFC00..=0xFDFF).contains(&op.address) {
            self.events.add(DebugEvent {
                event_type: DebugEventType::Register,
                operation: op,
                pc: self.prev_pc,
                scanline,
                cycle: cycle_in_line(cycle),
                breakpoint_id: None,
            });
        }

        if let Some(info) = abs {
            match info.memory_type {
                MemoryType::LynxPrgRom if op.op_type == MemoryOperationType::Read => {
                    self.cdl.set_data(info.address);
                }
                MemoryType::LynxWorkRam => self.track_ram(op, info),
                _ => {}
            }
        }

        self.step.process_cpu_cycle();

        if self.breakpoints.has_any() && !op.op_type.is_exec() {
            let ctx = EvalContext {
                a: regs.a,
                x: regs.x,
                y: regs.y,
                s: regs.s,
                p: regs.p.0,
                pc: self.prev_pc,
                address: op.address,
                value: op.value,
                scanline,
            };
            if let Some(bp) = self.breakpoints.check(op, abs, &ctx) {
                let (id, mark_only) = (bp.id, bp.mark_only);
                if !mark_only {
                    self.step.break_now(BreakSource::Breakpoint);
                }
                self.events.add(DebugEvent {
                    event_type: DebugEventType::Breakpoint,
                    operation: op,
                    pc: self.prev_pc,
                    scanline,
                    cycle: cycle_in_line(cycle),
                    breakpoint_id: Some(id),
                });
            }
        }
    }

    fn track_ram(&mut self, op: MemoryOperation, info: AddressInfo) {
        let addr = info.address as usize;
        let (byte, bit) = (addr >> 3, 1u8 << (addr & 7));
        if op.op_type.is_write() {
            self.ram_written[byte] |= bit;
        } else if op.op_type == MemoryOperationType::Read
            && self.config.break_on_uninit_read
            && self.ram_written[byte] & bit == 0
        {
            self.step.break_now(BreakSource::BreakOnUninitRead);
        }
    }

    /// The CPU vectored to `entry.handler`. Runs before the handler's
    /// first instruction is processed.
    pub fn process_interrupt(
        &mut self,
        entry: IrqEntry,
        regs: &Registers,
        cycle: u64,
        scanline: u16,
        resolve: impl Fn(u16) -> Option<AddressInfo>,
    ) {
        let sp_after = 0x0100 | u16::from(regs.s);
        // The interrupt pushed three bytes after the previous instruction
        // finished.
        let sp_before = sp_after.wrapping_add(3);
        let interrupted_abs = resolve(entry.from_pc);

        // That instruction's control transfer never reached
        // process_instruction; settle it before recording the handler
        // frame.
        match self.prev_opcode {
            JSR => {
                let return_addr = self.prev_pc.wrapping_add(3);
                self.callstack.push(
                    StackFrame {
                        source: self.prev_pc,
                        abs_source: self.prev_abs,
                        target: entry.from_pc,
                        abs_target: interrupted_abs,
                        return_addr,
                        abs_return: resolve(return_addr),
                        return_sp: sp_before.wrapping_add(2),
                        flags: StackFrameFlags::None,
                    },
                    cycle,
                );
            }
            RTS | RTI => self
                .callstack
                .pop(entry.from_pc, interrupted_abs, sp_before, cycle),
            _ => {}
        }

        self.callstack.push(
            StackFrame {
                source: self.prev_pc,
                abs_source: self.prev_abs,
                target: entry.handler,
                abs_target: resolve(entry.handler),
                return_addr: entry.from_pc,
                abs_return: interrupted_abs,
                return_sp: sp_before,
                flags: StackFrameFlags::Irq,
            },
            cycle,
        );
        self.prev_opcode = 0x01;

        self.events.add(DebugEvent {
            event_type: DebugEventType::Irq,
            operation: MemoryOperation {
                address: entry.handler,
                value: 0,
                op_type: MemoryOperationType::ExecOpcode,
            },
            pc: self.prev_pc,
            scanline,
            cycle: cycle_in_line(cycle),
            breakpoint_id: None,
        });
        self.step.process_irq();
    }

    pub fn process_scanline(&mut self, scanline: u16) {
        self.step.process_scanline(scanline);
    }

    pub fn process_ppu_cycles(&mut self, count: u32) {
        self.step.process_ppu_cycles(count);
    }

    /// Arm a step request. `pc`, `opcode` and `sp` describe the paused
    /// position; for [`StepKind::SpecificScanline`], `count` is the target
    /// scanline.
    pub fn request_step(&mut self, kind: StepKind, count: u32, pc: u16, opcode: u8, sp: u16) {
        self.step = match kind {
            StepKind::Step => StepRequest::instructions(count),
            StepKind::StepOut => match (
                self.callstack.return_address(),
                self.callstack.return_stack_pointer(),
            ) {
                (Some(addr), Some(return_sp)) => StepRequest::step_out(addr, return_sp),
                // Nothing to return from: run freely.
                _ => StepRequest::default(),
            },
            StepKind::StepOver => {
                if opcode == JSR {
                    StepRequest::step_over(pc.wrapping_add(3), sp)
                } else {
                    StepRequest::instructions(1)
                }
            }
            StepKind::CpuCycle => StepRequest::cpu_cycles(count),
            StepKind::PpuCycle => StepRequest::ppu_cycles(count),
            StepKind::PpuScanline => {
                StepRequest::scanlines(count, CPU_CYCLES_PER_SCANLINE as u32)
            }
            StepKind::PpuFrame => {
                StepRequest::frames(count, crate::CPU_CYCLES_PER_FRAME as u32)
            }
            StepKind::SpecificScanline => StepRequest::to_scanline(count as u16),
            StepKind::RunToIrq => StepRequest::to_irq(),
            StepKind::StepBack => StepRequest::pause(),
        };
    }

    pub fn pause(&mut self) {
        self.step = StepRequest::pause();
    }

    pub fn break_now(&mut self, source: BreakSource) {
        self.step.break_now(source);
    }

    pub fn resume(&mut self) {
        self.step = StepRequest::default();
    }

    #[must_use]
    pub fn break_needed(&self) -> bool {
        self.step.break_needed()
    }

    /// Consume a pending break, if any. `pc` and `opcode` describe the
    /// instruction execution stopped in front of.
    pub(crate) fn take_break(&mut self, pc: u16, opcode: u8) -> Option<BreakEvent> {
        if !self.step.break_needed() {
            return None;
        }
        let source = self.step.break_source();
        self.step = StepRequest::default();
        Some(BreakEvent {
            source,
            operation: MemoryOperation {
                address: pc,
                value: opcode,
                op_type: MemoryOperationType::ExecOpcode,
            },
            pc,
        })
    }

    pub(crate) fn end_frame(&mut self) {
        self.events.end_frame();
    }

    pub fn set_breakpoints(&mut self, breakpoints: &[Breakpoint]) {
        self.breakpoints.set(breakpoints);
    }

    #[must_use]
    pub fn callstack(&self) -> &Callstack {
        &self.callstack
    }

    #[must_use]
    pub fn cdl(&self) -> &CodeDataLogger {
        &self.cdl
    }

    pub fn cdl_mut(&mut self) -> &mut CodeDataLogger {
        &mut self.cdl
    }

    #[must_use]
    pub fn trace(&self) -> &TraceLogger {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut TraceLogger {
        &mut self.trace
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    #[must_use]
    pub fn config(&self) -> DebuggerConfig {
        self.config
    }

    pub fn set_config(&mut self, config: DebuggerConfig) {
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(addr: u16) -> Option<AddressInfo> {
        Some(AddressInfo::new(u32::from(addr), MemoryType::LynxWorkRam))
    }

    fn regs(s: u8) -> Registers {
        let mut regs = Registers::new();
        regs.s = s;
        regs
    }

    fn make_debugger(config: DebuggerConfig) -> LynxDebugger {
        LynxDebugger::new(&[0u8; 64], config)
    }

    fn exec(dbg: &mut LynxDebugger, pc: u16, bytes: [u8; 3], s: u8, cycle: u64) {
        let abs = resolve(pc);
        dbg.process_instruction(pc, bytes, abs, &regs(s), cycle, 0, resolve);
    }

    #[test]
    fn jsr_and_rts_drive_the_callstack() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        exec(&mut dbg, 0x0200, [0x20, 0x00, 0x03], 0xFD, 0);
        assert!(dbg.callstack().is_empty());

        // Landed at the subroutine: the frame opens.
        exec(&mut dbg, 0x0300, [0x60, 0, 0], 0xFB, 6);
        assert_eq!(dbg.callstack().len(), 1);
        let frame = dbg.callstack().frames().next().unwrap();
        assert_eq!(frame.source, 0x0200);
        assert_eq!(frame.target, 0x0300);
        assert_eq!(frame.return_addr, 0x0203);
        assert_eq!(frame.return_sp, 0x01FD);

        // Back after the call: the frame closes.
        exec(&mut dbg, 0x0203, [0xEA, 0, 0], 0xFD, 12);
        assert!(dbg.callstack().is_empty());
    }

    #[test]
    fn step_out_breaks_when_the_frame_returns() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        exec(&mut dbg, 0x0200, [0x20, 0x00, 0x03], 0xFD, 0);
        exec(&mut dbg, 0x0300, [0x60, 0, 0], 0xFB, 6);

        dbg.request_step(StepKind::StepOut, 1, 0x0300, 0x60, 0x01FB);
        assert!(!dbg.break_needed());

        exec(&mut dbg, 0x0203, [0xEA, 0, 0], 0xFD, 12);
        assert!(dbg.break_needed());
        let event = dbg.take_break(0x0203, 0xEA).unwrap();
        assert_eq!(event.source, BreakSource::CpuStep);
        assert!(!dbg.break_needed());
    }

    #[test]
    fn step_over_skips_the_subroutine() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        // Paused in front of the JSR at $0200.
        dbg.request_step(StepKind::StepOver, 1, 0x0200, 0x20, 0x01FD);
        exec(&mut dbg, 0x0200, [0x20, 0x00, 0x03], 0xFD, 0);
        exec(&mut dbg, 0x0300, [0x60, 0, 0], 0xFB, 6);
        assert!(!dbg.break_needed());

        exec(&mut dbg, 0x0203, [0xEA, 0, 0], 0xFD, 12);
        assert!(dbg.break_needed());
    }

    #[test]
    fn brk_breaks_when_enabled() {
        let mut dbg = make_debugger(DebuggerConfig {
            break_on_brk: true,
            ..DebuggerConfig::default()
        });
        exec(&mut dbg, 0x0200, [0x00, 0, 0], 0xFD, 0);
        let event = dbg.take_break(0x0200, 0x00).unwrap();
        assert_eq!(event.source, BreakSource::BreakOnBrk);
    }

    #[test]
    fn exec_breakpoint_breaks_and_logs() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        let mut bp = Breakpoint::new(7, MemoryType::LynxWorkRam, 0x0200..=0x0200);
        bp.on_exec = true;
        dbg.set_breakpoints(&[bp]);

        exec(&mut dbg, 0x01FF, [0xEA, 0, 0], 0xFD, 0);
        assert!(!dbg.break_needed());

        exec(&mut dbg, 0x0200, [0xEA, 0, 0], 0xFD, 2);
        assert!(dbg.break_needed());
        let event = dbg.take_break(0x0200, 0xEA).unwrap();
        assert_eq!(event.source, BreakSource::Breakpoint);

        dbg.end_frame();
        assert_eq!(dbg.events().frame_events().len(), 1);
        assert_eq!(dbg.events().frame_events()[0].breakpoint_id, Some(7));
    }

    #[test]
    fn write_breakpoint_checks_recorded_accesses() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        let mut bp = Breakpoint::new(1, MemoryType::LynxWorkRam, 0x0400..=0x04FF);
        bp.on_write = true;
        dbg.set_breakpoints(&[bp]);

        let access = TrackedAccess {
            op: MemoryOperation {
                address: 0x0410,
                value: 0x55,
                op_type: MemoryOperationType::Write,
            },
            abs: resolve(0x0410),
        };
        dbg.process_access(access, &regs(0xFD), 4, 0);
        assert!(dbg.break_needed());
    }

    #[test]
    fn mark_only_breakpoint_logs_without_breaking() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        let mut bp = Breakpoint::new(2, MemoryType::LynxWorkRam, 0x0200..=0x0200);
        bp.on_exec = true;
        bp.mark_only = true;
        dbg.set_breakpoints(&[bp]);

        exec(&mut dbg, 0x0200, [0xEA, 0, 0], 0xFD, 0);
        assert!(!dbg.break_needed());

        dbg.end_frame();
        assert_eq!(dbg.events().frame_events().len(), 1);
    }

    #[test]
    fn trace_rows_capture_state_and_disassembly() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        dbg.trace_mut().set_enabled(true);

        let mut regs = regs(0xFD);
        regs.a = 0x42;
        dbg.process_instruction(0x0200, [0xA9, 0x10, 0], resolve(0x0200), &regs, 100, 3, resolve);

        assert_eq!(dbg.trace().len(), 1);
        let row = dbg.trace().rows().next().unwrap();
        assert_eq!(row.pc, 0x0200);
        assert_eq!(row.opcode_len, 2);
        assert_eq!(row.a, 0x42);
        assert_eq!(row.scanline, 3);
        assert!(row.text().contains("LDA"));
        assert!(row.text().contains("$10"));
    }

    #[test]
    fn register_accesses_log_events() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        let access = TrackedAccess {
            op: MemoryOperation {
                address: 0xFD23,
                value: 0x08,
                op_type: MemoryOperationType::Write,
            },
            abs: None,
        };
        dbg.process_access(access, &regs(0xFD), 0, 17);

        dbg.end_frame();
        let events = dbg.events().frame_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, DebugEventType::Register);
        assert_eq!(events[0].operation.address, 0xFD23);
        assert_eq!(events[0].scanline, 17);
    }

    #[test]
    fn uninitialized_ram_read_breaks_when_enabled() {
        let mut dbg = make_debugger(DebuggerConfig {
            break_on_uninit_read: true,
            ..DebuggerConfig::default()
        });

        // Written then read: no break.
        let write = TrackedAccess {
            op: MemoryOperation {
                address: 0x0400,
                value: 1,
                op_type: MemoryOperationType::Write,
            },
            abs: resolve(0x0400),
        };
        let read_back = TrackedAccess {
            op: MemoryOperation {
                address: 0x0400,
                value: 1,
                op_type: MemoryOperationType::Read,
            },
            abs: resolve(0x0400),
        };
        dbg.process_access(write, &regs(0xFD), 0, 0);
        dbg.process_access(read_back, &regs(0xFD), 2, 0);
        assert!(!dbg.break_needed());

        // Never written: break.
        let cold_read = TrackedAccess {
            op: MemoryOperation {
                address: 0x0500,
                value: 0,
                op_type: MemoryOperationType::Read,
            },
            abs: resolve(0x0500),
        };
        dbg.process_access(cold_read, &regs(0xFD), 4, 0);
        let event = dbg.take_break(0x0200, 0xEA).unwrap();
        assert_eq!(event.source, BreakSource::BreakOnUninitRead);
    }

    #[test]
    fn interrupt_pushes_a_handler_frame() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        exec(&mut dbg, 0x0200, [0xEA, 0, 0], 0xFD, 0);

        let entry = IrqEntry {
            from_pc: 0x0201,
            handler: 0x0280,
        };
        // Three bytes pushed: $FD -> $FA.
        dbg.process_interrupt(entry, &regs(0xFA), 2, 0, resolve);

        assert_eq!(dbg.callstack().len(), 1);
        let frame = dbg.callstack().frames().next().unwrap();
        assert_eq!(frame.flags, StackFrameFlags::Irq);
        assert_eq!(frame.target, 0x0280);
        assert_eq!(frame.return_addr, 0x0201);
        assert_eq!(frame.return_sp, 0x01FD);

        dbg.end_frame();
        assert_eq!(dbg.events().frame_events().len(), 1);
        assert_eq!(
            dbg.events().frame_events()[0].event_type,
            DebugEventType::Irq
        );

        // RTI closes the frame.
        exec(&mut dbg, 0x0280, [0x40, 0, 0], 0xFA, 9);
        exec(&mut dbg, 0x0201, [0xEA, 0, 0], 0xFD, 15);
        assert!(dbg.callstack().is_empty());
    }

    #[test]
    fn run_to_irq_breaks_on_the_interrupt() {
        let mut dbg = make_debugger(DebuggerConfig::default());
        dbg.request_step(StepKind::RunToIrq, 1, 0x0200, 0xEA, 0x01FD);
        exec(&mut dbg, 0x0200, [0xEA, 0, 0], 0xFD, 0);
        assert!(!dbg.break_needed());

        let entry = IrqEntry {
            from_pc: 0x0201,
            handler: 0x0280,
        };
        dbg.process_interrupt(entry, &regs(0xFA), 2, 0, resolve);
        assert_eq!(
            dbg.take_break(0x0280, 0x00).unwrap().source,
            BreakSource::Irq
        );
    }
}
