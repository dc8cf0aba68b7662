//! The assembled console.
//!
//! One 65SC02 on a shared bus with Suzy and Mikey, clocked in frame-sized
//! slices of 53235 CPU cycles (75 Hz). Suzy never runs on her own: sprite
//! work happens inside the register write that starts it and comes back
//! as a stall charged to the CPU. Mikey catches up to the CPU clock after
//! every instruction, which is also when the IRQ line and pending sleep
//! requests are sampled.

use std::ops::RangeInclusive;

use atari_mikey::Apu;
use emu_core::{
    begin_load, begin_save, BatteryStore, Bus, ConsoleId, Cpu, FrameInfo, LoadRomError,
    MasterClock, MemoryOperationType, Observable, PixelFormat, Rotation, SampleBuffer,
    SaveStateError, Serializer, Snapshot, Value,
};
use emu_debugger::{
    BreakEvent, BreakSource, Breakpoint, Cheat, StepBackConfig, StepBackKind, StepBackPlanner,
    StepKind,
};
use lynx_cartridge::{Cart, Eeprom};
use wdc_65c02::Wdc65c02;

use crate::config::{LynxConfig, LynxModel};
use crate::debugger::{DebuggerConfig, LynxDebugger};
use crate::input::{InputQueue, Joypad, LynxButton};
use crate::memory::LynxBus;
use crate::{CPU_CYCLES_PER_FRAME, CPU_CYCLES_PER_SCANLINE};

const BOOT_ROM_SIZE: usize = 0x200;

/// Outcome of [`LynxConsole::run_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A full frame of cycles ran.
    Complete,
    /// The debugger stopped execution mid-frame. Call `run_frame` again to
    /// continue from the break point.
    Break(BreakEvent),
}

/// An Atari Lynx.
pub struct LynxConsole {
    cpu: Wdc65c02,
    bus: LynxBus,
    clock: MasterClock,
    model: LynxModel,
    rotation: Rotation,
    config: LynxConfig,

    frame_count: u64,
    lag_frames: u64,
    audio: SampleBuffer,
    joypad: Joypad,
    input_queue: InputQueue,

    debugger: Option<LynxDebugger>,
    stepback: StepBackPlanner,
    /// Cycle target of a frame interrupted by a break.
    frame_target: Option<u64>,
    /// The pre-execution hook already ran for the instruction the CPU is
    /// parked on; skip it once on resume.
    resume_pending: bool,
    last_scanline: u16,
    was_halted: bool,
}

impl LynxConsole {
    /// Build a console from `config` and put it in its power-on state.
    ///
    /// # Errors
    ///
    /// [`LoadRomError::MissingFirmware`] when `config` demands a boot ROM
    /// none was supplied, or any cartridge parse error from
    /// [`Cart::from_rom`].
    pub fn new(config: &LynxConfig) -> Result<Self, LoadRomError> {
        let boot_rom = match &config.boot_rom {
            Some(data) if data.len() == BOOT_ROM_SIZE => Some(data.clone()),
            Some(data) => {
                log::warn!(
                    "lynx: boot rom is {} bytes, expected {BOOT_ROM_SIZE}; ignoring it",
                    data.len()
                );
                None
            }
            None => None,
        };
        if boot_rom.is_none() && config.require_boot_rom {
            return Err(LoadRomError::MissingFirmware);
        }

        let cart = Cart::from_rom(&config.rom)?;
        let rotation = config.rotation.unwrap_or(cart.info().rotation);
        let eeprom = Eeprom::new(config.eeprom.unwrap_or(cart.info().eeprom));

        let mut console = Self {
            cpu: Wdc65c02::new(),
            bus: LynxBus::new(cart, eeprom, boot_rom),
            clock: MasterClock::new(16_000_000, 4),
            model: config.model,
            rotation,
            config: config.clone(),
            frame_count: 0,
            lag_frames: 0,
            audio: SampleBuffer::new(Apu::SAMPLE_RATE),
            joypad: Joypad::new(),
            input_queue: InputQueue::new(),
            debugger: None,
            stepback: StepBackPlanner::new(),
            frame_target: None,
            resume_pending: false,
            last_scanline: 0,
            was_halted: false,
        };

        if console.bus.boot_rom_present() {
            console.cpu.reset(&mut console.bus, false);
        } else {
            console.apply_hle_boot();
        }
        log::debug!(
            "lynx: model {:?}, rotation {:?}, start pc ${:04X}",
            console.model,
            console.rotation,
            console.cpu.pc()
        );
        Ok(console)
    }

    /// State the boot ROM would leave behind: stack at the top of page one,
    /// IRQs masked, display DMA running from `$C000`, and timers 0 and 2
    /// set up for 75 Hz scan timing.
    fn apply_hle_boot(&mut self) {
        self.cpu.regs.s = 0xFF;
        self.bus.write(0xFFF9, 0x00, MemoryOperationType::Write);
        for (reg, value) in [
            (0xFD00, 0x9E), // T0 backup: 158 us per scanline
            (0xFD01, 0x18), // T0 on, 1 us source
            (0xFD08, 0x68), // T2 backup: 104 scanlines
            (0xFD09, 0x1F), // T2 linked to T0
            (0xFD92, 0x09), // DISPCTL: DMA on, color
            (0xFD94, 0x00),
            (0xFD95, 0xC0), // DISPADR $C000
        ] {
            self.bus.write(reg, value, MemoryOperationType::Write);
        }

        let mut vector =
            u16::from_le_bytes([self.bus.peek(0xFFFC), self.bus.peek(0xFFFD)]);
        if vector == 0x0000 || vector == 0xFFFF {
            // Nothing useful in the image; games loaded straight into RAM
            // conventionally start at $0200.
            vector = 0x0200;
        }
        self.cpu.set_pc(u32::from(vector));
    }

    /// Run up to one frame of emulation (53235 CPU cycles).
    ///
    /// A [`FrameStatus::Break`] leaves the frame unfinished; the next call
    /// picks up the same cycle budget rather than starting a new frame.
    pub fn run_frame(&mut self) -> FrameStatus {
        let target = self.frame_target.unwrap_or_else(|| {
            // Fresh frame: drop last frame's audio and apply queued input.
            self.audio.clear();
            self.input_queue.process(self.frame_count, &mut self.joypad);
            self.cpu.cycle_count() + CPU_CYCLES_PER_FRAME
        });
        self.frame_target = Some(target);

        while self.cpu.cycle_count() < target {
            if let Some(event) = self.step_instruction() {
                return FrameStatus::Break(event);
            }
        }

        self.frame_target = None;
        self.finish_frame();
        FrameStatus::Complete
    }

    fn step_instruction(&mut self) -> Option<BreakEvent> {
        if let Some(event) = self.debug_pre_exec() {
            return Some(event);
        }

        let consumed = self.cpu.step(&mut self.bus);
        let stall = self.bus.take_stall_cycles();
        if stall > 0 {
            self.cpu.add_cycles(stall);
        }
        self.bus.tick(self.cpu.cycle_count());
        self.cpu.set_irq_line(self.bus.mikey.irq_line());
        if self.bus.mikey.take_sleep_request() {
            self.cpu.wait_for_irq();
        }

        if self.debugger.is_some() {
            self.debug_post_exec(consumed + stall);
            self.record_stepback();
            let pc = self.cpu.pc() as u16;
            let opcode = self.bus.peek(pc);
            if let Some(event) = self
                .debugger
                .as_mut()
                .and_then(|debugger| debugger.take_break(pc, opcode))
            {
                return Some(event);
            }
        }
        None
    }

    fn debug_pre_exec(&mut self) -> Option<BreakEvent> {
        self.debugger.as_ref()?;
        if self.resume_pending {
            // The hook already saw this instruction before the break.
            self.resume_pending = false;
            return None;
        }

        let pc = self.cpu.pc() as u16;
        let mut bytes = [0u8; 3];
        bytes[0] = self.bus.peek(pc);
        let len = wdc_65c02::op_size(bytes[0]);
        for (i, byte) in bytes.iter_mut().enumerate().take(len).skip(1) {
            *byte = self.bus.peek(pc.wrapping_add(i as u16));
        }
        let abs = self.bus.absolute_address(pc);
        let regs = self.cpu.registers();
        let cycle = self.cpu.cycle_count();
        let scanline = self.bus.mikey.current_scanline();

        let bus = &self.bus;
        let debugger = self.debugger.as_mut()?;
        debugger.process_instruction(pc, bytes, abs, &regs, cycle, scanline, |addr| {
            bus.absolute_address(addr)
        });
        let event = debugger.take_break(pc, bytes[0]);
        if event.is_some() {
            self.resume_pending = true;
        }
        event
    }

    fn debug_post_exec(&mut self, consumed: u64) {
        let regs = self.cpu.registers();
        let cycle = self.cpu.cycle_count();
        let scanline = self.bus.mikey.current_scanline();
        let Some(debugger) = self.debugger.as_mut() else {
            return;
        };

        for access in &self.bus.accesses {
            debugger.process_access(*access, &regs, cycle, scanline);
        }
        self.bus.accesses.clear();

        if let Some(entry) = self.cpu.take_irq_entry() {
            let bus = &self.bus;
            debugger.process_interrupt(entry, &regs, cycle, scanline, |addr| {
                bus.absolute_address(addr)
            });
        }

        if scanline != self.last_scanline {
            debugger.process_scanline(scanline);
            self.last_scanline = scanline;
        }
        debugger.process_ppu_cycles(consumed as u32);

        let halted = self.cpu.is_halted();
        if halted && !self.was_halted && debugger.config().break_on_stp {
            debugger.break_now(BreakSource::BreakOnStp);
        }
        self.was_halted = halted;
    }

    fn record_stepback(&mut self) {
        let clock = self.cpu.cycle_count();
        let mut planner = std::mem::take(&mut self.stepback);
        planner.record(clock, || self.save_state());
        self.stepback = planner;
    }

    fn finish_frame(&mut self) {
        self.frame_count += 1;

        let samples = self.bus.mikey.apu_mut().take_samples();
        for pair in samples.chunks_exact(2) {
            self.audio.push_stereo(pair[0], pair[1]);
        }

        // Input latches once per frame, at the point the real polling loop
        // would refresh it.
        self.bus
            .suzy
            .set_joystick(self.joypad.joystick_value(self.rotation));
        self.bus.suzy.set_switches(self.joypad.switches_value());

        if !self.bus.take_joypad_read() {
            self.lag_frames += 1;
        }

        if let Some(debugger) = self.debugger.as_mut() {
            debugger.end_frame();
        }
    }

    /// The last completed frame's pixels and geometry.
    #[must_use]
    pub fn frame(&self) -> FrameInfo<'_> {
        FrameInfo {
            pixels: self.bus.mikey.framebuffer(),
            width: atari_mikey::SCREEN_WIDTH as u32,
            height: atari_mikey::SCREEN_HEIGHT as u32,
            format: PixelFormat::Argb8888,
            frame_number: self.frame_count,
            rotation: self.rotation,
        }
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.mikey.framebuffer()
    }

    /// Audio accumulated during the last `run_frame` call.
    #[must_use]
    pub fn audio_buffer(&self) -> &SampleBuffer {
        &self.audio
    }

    #[must_use]
    pub fn model(&self) -> LynxModel {
        self.model
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames that finished without the game reading `JOYSTICK`.
    #[must_use]
    pub fn lag_frames(&self) -> u64 {
        self.lag_frames
    }

    #[must_use]
    pub fn master_clock(&self) -> MasterClock {
        self.clock
    }

    #[must_use]
    pub fn cpu(&self) -> &Wdc65c02 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Wdc65c02 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &LynxBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut LynxBus {
        &mut self.bus
    }

    pub fn press_button(&mut self, button: LynxButton) {
        self.joypad.set_button(button, true);
    }

    pub fn release_button(&mut self, button: LynxButton) {
        self.joypad.set_button(button, false);
    }

    pub fn release_all_buttons(&mut self) {
        self.joypad.release_all();
    }

    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.bus.peek(address)
    }

    pub fn peek_block(&self, start: u16, out: &mut [u8]) {
        self.bus.peek_block(start, out);
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        self.bus.poke(address, value);
    }

    // ---- Save states ----------------------------------------------------

    /// Serialize the full machine state.
    pub fn save_state(&mut self) -> Vec<u8> {
        let mut s = begin_save(ConsoleId::Lynx);
        self.serialize_console(&mut s);
        s.finish()
    }

    /// Restore a state produced by [`LynxConsole::save_state`].
    ///
    /// # Errors
    ///
    /// [`SaveStateError::InvalidFile`] when `data` is not a Lynx save
    /// state; [`SaveStateError::Partial`] when a component section is
    /// corrupt, in which case the pre-load state is restored.
    pub fn load_state(&mut self, data: Vec<u8>) -> Result<(), SaveStateError> {
        let mut s = begin_load(data, ConsoleId::Lynx)?;
        let backup = self.save_state();
        self.serialize_console(&mut s);
        if s.has_failed() {
            let section = s.failed_section().unwrap_or("state").to_string();
            if let Ok(mut rollback) = begin_load(backup, ConsoleId::Lynx) {
                self.serialize_console(&mut rollback);
            }
            log::warn!("lynx: load state failed in {section}, previous state restored");
            return Err(SaveStateError::Partial { section });
        }
        Ok(())
    }

    fn serialize_console(&mut self, s: &mut Serializer) {
        s.section(b"HEAD", |s| {
            let mut model = self.model as u8;
            let mut rotation = self.rotation as u8;
            // A state saved mid-frame carries its frame's cycle target so
            // the restored machine finishes that frame on the original
            // boundary. 0 = saved between frames.
            let mut frame_target = self.frame_target.unwrap_or(0);
            s.u8(&mut model);
            s.u8(&mut rotation);
            s.u64(&mut self.frame_count);
            s.u64(&mut self.lag_frames);
            s.u64(&mut frame_target);
            if !s.is_saving() {
                self.model = LynxModel::from_u8(model);
                self.rotation = Rotation::from(rotation);
                self.frame_target = (frame_target != 0).then_some(frame_target);
            }
        });
        s.section(b"CPU ", |s| self.cpu.serialize(s));
        s.section(b"MIKY", |s| self.bus.mikey.serialize(s));
        s.section(b"APU ", |s| self.bus.mikey.apu_mut().serialize(s));
        s.section(b"SUZY", |s| self.bus.suzy.serialize(s));
        s.section(b"CART", |s| self.bus.cart.serialize(s));
        s.section(b"EEPR", |s| self.bus.eeprom.serialize(s));
        s.section(b"MMAP", |s| self.bus.serialize(s));
        s.section(b"CTRL", |s| self.joypad.serialize(s));
        s.section(b"WRAM", |s| s.bytes(&mut self.bus.ram[..]));

        if !s.is_saving() {
            self.last_scanline = self.bus.mikey.current_scanline();
            self.was_halted = self.cpu.is_halted();
        }
    }

    // ---- Battery --------------------------------------------------------

    /// Load EEPROM contents from `store`. Missing or short data is not an
    /// error; carts without EEPROM ignore this entirely.
    pub fn load_battery(&mut self, store: &mut dyn BatteryStore) {
        if let Err(err) = self.bus.eeprom.load_battery(store) {
            log::warn!("lynx: battery load failed: {err}");
        }
    }

    /// Persist EEPROM contents to `store`.
    pub fn save_battery(&self, store: &mut dyn BatteryStore) {
        if let Err(err) = self.bus.eeprom.save_battery(store) {
            log::warn!("lynx: battery save failed: {err}");
        }
    }

    /// Power cycle. EEPROM contents ride through, like the physical part;
    /// an attached debugger stays attached.
    ///
    /// # Errors
    ///
    /// Propagates [`LynxConsole::new`] errors; the console is left
    /// untouched when that fails.
    pub fn reset(&mut self) -> Result<(), LoadRomError> {
        let mut eeprom_shim = emu_core::MemoryBatteryStore::new();
        self.save_battery(&mut eeprom_shim);

        let mut fresh = Self::new(&self.config)?;
        fresh.load_battery(&mut eeprom_shim);
        fresh.debugger = self.debugger.take();
        fresh.bus.set_recording(fresh.debugger.is_some());
        *self = fresh;
        Ok(())
    }

    // ---- Debugger -------------------------------------------------------

    /// Attach a debugger, or reconfigure the attached one.
    pub fn attach_debugger(&mut self, config: DebuggerConfig) {
        if let Some(debugger) = self.debugger.as_mut() {
            debugger.set_config(config);
        } else {
            self.debugger = Some(LynxDebugger::new(self.bus.cart.rom(), config));
        }
        self.bus.set_recording(true);
    }

    pub fn detach_debugger(&mut self) {
        self.debugger = None;
        self.bus.set_recording(false);
        self.stepback.clear();
        self.resume_pending = false;
    }

    #[must_use]
    pub fn debugger(&self) -> Option<&LynxDebugger> {
        self.debugger.as_ref()
    }

    pub fn debugger_mut(&mut self) -> Option<&mut LynxDebugger> {
        self.debugger.as_mut()
    }

    /// Replace the active breakpoint set. No-op without a debugger.
    pub fn set_breakpoints(&mut self, breakpoints: &[Breakpoint]) {
        if let Some(debugger) = self.debugger.as_mut() {
            debugger.set_breakpoints(breakpoints);
        }
    }

    /// Freeze or thaw an address range. Program writes to a frozen address
    /// are dropped, so reads keep returning the pinned contents. Works
    /// with or without a debugger attached.
    pub fn set_frozen_range(&mut self, range: RangeInclusive<u16>, frozen: bool) {
        self.bus.frozen.set_frozen(range, frozen);
    }

    /// Replace the active cheat set. Cheats overlay program reads only;
    /// memory itself is untouched.
    pub fn set_cheats(&mut self, cheats: &[Cheat]) {
        self.bus.cheats.set_cheats(cheats);
    }

    /// Arm a step request; the next `run_frame` call honors it.
    pub fn step(&mut self, kind: StepKind, count: u32) {
        if kind == StepKind::StepBack {
            self.step_back(StepBackKind::Instruction);
            return;
        }
        let pc = self.cpu.pc() as u16;
        let opcode = self.bus.peek(pc);
        let sp = 0x0100 | u16::from(self.cpu.registers().s);
        if let Some(debugger) = self.debugger.as_mut() {
            debugger.request_step(kind, count, pc, opcode, sp);
        }
    }

    /// Break before the next instruction.
    pub fn pause(&mut self) {
        if let Some(debugger) = self.debugger.as_mut() {
            debugger.pause();
        }
    }

    pub fn resume(&mut self) {
        if let Some(debugger) = self.debugger.as_mut() {
            debugger.resume();
        }
    }

    /// Rewind to an earlier point by restoring the nearest recorded
    /// snapshot and replaying forward. Returns false when no history
    /// reaches back far enough.
    pub fn step_back(&mut self, kind: StepBackKind) -> bool {
        let config = StepBackConfig {
            current_cycle: self.cpu.cycle_count(),
            cycles_per_scanline: CPU_CYCLES_PER_SCANLINE,
            cycles_per_frame: CPU_CYCLES_PER_FRAME,
        };
        let mut planner = std::mem::take(&mut self.stepback);
        let plan = planner
            .plan(kind, &config)
            .map(|plan| (plan.state.to_vec(), plan.target_clock));
        // Back in place before the replay, which re-records into it.
        self.stepback = planner;

        let Some((state, target)) = plan else {
            return false;
        };
        match self.load_state(state) {
            Ok(()) => {
                self.replay_until(target);
                self.resume_pending = false;
                true
            }
            Err(err) => {
                log::warn!("lynx: step back failed: {err}");
                false
            }
        }
    }

    /// Replay after a state restore, without debugger hooks. Snapshots are
    /// re-recorded along the way so repeated rewinds stay cheap.
    fn replay_until(&mut self, target: u64) {
        self.bus.set_recording(false);
        while self.cpu.cycle_count() < target {
            self.cpu.step(&mut self.bus);
            let stall = self.bus.take_stall_cycles();
            if stall > 0 {
                self.cpu.add_cycles(stall);
            }
            self.bus.tick(self.cpu.cycle_count());
            self.cpu.set_irq_line(self.bus.mikey.irq_line());
            if self.bus.mikey.take_sleep_request() {
                self.cpu.wait_for_irq();
            }
            self.record_stepback();
        }
        self.bus.set_recording(self.debugger.is_some());
        self.last_scanline = self.bus.mikey.current_scanline();
    }
}

fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix('$')) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for LynxConsole {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(addr) = path.strip_prefix("memory.") {
            return Some(Value::U8(self.bus.peek(parse_address(addr)?)));
        }
        let regs = self.cpu.registers();
        Some(match path {
            "cpu.a" => Value::U8(regs.a),
            "cpu.x" => Value::U8(regs.x),
            "cpu.y" => Value::U8(regs.y),
            "cpu.s" => Value::U8(regs.s),
            "cpu.p" => Value::U8(regs.p.0),
            "cpu.pc" => Value::U16(regs.pc),
            "cpu.cycles" => Value::U64(self.cpu.cycle_count()),
            "mikey.scanline" => Value::U16(self.bus.mikey.current_scanline()),
            "mikey.dispadr" => Value::U16(self.bus.mikey.display_address()),
            "mikey.irq_pending" => Value::U8(self.bus.mikey.irq_pending()),
            "suzy.joystick" => Value::U8(self.bus.suzy.joystick()),
            "suzy.switches" => Value::U8(self.bus.suzy.switches()),
            "frame_count" => Value::U64(self.frame_count),
            "lag_frames" => Value::U64(self.lag_frames),
            "master_clock" => {
                Value::U64(self.clock.ticks_for_cpu_cycles(self.cpu.cycle_count()).get())
            }
            _ => {
                // Component prefixes pass through to the chip's own query
                // vocabulary, e.g. `mikey.timer0.count` or `cpu.flags.z`.
                if let Some(reg) = path.strip_prefix("cpu.") {
                    return self.cpu.query(reg);
                }
                if let Some(reg) = path.strip_prefix("mikey.") {
                    return self.bus.mikey.query(reg);
                }
                if let Some(reg) = path.strip_prefix("suzy.") {
                    return self.bus.suzy.query(reg);
                }
                return None;
            }
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.a",
            "cpu.x",
            "cpu.y",
            "cpu.s",
            "cpu.p",
            "cpu.pc",
            "cpu.cycles",
            "mikey.scanline",
            "mikey.dispadr",
            "mikey.irq_pending",
            "suzy.joystick",
            "suzy.switches",
            "frame_count",
            "lag_frames",
            "master_clock",
            "memory.<address>",
        ]
    }
}
