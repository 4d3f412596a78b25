use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    automation::{self, Typist},
    bus::Bus,
    clock::Clock,
    config::MachineConfig,
    cpu::{CpuCore, CpuState, Interrupt},
    io::Io,
};

/// Requests devices make of the CPU. They are applied between instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    ResetPc,
    MaskableInterrupt,
    NonMaskableInterrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Slice budget used up; call again after `slice_ms`.
    Yield,
    Breakpoint(u16),
    LimitReached,
    PoweredOff,
}

pub struct Machine<C: CpuCore> {
    pub cpu: C,
    pub bus: Rc<RefCell<Bus>>,
    pub queue: Rc<RefCell<VecDeque<Message>>>,
    pub clock: Clock,
    io: Io,
    config: MachineConfig,
    breakpoint: u16,
    powered: bool,
    remaining: Option<u64>,
    typist: Option<Typist>,
}

impl<C: CpuCore> Machine<C> {
    pub fn new(cpu: C, config: MachineConfig) -> Self {
        info!("[MACHINE] Initializing at {} Hz", config.clock_hz);
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        let bus = Rc::new(RefCell::new(Bus::new(&config, queue.clone())));
        let io = Io::new(bus.clone());

        Self {
            cpu,
            bus,
            queue,
            clock: Clock::new(config.clock_hz, config.slice_cycles),
            io,
            breakpoint: config.breakpoint,
            powered: true,
            remaining: None,
            typist: None,
            config,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Loads every ROM image listed in the configuration.
    pub fn load_roms(&mut self) -> anyhow::Result<()> {
        let mut bus = self.bus.borrow_mut();
        for rom in &self.config.roms {
            bus.memory.load_hex_rom_file(&rom.path, rom.base, rom.protect)?;
        }
        Ok(())
    }

    pub fn load_hex(&mut self, text: &str, base: u16, protect: bool) -> usize {
        self.bus.borrow_mut().memory.load_hex_rom(text, base, protect)
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn registers(&self) -> String {
        self.cpu.state().to_string()
    }

    pub fn cycles(&self) -> u64 {
        self.clock.total_cycles()
    }

    pub fn memory_dump(&self, start: u16, end: u16) -> String {
        self.bus.borrow().memory.dump(start, end)
    }

    pub fn set_breakpoint(&mut self, address: u16) {
        self.breakpoint = address;
    }

    pub fn breakpoint(&self) -> u16 {
        self.breakpoint
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn power_off(&mut self) {
        info!("[MACHINE] Power off");
        self.powered = false;
    }

    pub fn power_on(&mut self) {
        info!("[MACHINE] Power on");
        self.powered = true;
    }

    pub fn reset(&mut self) {
        self.cpu.set_state(CpuState::default());
        self.bus.borrow_mut().reset();
        self.queue.borrow_mut().clear();
        self.clock.reset();
        self.remaining = None;
        self.typist = None;
    }

    pub fn press_key(&mut self, label: &str) -> bool {
        self.bus.borrow_mut().keypad.press_label(label)
    }

    /// Starts typing `text` into memory through the keypad.
    pub fn type_program(&mut self, text: &str) {
        let interval = self.clock.cycles_for_ms(self.config.key_interval_ms);
        self.typist = Some(Typist::new(
            automation::keystrokes(text),
            interval,
            self.clock.total_cycles(),
        ));
    }

    pub fn is_typing(&self) -> bool {
        self.typist.is_some()
    }

    /// Executes a single instruction and returns its T-states.
    pub fn step(&mut self) -> u32 {
        if !self.powered {
            return 0;
        }

        let now = self.clock.total_cycles();
        {
            let mut bus = self.bus.borrow_mut();
            bus.sync_cpu_state(self.cpu.state());
            bus.set_t_state(now);

            let typed_out = match self.typist.as_mut() {
                Some(typist) => {
                    typist.poll(now, &mut bus.keypad);
                    typist.is_done()
                }
                None => false,
            };
            if typed_out {
                self.typist = None;
            }
        }

        let cycles = self.cpu.run_instruction(&mut self.io);
        self.clock.tick(cycles);
        self.process_messages();
        cycles
    }

    fn process_messages(&mut self) {
        loop {
            let Some(message) = self.queue.borrow_mut().pop_front() else {
                break;
            };

            debug!("[MACHINE] {:?} at PC {:04X}", message, self.cpu.pc());
            match message {
                Message::ResetPc => {
                    let mut state = self.cpu.state();
                    state.pc = 0;
                    self.cpu.set_state(state);
                }
                Message::MaskableInterrupt => {
                    let mut state = self.cpu.state();
                    state.iff1 = true;
                    self.cpu.set_state(state);
                    self.cpu.interrupt(Interrupt::Maskable, 0);
                }
                Message::NonMaskableInterrupt => {
                    self.cpu.interrupt(Interrupt::NonMaskable, 0);
                }
            }
        }
    }

    /// Runs `n` instructions, or until the breakpoint or power off.
    pub fn go(&mut self, n: u64) {
        self.remaining = Some(n);
    }

    /// Runs with no instruction limit.
    pub fn run(&mut self) {
        self.remaining = None;
    }

    /// Executes until the slice budget is spent or something stops the run.
    pub fn run_slice(&mut self) -> RunOutcome {
        self.clock.start_slice();

        loop {
            if !self.powered {
                return RunOutcome::PoweredOff;
            }

            // the instruction at the breakpoint is never executed
            let pc = self.cpu.pc();
            if pc == self.breakpoint {
                info!("[MACHINE] Breakpoint at {:04X}", pc);
                return RunOutcome::Breakpoint(pc);
            }

            if self.remaining == Some(0) {
                self.remaining = None;
                return RunOutcome::LimitReached;
            }

            self.step();
            if let Some(n) = self.remaining.as_mut() {
                *n -= 1;
            }

            if self.clock.slice_expired() {
                return RunOutcome::Yield;
            }
        }
    }

    /// Runs slices back to back until the run stops or `max_slices` have
    /// gone by.
    pub fn run_slices(&mut self, max_slices: usize) -> RunOutcome {
        let mut outcome = RunOutcome::Yield;
        for _ in 0..max_slices {
            outcome = self.run_slice();
            if outcome != RunOutcome::Yield {
                break;
            }
        }
        outcome
    }
}
