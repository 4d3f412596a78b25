use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use derivative::Derivative;
use tracing::{trace, warn};

use crate::{
    config::MachineConfig,
    cpu::CpuState,
    display::Display,
    keypad::Keypad,
    machine::Message,
    memory::Memory,
    port::Port,
    printer::Printer,
    sound::Speaker,
    tape::{Tape, TapeTiming},
};

/// Everything on the far side of the CPU: memory and the port-mapped
/// devices. Every `IN`/`OUT` is routed here by port number.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Bus {
    pub memory: Memory,
    pub display: Display,
    pub keypad: Keypad,
    pub tape: Tape,
    pub printer: Printer,
    pub speaker: Speaker,

    // Registers of the instruction being executed, for the tone trigger.
    #[derivative(Debug = "ignore")]
    cpu_view: CpuState,
    t_state: u64,
}

impl Bus {
    pub fn new(config: &MachineConfig, queue: Rc<RefCell<VecDeque<Message>>>) -> Self {
        Self {
            memory: Memory::new(config.ram_window.clone()),
            display: Display::new(),
            keypad: Keypad::with_hold_scans(queue, config.key_hold_scans),
            tape: Tape::new(TapeTiming::new(config.clock_hz, config.sample_rate)),
            printer: Printer::new(config.printer.clone()),
            speaker: Speaker::new(config.volume),
            cpu_view: CpuState::default(),
            t_state: 0,
        }
    }

    pub fn reset(&mut self) {
        self.display.reset();
        self.keypad.reset();
        self.printer.reset();
        self.tape.rewind();
        self.t_state = 0;
    }

    pub fn sync_cpu_state(&mut self, state: CpuState) {
        self.cpu_view = state;
    }

    pub fn set_t_state(&mut self, t: u64) {
        self.t_state = t;
    }

    pub fn t_state(&self) -> u64 {
        self.t_state
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        self.memory.read_byte(address)
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        self.memory.write_byte(address, value)
    }

    pub fn input(&mut self, port: Port, t: u64) -> u8 {
        let value = match port {
            Port::KEYPAD => {
                let keys = self.keypad.read(self.display.digit_select());
                match self.tape.read_bit(t) {
                    0xFF => keys,
                    level => (keys & 0x7F) | level,
                }
            }
            Port::PRINTER_STATUS if self.printer.is_enabled() => self.printer.read_status(),
            Port::PRINTER_STATUS => self.keypad.read(self.display.digit_select()),
            _ => {
                warn!("[BUS] Read from unmapped port {}", port);
                0xFF
            }
        };

        trace!("[BUS] IN {} -> {:02X} at {}", port, value, t);
        value
    }

    pub fn output(&mut self, port: Port, value: u8, t: u64) {
        trace!("[BUS] OUT {} <- {:02X} at {}", port, value, t);

        match port {
            Port::SEGMENT_DATA => self.display.write_segments(value),
            Port::DIGIT_SELECT => {
                self.speaker.strobe(value, &self.cpu_view);
                if self.tape.is_recording() {
                    self.tape.record_edge(value, t);
                }
                self.display.select_digit(value);
            }
            Port::PRINTER_CONTROL if self.printer.is_enabled() => {
                self.printer.write_control(value)
            }
            _ => warn!("[BUS] Write to unmapped port {} value {:02X}", port, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplaySlot;

    fn bus() -> (Bus, Rc<RefCell<VecDeque<Message>>>) {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        (Bus::new(&MachineConfig::default(), queue.clone()), queue)
    }

    #[test]
    fn test_unmapped_ports() {
        let (mut bus, _) = bus();
        assert_eq!(bus.input(Port(0x42), 0), 0xFF);
        assert_eq!(bus.input(Port::SEGMENT_DATA, 0), 0xFF);
        bus.output(Port(0x42), 0x12, 0);
        bus.output(Port::PRINTER_STATUS, 0x12, 0);
    }

    #[test]
    fn test_display_routing() {
        let (mut bus, _) = bus();
        bus.output(Port::DIGIT_SELECT, 0x04, 0);
        bus.output(Port::SEGMENT_DATA, 0x30, 0);
        assert_eq!(bus.display.glyph(DisplaySlot::Addr0).to_char(), '1');
    }

    #[test]
    fn test_keypad_uses_latched_digit_select() {
        let (mut bus, _) = bus();
        bus.keypad.press_label("HEX_A");
        bus.output(Port::DIGIT_SELECT, 0x01, 0);
        assert_eq!(bus.input(Port::KEYPAD, 0), 0xFF);
        bus.output(Port::DIGIT_SELECT, 0x3D, 0);
        assert_eq!(bus.input(Port::KEYPAD, 0), 0x3B);
    }

    #[test]
    fn test_tape_in_on_bit_7() {
        let (mut bus, _) = bus();
        bus.tape.load_bytes(&[0x00]);
        assert_eq!(bus.input(Port::KEYPAD, 100), 0xFF);
        assert_eq!(bus.input(Port::KEYPAD, 100 + 448), 0x7F);
    }

    #[test]
    fn test_tape_out_only_while_recording() {
        let (mut bus, _) = bus();
        bus.output(Port::DIGIT_SELECT, 0x80, 10);
        assert!(bus.tape.edges().is_empty());

        bus.tape.start_recording();
        bus.output(Port::DIGIT_SELECT, 0x80, 20);
        bus.output(Port::DIGIT_SELECT, 0x81, 30);
        bus.output(Port::DIGIT_SELECT, 0x01, 40);
        assert_eq!(bus.tape.edges().len(), 2);
    }

    #[test]
    fn test_printer_status_falls_back_to_keypad() {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        let mut config = MachineConfig::default();
        config.printer.enabled = false;
        let mut bus = Bus::new(&config, queue);

        bus.keypad.press_label("GO");
        bus.output(Port::DIGIT_SELECT, 0x37, 0);
        assert_eq!(bus.input(Port::PRINTER_STATUS, 0), 0x2F);

        bus.output(Port::PRINTER_CONTROL, 0x80, 0);
        assert!(!bus.printer.is_motor_on());
    }

    #[test]
    fn test_beep_uses_synced_registers() {
        let (mut bus, _) = bus();
        bus.output(Port::DIGIT_SELECT, 0x80, 0);
        assert_eq!(bus.speaker.beeps(), 0);

        bus.sync_cpu_state(CpuState {
            c: 0x20,
            l: 0x5E,
            ..Default::default()
        });
        bus.output(Port::DIGIT_SELECT, 0x80, 0);
        assert_eq!(bus.speaker.beeps(), 1);
    }

    #[test]
    fn test_special_keys_reach_the_queue() {
        let (mut bus, queue) = bus();
        bus.keypad.press_label("MONI");
        bus.output(Port::DIGIT_SELECT, 0x01, 0);
        bus.input(Port::KEYPAD, 0);
        assert_eq!(queue.borrow().front(), Some(&Message::NonMaskableInterrupt));
    }
}
