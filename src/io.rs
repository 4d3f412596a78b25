use std::{cell::RefCell, rc::Rc};

use crate::{bus::Bus, cpu::Z80Io, port::Port};

/// What the CPU core sees of the machine. Port accesses are stamped with the
/// T-state the machine latched on the bus before the instruction started.
pub struct Io {
    pub bus: Rc<RefCell<Bus>>,
}

impl Io {
    pub fn new(bus: Rc<RefCell<Bus>>) -> Self {
        Io { bus }
    }
}

impl Z80Io for Io {
    fn read_byte(&self, address: u16) -> u8 {
        self.bus.borrow().read_byte(address)
    }

    fn write_byte(&mut self, address: u16, value: u8) {
        self.bus.borrow_mut().write_byte(address, value)
    }

    fn port_in(&self, port: u16) -> u8 {
        let mut bus = self.bus.borrow_mut();
        let t = bus.t_state();
        bus.input(Port::from(port), t)
    }

    fn port_out(&mut self, port: u16, value: u8) {
        let mut bus = self.bus.borrow_mut();
        let t = bus.t_state();
        bus.output(Port::from(port), value, t)
    }
}
