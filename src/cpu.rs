use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::FormatError, utils::decimal_to_hex};

/// Callbacks a Z80 core makes onto the rest of the machine.
pub trait Z80Io {
    fn read_byte(&self, address: u16) -> u8;
    fn write_byte(&mut self, address: u16, value: u8);
    fn port_in(&self, port: u16) -> u8;
    fn port_out(&mut self, port: u16, value: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interrupt {
    Maskable,
    NonMaskable,
}

/// Register file snapshot exchanged with the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub a_prime: u8,
    pub f_prime: u8,
    pub b_prime: u8,
    pub c_prime: u8,
    pub d_prime: u8,
    pub e_prime: u8,
    pub h_prime: u8,
    pub l_prime: u8,
    pub ix: u16,
    pub iy: u16,
    pub i: u8,
    pub r: u8,
    pub sp: u16,
    pub pc: u16,
    pub iff1: bool,
    pub iff2: bool,
    pub halted: bool,
}

impl CpuState {
    pub fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    /// `(label, value)` pairs in the order the monitor lists them.
    pub fn formatted(&self) -> Result<Vec<(&'static str, String)>, FormatError> {
        let registers: [(&'static str, u16, u32); 20] = [
            ("A", self.a as u16, 1),
            ("B", self.b as u16, 1),
            ("C", self.c as u16, 1),
            ("D", self.d as u16, 1),
            ("E", self.e as u16, 1),
            ("H", self.h as u16, 1),
            ("L", self.l as u16, 1),
            ("A'", self.a_prime as u16, 1),
            ("B'", self.b_prime as u16, 1),
            ("C'", self.c_prime as u16, 1),
            ("D'", self.d_prime as u16, 1),
            ("E'", self.e_prime as u16, 1),
            ("H'", self.h_prime as u16, 1),
            ("L'", self.l_prime as u16, 1),
            ("IX", self.ix, 2),
            ("IY", self.iy, 2),
            ("I", self.i as u16, 1),
            ("R", self.r as u16, 1),
            ("SP", self.sp, 2),
            ("PC", self.pc, 2),
        ];

        registers
            .iter()
            .map(|(label, value, bytes)| Ok((*label, decimal_to_hex(*value as i64, *bytes)?)))
            .collect()
    }
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registers = self.formatted().map_err(|_| fmt::Error)?;
        let line: Vec<String> = registers
            .iter()
            .map(|(label, value)| format!("{}:{}", label, value))
            .collect();
        write!(f, "{}", line.join(" "))
    }
}

/// A Z80 instruction-level core. The machine drives it one instruction at a
/// time and hands it the bus for that instruction.
pub trait CpuCore {
    fn state(&self) -> CpuState;
    fn set_state(&mut self, state: CpuState);

    /// Executes one instruction and returns the T-states it took.
    fn run_instruction(&mut self, io: &mut dyn Z80Io) -> u32;

    fn interrupt(&mut self, kind: Interrupt, data: u8);

    fn pc(&self) -> u16 {
        self.state().pc
    }
}
