// +------+-----------+----------------------------------------------------+
// | Port | Direction | Description                                        |
// +------+-----------+----------------------------------------------------+
// | 0x00 | IN        | Keypad matrix (PA0-PA6), tape in on PA7            |
// | 0x01 | OUT       | Seven-segment data                                 |
// | 0x02 | OUT       | Digit select (PC0-PC5), tape out / speaker on PC7  |
// | 0xCA | OUT       | MTP-201 printer control (motor + thermal head)     |
// | 0xCB | IN        | MTP-201 printer status (TG, HOME)                  |
// +------+-----------+----------------------------------------------------+
use std::fmt;

use serde::{Deserialize, Serialize};

/// An 8-bit I/O port address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port(pub u8);

impl Port {
    pub const KEYPAD: Port = Port(0x00);
    pub const SEGMENT_DATA: Port = Port(0x01);
    pub const DIGIT_SELECT: Port = Port(0x02);
    pub const PRINTER_CONTROL: Port = Port(0xCA);
    pub const PRINTER_STATUS: Port = Port(0xCB);

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u16> for Port {
    /// The Z80 puts a 16-bit address on the bus for `IN`/`OUT`; only the low
    /// byte selects the device.
    fn from(address: u16) -> Self {
        Port((address & 0xFF) as u8)
    }
}

impl From<u8> for Port {
    fn from(port: u8) -> Self {
        Port(port)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

/// The digit-select strobe latched from port 0x02, low six bits only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitSelect(u8);

impl DigitSelect {
    pub const MASK: u8 = 0x3F;

    pub fn new(value: u8) -> Self {
        DigitSelect(value & Self::MASK)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit of `pattern` is set in the strobe.
    pub fn matches(self, pattern: u8) -> bool {
        (self.0 & pattern) == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_from_address_uses_low_byte() {
        assert_eq!(Port::from(0x12CBu16), Port::PRINTER_STATUS);
        assert_eq!(Port::from(0x0001u16), Port::SEGMENT_DATA);
    }

    #[test]
    fn test_digit_select_masks_high_bits() {
        let select = DigitSelect::new(0xFF);
        assert_eq!(select.bits(), 0x3F);
        assert!(select.matches(0x3E));

        let select = DigitSelect::new(0x81);
        assert_eq!(select.bits(), 0x01);
        assert!(select.matches(0x01));
        assert!(!select.matches(0x3E));
    }
}
