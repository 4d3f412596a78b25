//! Types a HEX program in through the keypad, the way a user would with the
//! monitor's ADDR / DATA / + keys, then starts it.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::{hex, keypad::Keypad};

/// Where typed-in programs are started from.
pub const RUN_ADDRESS: u16 = 0x1800;

const HEX_KEYS: [&str; 16] = [
    "HEX_0", "HEX_1", "HEX_2", "HEX_3", "HEX_4", "HEX_5", "HEX_6", "HEX_7", "HEX_8", "HEX_9",
    "HEX_A", "HEX_B", "HEX_C", "HEX_D", "HEX_E", "HEX_F",
];

fn push_nibbles(keys: &mut Vec<&'static str>, value: u16, digits: u32) {
    for i in (0..digits).rev() {
        keys.push(HEX_KEYS[((value >> (i * 4)) & 0xF) as usize]);
    }
}

/// Key labels that enter every data record of `text` and then run the
/// program from [`RUN_ADDRESS`].
pub fn keystrokes(text: &str) -> Vec<&'static str> {
    let mut keys = Vec::new();

    for record in hex::parse_lenient(text).iter().filter(|r| r.is_data()) {
        keys.push("ADDR");
        push_nibbles(&mut keys, record.address, 4);
        keys.push("DATA");
        for byte in &record.data {
            push_nibbles(&mut keys, *byte as u16, 2);
            keys.push("+");
        }
    }

    keys.push("ADDR");
    push_nibbles(&mut keys, RUN_ADDRESS, 4);
    keys.push("GO");
    keys
}

/// Feeds a keystroke script into the keypad, one key per interval of
/// emulated time.
#[derive(Debug, Clone)]
pub struct Typist {
    keys: VecDeque<&'static str>,
    interval: u64,
    next_at: u64,
}

impl Typist {
    pub fn new(keys: Vec<&'static str>, interval: u64, start: u64) -> Self {
        info!("[MACHINE] Typing {} keys", keys.len());
        Typist {
            keys: keys.into(),
            interval,
            next_at: start,
        }
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }

    pub fn is_done(&self) -> bool {
        self.keys.is_empty()
    }

    /// Presses the next key if its time has come.
    pub fn poll(&mut self, now: u64, keypad: &mut Keypad) -> Option<&'static str> {
        if now < self.next_at {
            return None;
        }

        let key = self.keys.pop_front()?;
        debug!("[MACHINE] Typing {}", key);
        keypad.press_label(key);
        self.next_at = now + self.interval;
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn test_keystrokes() {
        let keys = keystrokes(":02180000AB0538\n:00000001FF\n");
        assert_eq!(
            keys,
            vec![
                "ADDR", "HEX_1", "HEX_8", "HEX_0", "HEX_0", "DATA", "HEX_A", "HEX_B", "+",
                "HEX_0", "HEX_5", "+", "ADDR", "HEX_1", "HEX_8", "HEX_0", "HEX_0", "GO"
            ]
        );
    }

    #[test]
    fn test_typist_spacing() {
        let mut keypad = Keypad::new(Rc::new(RefCell::new(VecDeque::new())));
        let mut typist = Typist::new(vec!["HEX_1", "GO"], 100, 50);

        assert_eq!(typist.poll(0, &mut keypad), None);
        assert_eq!(typist.poll(50, &mut keypad), Some("HEX_1"));
        assert!(keypad.is_pressed());
        assert_eq!(typist.poll(149, &mut keypad), None);
        assert_eq!(typist.poll(150, &mut keypad), Some("GO"));
        assert!(typist.is_done());
        assert_eq!(typist.poll(1000, &mut keypad), None);
    }
}
