use std::{cell::RefCell, collections::HashMap, collections::VecDeque, rc::Rc};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{machine::Message, port::DigitSelect};

pub const ROWS: u8 = 4;
pub const COLS: u8 = 9;

pub const RESET_KEY: usize = 0;
pub const MONI_KEY: usize = 9;
pub const INTR_KEY: usize = 18;

/// Matching scans a click stays down for before it releases itself.
pub const DEFAULT_HOLD_SCANS: i32 = 4;

/// One physical key of the 4x9 keypad.
///
/// `pc` is the digit-select pattern that must be strobed for the key's column
/// to be driven; `pa` is what the CPU then reads back on port A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyMapEntry {
    pub rowcol: u8,
    pub pc: u8,
    pub pa: u8,
    pub scan_id: &'static str,
    pub scan_code: u8,
    pub label: &'static str,
    pub x: u16,
    pub y: u16,
}

const fn key(
    rowcol: u8,
    pc: u8,
    pa: u8,
    scan_id: &'static str,
    scan_code: u8,
    label: &'static str,
    x: u16,
    y: u16,
) -> KeyMapEntry {
    KeyMapEntry {
        rowcol,
        pc,
        pa,
        scan_id,
        scan_code,
        label,
        x,
        y,
    }
}

#[rustfmt::skip]
pub static KEY_MAP: [KeyMapEntry; 36] = [
    key(0,  0x3E, 0x1F, "",    0x00, "RESET",    32,  33),
    key(1,  0x1F, 0x1F, "K23", 0x1C, "MOVE",     287, 229),
    key(2,  0x1F, 0x2F, "K22", 0x16, "INS",      159, 32),
    key(3,  0x1F, 0x3E, "K1B", 0x1E, "SBR",      223, 32),
    key(4,  0x2F, 0x3D, "K19", 0x18, "PC",       287, 33),
    key(5,  0x37, 0x37, "K15", 0x0C, "HEX_C",    351, 33),
    key(6,  0x3B, 0x37, "KF",  0x0D, "HEX_D",    415, 33),
    key(7,  0x3D, 0x37, "K9",  0x0E, "HEX_E",    478, 33),
    key(8,  0x3E, 0x37, "K3",  0x0F, "HEX_F",    542, 33),
    key(9,  0x01, 0x01, "",    0x00, "MONI",     32,  98),
    key(10, 0x2F, 0x1F, "K1D", 0x1D, "RELA",     96,  98),
    key(11, 0x2F, 0x2F, "K1C", 0x17, "DEL",      159, 98),
    key(12, 0x2F, 0x3E, "K18", 0x1A, "CBR",      223, 98),
    key(13, 0x2F, 0x3B, "K1A", 0x1B, "REG",      287, 98),
    key(14, 0x37, 0x3B, "K14", 0x08, "HEX_8",    351, 98),
    key(15, 0x3B, 0x3B, "K0E", 0x09, "HEX_9",    415, 98),
    key(16, 0x3D, 0x3B, "K8",  0x0A, "HEX_A",    478, 98),
    key(17, 0x3E, 0x3B, "K2",  0x0B, "HEX_B",    542, 98),
    key(18, 0x01, 0x01, "",    0x00, "INTR",     32,  164),
    key(19, 0x37, 0x1F, "K17", 0x1E, "TAPEWR",   96,  164),
    key(20, 0x3B, 0x2F, "K10", 0x13, "STEP",     159, 164),
    key(21, 0x1F, 0x3D, "K1F", 0x11, "-",        223, 164),
    key(22, 0x1F, 0x3B, "K20", 0x14, "DATA",     287, 164),
    key(23, 0x37, 0x3D, "K13", 0x04, "HEX_4",    351, 164),
    key(24, 0x3B, 0x3D, "KD",  0x05, "HEX_5",    415, 164),
    key(25, 0x3D, 0x3D, "K7",  0x06, "HEX_6",    475, 164),
    key(26, 0x3E, 0x3D, "K1",  0x07, "HEX_7",    542, 164),
    key(27, 0x01, 0xBF, "",    0x00, "USER KEY", 31,  229),
    key(28, 0x3B, 0x1F, "K11", 0x1F, "TAPERD",   96,  229),
    key(29, 0x37, 0x2F, "K16", 0x12, "GO",       159, 229),
    key(30, 0x1F, 0x37, "K21", 0x10, "+",        223, 229),
    key(31, 0x2F, 0x37, "K1B", 0x19, "ADDR",     287, 229),
    key(32, 0x37, 0x3E, "K12", 0x00, "HEX_0",    351, 229),
    key(33, 0x3B, 0x3E, "K0C", 0x01, "HEX_1",    415, 229),
    key(34, 0x3D, 0x3E, "K6",  0x02, "HEX_2",    475, 229),
    key(35, 0x3E, 0x3E, "K0",  0x03, "HEX_3",    542, 229),
];

static KEYS_BY_LABEL: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    KEY_MAP
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.label, i))
        .collect()
});

/// Index into [`KEY_MAP`] of the key with the given legend.
pub fn key_index(label: &str) -> Option<usize> {
    KEYS_BY_LABEL.get(label).copied()
}

/// The keypad as seen through the 8255: a single latched click that is
/// reported whenever the monitor strobes the matching digit-select pattern.
#[derive(Debug)]
pub struct Keypad {
    queue: Rc<RefCell<VecDeque<Message>>>,
    pressed: bool,
    row: u8,
    col: u8,
    hold: i32,
    hold_scans: i32,
}

impl Keypad {
    pub fn new(queue: Rc<RefCell<VecDeque<Message>>>) -> Self {
        Self::with_hold_scans(queue, DEFAULT_HOLD_SCANS)
    }

    pub fn with_hold_scans(queue: Rc<RefCell<VecDeque<Message>>>, hold_scans: i32) -> Self {
        Keypad {
            queue,
            pressed: false,
            row: 0,
            col: 0,
            hold: hold_scans,
            hold_scans,
        }
    }

    pub fn reset(&mut self) {
        self.pressed = false;
        self.hold = self.hold_scans;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Latches a click on the keypad grid. Out-of-grid clicks are ignored.
    pub fn record_click(&mut self, row: u8, col: u8) {
        if row >= ROWS || col >= COLS {
            warn!("[KEYPAD] Click outside the keypad at row {} col {}", row, col);
            return;
        }

        self.pressed = true;
        self.row = row;
        self.col = col;
        self.hold = self.hold_scans;
        debug!(
            "[KEYPAD] Key {} pressed",
            KEY_MAP[self.key_location()].label
        );
    }

    /// Presses a key by its legend; returns false if no key has that label.
    pub fn press_label(&mut self, label: &str) -> bool {
        match key_index(label) {
            Some(index) => {
                self.record_click(index as u8 / COLS, index as u8 % COLS);
                true
            }
            None => {
                warn!("[KEYPAD] Unknown key {:?}", label);
                false
            }
        }
    }

    fn key_location(&self) -> usize {
        self.row as usize * COLS as usize + self.col as usize
    }

    pub fn read(&mut self, select: DigitSelect) -> u8 {
        if !self.pressed {
            return 0xFF;
        }

        let key_loc = self.key_location();
        let entry = &KEY_MAP[key_loc];
        trace!(
            "[KEYPAD] {} pc {:02X} pa {:02X} select {:02X} hold {}",
            entry.label,
            entry.pc,
            entry.pa,
            select.bits(),
            self.hold
        );

        if !select.matches(entry.pc) {
            return 0xFF;
        }

        let released = self.hold < 0;
        self.hold -= 1;
        if released {
            self.pressed = false;
        }

        match key_loc {
            RESET_KEY => {
                self.queue.borrow_mut().push_back(Message::ResetPc);
                0xFF
            }
            INTR_KEY => {
                self.queue
                    .borrow_mut()
                    .push_back(Message::MaskableInterrupt);
                0xFF
            }
            MONI_KEY => {
                self.queue
                    .borrow_mut()
                    .push_back(Message::NonMaskableInterrupt);
                0xFF
            }
            _ => entry.pa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypad() -> (Keypad, Rc<RefCell<VecDeque<Message>>>) {
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        (Keypad::new(queue.clone()), queue)
    }

    #[test]
    fn test_table_is_indexed_by_rowcol() {
        for (i, entry) in KEY_MAP.iter().enumerate() {
            assert_eq!(entry.rowcol as usize, i);
        }
        assert_eq!(key_index("GO"), Some(29));
        assert_eq!(key_index("HEX_0"), Some(32));
        assert_eq!(key_index("NOPE"), None);
    }

    #[test]
    fn test_idle_bus_reads_ff() {
        let (mut keypad, _) = keypad();
        assert_eq!(keypad.read(DigitSelect::new(0x3F)), 0xFF);
    }

    #[test]
    fn test_every_key_returns_pa_only_when_strobed() {
        for (i, entry) in KEY_MAP.iter().enumerate() {
            if [RESET_KEY, MONI_KEY, INTR_KEY].contains(&i) {
                continue;
            }
            let (mut keypad, queue) = keypad();
            keypad.record_click(i as u8 / COLS, i as u8 % COLS);

            assert_eq!(keypad.read(DigitSelect::new(entry.pc)), entry.pa, "{}", entry.label);

            // a strobe missing one of the required lines never matches
            let clear = DigitSelect::new(entry.pc & (entry.pc - 1));
            assert_eq!(keypad.read(clear), 0xFF, "{}", entry.label);
            assert!(queue.borrow().is_empty());
        }
    }

    #[test]
    fn test_click_auto_releases_after_hold() {
        let (mut keypad, _) = keypad();
        assert!(keypad.press_label("HEX_5"));
        let select = DigitSelect::new(0x3B);

        // hold of 4 counts down through 4, 3, 2, 1, 0 and releases on -1
        for _ in 0..6 {
            assert_eq!(keypad.read(select), 0x3D);
        }
        assert!(!keypad.is_pressed());
        assert_eq!(keypad.read(select), 0xFF);
    }

    #[test]
    fn test_unmatched_scans_do_not_count_down() {
        let (mut keypad, _) = keypad();
        keypad.press_label("GO");
        for _ in 0..20 {
            assert_eq!(keypad.read(DigitSelect::new(0x01)), 0xFF);
        }
        assert!(keypad.is_pressed());
    }

    #[test]
    fn test_new_click_rearms_hold() {
        let (mut keypad, _) = keypad();
        keypad.press_label("HEX_1");
        for _ in 0..6 {
            keypad.read(DigitSelect::new(0x3B));
        }
        assert!(!keypad.is_pressed());

        keypad.press_label("HEX_1");
        for _ in 0..6 {
            assert_eq!(keypad.read(DigitSelect::new(0x3B)), 0x3E);
        }
    }

    #[test]
    fn test_special_keys_queue_cpu_requests() {
        let (mut keypad, queue) = keypad();

        keypad.press_label("RESET");
        assert_eq!(keypad.read(DigitSelect::new(0x3E)), 0xFF);
        keypad.press_label("INTR");
        assert_eq!(keypad.read(DigitSelect::new(0x01)), 0xFF);
        keypad.press_label("MONI");
        assert_eq!(keypad.read(DigitSelect::new(0x01)), 0xFF);

        let queue: Vec<_> = queue.borrow_mut().drain(..).collect();
        assert_eq!(
            queue,
            vec![
                Message::ResetPc,
                Message::MaskableInterrupt,
                Message::NonMaskableInterrupt
            ]
        );
    }

    #[test]
    fn test_click_outside_grid_is_ignored() {
        let (mut keypad, _) = keypad();
        keypad.record_click(4, 0);
        keypad.record_click(0, 9);
        assert!(!keypad.is_pressed());
    }
}
