use derivative::Derivative;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub const TG_BIT: u8 = 0x01;
pub const HOME_BIT: u8 = 0x02;
pub const MOTOR_BIT: u8 = 0x80;
pub const THERMAL_MASK: u8 = 0x7F;

/// Rows of paper kept clear at the bottom before it wraps.
const PAPER_WRAP_MARGIN: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub enabled: bool,
    /// Status polls with the motor running and no control write before the
    /// mechanism stops by itself.
    pub watchdog: u32,
    pub tg_phase_width: u32,
    pub head_bits: u32,
    pub line_spacing: u32,
    pub top_margin: u32,
    pub max_paper_height: u32,
    pub paper_width: u32,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        PrinterConfig {
            enabled: true,
            watchdog: 20_000,
            tg_phase_width: 25,
            head_bits: 7,
            line_spacing: 2,
            top_margin: 10,
            max_paper_height: 9_000,
            paper_width: 480,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadPhase {
    #[default]
    Idle,
    Right,
    Return,
}

/// Receives the dots burnt onto the paper.
pub trait PrintSink {
    fn plot(&mut self, x: u32, y: u32);
    fn clear(&mut self);
}

/// A dot-matrix strip of paper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paper {
    width: u32,
    rows: Vec<Vec<bool>>,
}

impl Paper {
    pub fn new(width: u32) -> Self {
        Paper {
            width,
            rows: Vec::new(),
        }
    }

    pub fn dot(&self, x: u32, y: u32) -> bool {
        self.rows
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn dot_count(&self) -> usize {
        self.rows.iter().flatten().filter(|d| **d).count()
    }

    /// `#` per dot, from the first inked row to the last. Trailing blanks on
    /// each row are trimmed.
    pub fn as_text(&self) -> String {
        let inked = |row: &Vec<bool>| row.iter().any(|d| *d);
        let Some(first) = self.rows.iter().position(inked) else {
            return String::new();
        };
        let last = self.rows.iter().rposition(inked).unwrap_or(first);

        self.rows[first..=last]
            .iter()
            .map(|row| {
                let line: String = row.iter().map(|d| if *d { '#' } else { ' ' }).collect();
                format!("{}\n", line.trim_end())
            })
            .collect()
    }
}

impl PrintSink for Paper {
    fn plot(&mut self, x: u32, y: u32) {
        if x >= self.width {
            trace!("[MTP201] Dot at {} past the paper edge", x);
            return;
        }
        let y = y as usize;
        if self.rows.len() <= y {
            self.rows.resize_with(y + 1, Vec::new);
        }
        let row = &mut self.rows[y];
        if row.len() <= x as usize {
            row.resize(x as usize + 1, false);
        }
        row[x as usize] = true;
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}

/// MTP-201 thermal printer: a motor that sweeps a 7-pin head across the
/// paper, a TG tachometer pulse and a HOME switch.
///
/// Control writes (port 0xCA) carry the motor enable on bit 7 and one
/// column of head pins on bits 0-6. Status reads (port 0xCB) report TG on
/// bit 0 and HOME on bit 1.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Printer {
    config: PrinterConfig,
    phase: HeadPhase,
    motor_on: bool,
    home: bool,
    skip_first: bool,
    tg_counter: u32,
    busy_polls: u32,
    line_queue: u32,
    columns: Vec<u8>,
    x: u32,
    y: u32,
    line_has_data: bool,
    flushes: u32,
    paper: Paper,
    #[derivative(Debug = "ignore")]
    sink: Option<Box<dyn PrintSink>>,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(PrinterConfig::default())
    }
}

impl Printer {
    pub fn new(config: PrinterConfig) -> Self {
        Printer {
            phase: HeadPhase::Idle,
            motor_on: false,
            home: true,
            skip_first: false,
            tg_counter: 0,
            busy_polls: 0,
            line_queue: 0,
            columns: Vec::new(),
            x: 0,
            y: config.top_margin,
            line_has_data: false,
            flushes: 0,
            paper: Paper::new(config.paper_width),
            sink: None,
            config,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn PrintSink>) {
        self.sink = Some(sink);
    }

    pub fn reset(&mut self) {
        let sink = self.sink.take();
        *self = Printer::new(self.config.clone());
        self.sink = sink;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn phase(&self) -> HeadPhase {
        self.phase
    }

    pub fn is_motor_on(&self) -> bool {
        self.motor_on
    }

    pub fn is_home(&self) -> bool {
        self.home
    }

    pub fn line_queue(&self) -> u32 {
        self.line_queue
    }

    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    pub fn pending_columns(&self) -> &[u8] {
        &self.columns
    }

    pub fn cursor(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn paper(&self) -> &Paper {
        &self.paper
    }

    pub fn write_control(&mut self, value: u8) {
        let thermal = value & THERMAL_MASK;
        let motor = value & MOTOR_BIT != 0;
        trace!("[MTP201] Control {:02X} motor={} thermal={:02X}", value, motor, thermal);

        if motor && !self.motor_on && self.home {
            if self.line_has_data {
                self.feed_line();
            }
            self.home = false;
            self.skip_first = true;
            self.tg_counter = 0;
        }

        if motor || self.motor_on {
            if self.skip_first {
                self.skip_first = false;
            } else {
                self.columns.push(thermal);
            }
            self.busy_polls = self.config.watchdog;
        }

        if motor && !self.motor_on {
            self.motor_on = true;
            self.phase = HeadPhase::Right;
            self.line_queue += 1;
            debug!("[MTP201] Motor on, line queue {}", self.line_queue);
        } else if !motor && self.motor_on {
            self.stop_motor();
        }
    }

    pub fn read_status(&mut self) -> u8 {
        let mut status = 0x00;
        if self.home {
            status |= HOME_BIT;
        }

        if self.motor_on {
            self.tg_counter += 1;
            if (self.tg_counter / self.config.tg_phase_width.max(1)) % 2 == 0 {
                status |= TG_BIT;
            }
            if self.busy_polls > 0 {
                self.busy_polls -= 1;
            } else {
                debug!("[MTP201] Watchdog expired");
                self.stop_motor();
            }
        } else if self.phase == HeadPhase::Return {
            self.phase = HeadPhase::Idle;
        }

        status
    }

    fn stop_motor(&mut self) {
        self.motor_on = false;
        self.flush();
        self.home = true;
        self.phase = HeadPhase::Return;
        self.line_queue = self.line_queue.saturating_sub(1);
        debug!("[MTP201] Motor off at x={} y={}", self.x, self.y);
    }

    fn feed_line(&mut self) {
        self.y += self.config.head_bits + self.config.line_spacing;
        self.x = 0;
        self.line_has_data = false;

        if self.y > self.config.max_paper_height.saturating_sub(PAPER_WRAP_MARGIN) {
            debug!("[MTP201] Paper full, starting a new sheet");
            self.paper.clear();
            if let Some(sink) = self.sink.as_mut() {
                sink.clear();
            }
            self.y = self.config.top_margin;
        }
    }

    fn flush(&mut self) {
        if self.columns.is_empty() {
            return;
        }

        let head_bits = self.config.head_bits;
        for (col, data) in self.columns.iter().enumerate() {
            if *data == 0 {
                continue;
            }
            self.line_has_data = true;
            for bit in 0..head_bits {
                if data & (1 << bit) != 0 {
                    // pin 0 is the bottom row
                    let x = self.x + col as u32;
                    let y = self.y + (head_bits - 1 - bit);
                    self.paper.plot(x, y);
                    if let Some(sink) = self.sink.as_mut() {
                        sink.plot(x, y);
                    }
                }
            }
        }

        self.x += self.columns.len() as u32;
        self.columns.clear();
        self.flushes += 1;
    }
}
