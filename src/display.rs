use derivative::Derivative;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::port::DigitSelect;

/// Writes with a segment's bit clear needed before it is drawn dark. The
/// monitor multiplexes the six digits fast enough that a single zero is
/// usually just the strobe moving on.
pub const ZERO_HISTORY_THRESHOLD: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    Dp,
}

impl Segment {
    pub const ALL: [Segment; 8] = [
        Segment::A,
        Segment::B,
        Segment::C,
        Segment::D,
        Segment::E,
        Segment::F,
        Segment::G,
        Segment::Dp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Segment::A => "a",
            Segment::B => "b",
            Segment::C => "c",
            Segment::D => "d",
            Segment::E => "e",
            Segment::F => "f",
            Segment::G => "g",
            Segment::Dp => "dp",
        }
    }
}

// Port 0x01 bit -> segment, as wired on the board.
const SEGMENT_BITS: [(u8, Segment); 8] = [
    (0x01, Segment::E),
    (0x02, Segment::G),
    (0x04, Segment::F),
    (0x08, Segment::A),
    (0x10, Segment::B),
    (0x20, Segment::C),
    (0x40, Segment::Dp),
    (0x80, Segment::D),
];

/// A set of lit segments; bit `n` is `Segment::ALL[n]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segments(u8);

impl Segments {
    pub const BLANK: Segments = Segments(0);

    pub fn is_on(self, segment: Segment) -> bool {
        self.0 & (1 << segment as u8) != 0
    }

    pub fn set(&mut self, segment: Segment, on: bool) {
        if on {
            self.0 |= 1 << segment as u8;
        } else {
            self.0 &= !(1 << segment as u8);
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Decodes a raw port 0x01 byte with no hysteresis applied.
    pub fn from_port_byte(value: u8) -> Self {
        let mut segments = Segments::BLANK;
        for (mask, segment) in SEGMENT_BITS {
            segments.set(segment, value & mask != 0);
        }
        segments
    }

    pub fn from_segments(lit: &[Segment]) -> Self {
        let mut segments = Segments::BLANK;
        for segment in lit {
            segments.set(*segment, true);
        }
        segments
    }

    /// Best-effort reading of the glyph, ignoring the decimal point.
    pub fn to_char(self) -> char {
        let shape = self.0 & 0x7F;
        GLYPHS
            .iter()
            .find(|(bits, _)| *bits == shape)
            .map(|(_, c)| *c)
            .unwrap_or('?')
    }
}

// a=0x01 b=0x02 c=0x04 d=0x08 e=0x10 f=0x20 g=0x40
const GLYPHS: [(u8, char); 19] = [
    (0x00, ' '),
    (0x3F, '0'),
    (0x06, '1'),
    (0x5B, '2'),
    (0x4F, '3'),
    (0x66, '4'),
    (0x6D, '5'),
    (0x7D, '6'),
    (0x07, '7'),
    (0x7F, '8'),
    (0x6F, '9'),
    (0x77, 'A'),
    (0x7C, 'b'),
    (0x39, 'C'),
    (0x5E, 'd'),
    (0x79, 'E'),
    (0x71, 'F'),
    (0x73, 'P'),
    (0x40, '-'),
];

/// The six digit positions, left to right on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplaySlot {
    Addr3,
    Addr2,
    Addr1,
    Addr0,
    Data1,
    Data0,
}

impl DisplaySlot {
    pub const ALL: [DisplaySlot; 6] = [
        DisplaySlot::Addr3,
        DisplaySlot::Addr2,
        DisplaySlot::Addr1,
        DisplaySlot::Addr0,
        DisplaySlot::Data1,
        DisplaySlot::Data0,
    ];

    /// Only a strobe with exactly one of the six select lines high picks a
    /// digit.
    pub fn from_select(select: DigitSelect) -> Option<Self> {
        match select.bits() {
            0x01 => Some(DisplaySlot::Data0),
            0x02 => Some(DisplaySlot::Data1),
            0x04 => Some(DisplaySlot::Addr0),
            0x08 => Some(DisplaySlot::Addr1),
            0x10 => Some(DisplaySlot::Addr2),
            0x20 => Some(DisplaySlot::Addr3),
            _ => None,
        }
    }

    /// Identifier of the glyph element the front-end draws for this digit.
    pub fn element_id(self) -> &'static str {
        match self {
            DisplaySlot::Data0 => "svg-object-data0",
            DisplaySlot::Data1 => "svg-object-data1",
            DisplaySlot::Addr0 => "svg-object-add0",
            DisplaySlot::Addr1 => "svg-object-add1",
            DisplaySlot::Addr2 => "svg-object-add2",
            DisplaySlot::Addr3 => "svg-object-add3",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Receives the lit segments of a digit each time it is redrawn.
pub trait SegmentSink {
    fn update(&mut self, slot: DisplaySlot, segments: Segments);
}

#[derive(Derivative, Serialize)]
#[derivative(Debug, Default)]
pub struct Display {
    select: DigitSelect,
    slot: Option<DisplaySlot>,
    lit: Segments,
    zero_history: [u8; 8],
    glyphs: [Segments; 6],
    #[serde(skip)]
    #[derivative(Debug = "ignore")]
    sink: Option<Box<dyn SegmentSink>>,
}

impl Display {
    pub fn new() -> Self {
        Display::default()
    }

    pub fn set_sink(&mut self, sink: Box<dyn SegmentSink>) {
        self.sink = Some(sink);
    }

    pub fn reset(&mut self) {
        self.select = DigitSelect::default();
        self.slot = None;
        self.lit = Segments::BLANK;
        self.zero_history = [0; 8];
        self.glyphs = [Segments::BLANK; 6];
    }

    pub fn digit_select(&self) -> DigitSelect {
        self.select
    }

    pub fn selected_slot(&self) -> Option<DisplaySlot> {
        self.slot
    }

    pub fn select_digit(&mut self, value: u8) {
        self.select = DigitSelect::new(value);
        self.slot = DisplaySlot::from_select(self.select);
        if let Some(slot) = self.slot {
            trace!("[DISPLAY] Digit {:?} value {:02X}", slot, self.select.bits());
        }
    }

    pub fn write_segments(&mut self, value: u8) {
        for (mask, segment) in SEGMENT_BITS {
            let history = &mut self.zero_history[segment as usize];
            if value & mask != 0 {
                self.lit.set(segment, true);
                *history = 0;
            } else {
                *history = history.saturating_add(1);
                if *history >= ZERO_HISTORY_THRESHOLD {
                    self.lit.set(segment, false);
                }
            }
        }

        let Some(slot) = self.slot else {
            return;
        };

        self.glyphs[slot.index()] = self.lit;
        if let Some(sink) = self.sink.as_mut() {
            sink.update(slot, self.lit);
        }
    }

    /// The segments currently shown by `slot`.
    pub fn glyph(&self, slot: DisplaySlot) -> Segments {
        self.glyphs[slot.index()]
    }

    /// The segment state as it would be drawn now, independent of slot.
    pub fn lit(&self) -> Segments {
        self.lit
    }

    pub fn as_text(&self) -> String {
        DisplaySlot::ALL
            .iter()
            .map(|slot| self.glyph(*slot).to_char())
            .collect()
    }
}
