//! Cassette interface.
//!
//! Three pieces share one set of timing constants derived from the CPU clock:
//! playback of a loaded program on the tape-in bit, a run-length edge log of
//! the tape-out bit, and conversion of that log to and from PCM WAV.
//!
//! Bits are frequency-shift keyed: a `0` is 8 cycles of 2 kHz followed by 2
//! cycles of 1 kHz, a `1` is 4 cycles of each. A byte is framed as a start
//! bit (0), eight data bits LSB first and a stop bit (1).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{clock::DEFAULT_CLOCK_HZ, error::WavError, hex, wav};

pub const AMPLITUDE: i16 = 16_000;
pub const BITS_PER_BYTE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeTiming {
    pub clock_hz: u32,
    pub sample_rate: u32,
    pub half_period_2k: u64,
    pub half_period_1k: u64,
}

impl Default for TapeTiming {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_HZ, wav::SAMPLE_RATE)
    }
}

impl TapeTiming {
    /// Half periods never round below one T-state, so slow clocks still
    /// give a usable (if inaudible) timing.
    pub fn new(clock_hz: u32, sample_rate: u32) -> Self {
        let clock_hz = clock_hz.max(1);
        let hz = clock_hz as f64;
        TapeTiming {
            clock_hz,
            sample_rate,
            half_period_2k: ((hz / 2000.0 / 2.0).round() as u64).max(1),
            half_period_1k: ((hz / 1000.0 / 2.0).round() as u64).max(1),
        }
    }

    /// Nominal length of one bit cell, used by playback to locate the byte
    /// under the head.
    pub fn bit_duration(&self) -> u64 {
        self.half_period_2k * 16 + self.half_period_1k * 8
    }

    pub fn byte_duration(&self) -> u64 {
        self.bit_duration() * BITS_PER_BYTE
    }

    fn samples_for(&self, t_states: u64) -> usize {
        ((t_states as f64 / self.clock_hz as f64) * self.sample_rate as f64).floor() as usize
    }

    fn t_states_for(&self, samples: usize) -> u64 {
        (samples as f64 * self.clock_hz as f64 / self.sample_rate as f64).floor() as u64
    }

    /// Half periods shorter than this are 2 kHz, longer are 1 kHz.
    fn threshold(&self) -> u64 {
        (self.half_period_2k + self.half_period_1k) / 2
    }
}

/// A change of the tape-out level at T-state `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub level: u8,
    pub t: u64,
}

struct EdgeWriter {
    edges: Vec<Edge>,
    level: u8,
    t: u64,
}

impl EdgeWriter {
    fn new(start_t: u64) -> Self {
        EdgeWriter {
            edges: Vec::new(),
            level: 1,
            t: start_t,
        }
    }

    fn cycles(&mut self, count: usize, half_period: u64) {
        for _ in 0..count * 2 {
            self.edges.push(Edge {
                level: self.level,
                t: self.t,
            });
            self.t += half_period;
            self.level ^= 1;
        }
    }

    fn bit(&mut self, timing: &TapeTiming, bit: bool) {
        if bit {
            self.cycles(4, timing.half_period_2k);
            self.cycles(4, timing.half_period_1k);
        } else {
            self.cycles(8, timing.half_period_2k);
            self.cycles(2, timing.half_period_1k);
        }
    }

    fn finish(mut self) -> Vec<Edge> {
        // closes the last half period
        self.edges.push(Edge {
            level: self.level,
            t: self.t,
        });
        self.edges
    }
}

/// FSK-encodes `data` into an edge log starting at `start_t`.
pub fn encode_bytes(timing: &TapeTiming, data: &[u8], start_t: u64) -> Vec<Edge> {
    let mut writer = EdgeWriter::new(start_t);
    for byte in data {
        writer.bit(timing, false);
        for i in 0..8 {
            writer.bit(timing, byte & (1 << i) != 0);
        }
        writer.bit(timing, true);
    }
    writer.finish()
}

fn decode_bits(timing: &TapeTiming, edges: &[Edge]) -> Vec<bool> {
    let threshold = timing.threshold();
    let mut bits = Vec::new();
    let (mut shorts, mut longs) = (0usize, 0usize);

    for pair in edges.windows(2) {
        let half = pair[1].t.saturating_sub(pair[0].t);
        if half < threshold {
            if longs > 0 {
                bits.push(shorts <= longs);
                shorts = 0;
                longs = 0;
            }
            shorts += 1;
        } else {
            longs += 1;
        }
    }
    if longs > 0 {
        bits.push(shorts <= longs);
    }

    bits
}

/// Recovers the bytes from an FSK edge log. Idle `1` bits between frames are
/// skipped; a trailing partial frame is dropped.
pub fn decode_edges(timing: &TapeTiming, edges: &[Edge]) -> Vec<u8> {
    let bits = decode_bits(timing, edges);
    let mut bytes = Vec::new();
    let mut i = 0;

    while i < bits.len() {
        if bits[i] {
            i += 1;
            continue;
        }
        if i + BITS_PER_BYTE as usize > bits.len() {
            trace!("[TAPE] Dropping partial frame at bit {}", i);
            break;
        }
        let byte = (0..8).fold(0u8, |acc, n| acc | ((bits[i + 1 + n] as u8) << n));
        bytes.push(byte);
        i += BITS_PER_BYTE as usize;
    }

    bytes
}

/// Renders an edge log as square-wave PCM, one sample span per edge.
pub fn pcm_samples(timing: &TapeTiming, edges: &[Edge]) -> Vec<i16> {
    let (Some(first), Some(last)) = (edges.first(), edges.last()) else {
        return Vec::new();
    };

    let total = timing.samples_for(last.t.saturating_sub(first.t));
    let mut samples = Vec::with_capacity(total);

    for pair in edges.windows(2) {
        let span = timing.samples_for(pair[1].t.saturating_sub(pair[0].t));
        let value = if pair[0].level != 0 {
            AMPLITUDE
        } else {
            -AMPLITUDE
        };
        let room = total - samples.len();
        samples.extend(std::iter::repeat(value).take(span.min(room)));
    }

    samples
}

/// Synthesizes a WAV file from an edge log. Needs at least two edges.
pub fn synthesize_wav(timing: &TapeTiming, edges: &[Edge]) -> Option<Vec<u8>> {
    if edges.len() < 2 {
        debug!("[TAPE] Not enough edges to synthesize a WAV ({})", edges.len());
        return None;
    }

    let samples = pcm_samples(timing, edges);
    match wav::write_pcm16(&samples, timing.sample_rate) {
        Ok(data) => Some(data),
        Err(err) => {
            warn!("[TAPE] Could not encode WAV: {}", err);
            None
        }
    }
}

/// Rebuilds an edge log from PCM: positive samples are level 1.
pub fn edges_from_pcm(timing: &TapeTiming, samples: &[i16], sample_rate: u32) -> Vec<Edge> {
    let timing = TapeTiming {
        sample_rate,
        ..*timing
    };
    let mut edges: Vec<Edge> = Vec::new();

    for (i, sample) in samples.iter().enumerate() {
        let level = (*sample > 0) as u8;
        if edges.last().map(|e| e.level) != Some(level) {
            edges.push(Edge {
                level,
                t: timing.t_states_for(i),
            });
        }
    }

    if let Some(last) = edges.last().copied() {
        edges.push(Edge {
            level: last.level ^ 1,
            t: timing.t_states_for(samples.len()),
        });
    }

    edges
}

/// Intel-HEX program straight to a playable WAV file.
pub fn hex_to_wav(timing: &TapeTiming, text: &str) -> Option<Vec<u8>> {
    let data = hex::data_bytes(&hex::parse_lenient(text));
    synthesize_wav(timing, &encode_bytes(timing, &data, 0))
}

pub fn wav_to_bytes(timing: &TapeTiming, data: &[u8]) -> Result<Vec<u8>, WavError> {
    let (sample_rate, samples) = wav::read_pcm16(data)?;
    let edges = edges_from_pcm(timing, &samples, sample_rate);
    Ok(decode_edges(timing, &edges))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tape {
    timing: TapeTiming,
    buffer: Vec<u8>,
    playback_origin: Option<u64>,
    edges: Vec<Edge>,
    recording: bool,
}

impl Tape {
    pub fn new(timing: TapeTiming) -> Self {
        Tape {
            timing,
            ..Default::default()
        }
    }

    pub fn timing(&self) -> &TapeTiming {
        &self.timing
    }

    /// Loads the data records of an Intel-HEX program onto the tape. Playback
    /// starts from the first read after this.
    pub fn load_hex(&mut self, text: &str) -> usize {
        let records = hex::parse_lenient(text);
        self.load_bytes(&hex::data_bytes(&records))
    }

    pub fn load_bytes(&mut self, data: &[u8]) -> usize {
        self.buffer = data.to_vec();
        self.playback_origin = None;
        info!("[TAPE] Loaded {} bytes", self.buffer.len());
        self.buffer.len()
    }

    pub fn rewind(&mut self) {
        self.playback_origin = None;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Level on the tape-in line at `t`: 0x80 or 0x00 while the program is
    /// playing, 0xFF with nothing loaded or once the end has passed.
    ///
    /// The level toggles every 2 kHz half period regardless of the bit being
    /// played; the byte position is the only thing tracked exactly.
    pub fn read_bit(&mut self, t: u64) -> u8 {
        if self.buffer.is_empty() {
            return 0xFF;
        }

        let origin = *self.playback_origin.get_or_insert(t);
        let elapsed = t.saturating_sub(origin);
        let byte_idx = elapsed / self.timing.byte_duration().max(1);
        if byte_idx >= self.buffer.len() as u64 {
            return 0xFF;
        }

        if (elapsed / self.timing.half_period_2k.max(1)) % 2 == 0 {
            0x80
        } else {
            0x00
        }
    }

    pub fn start_recording(&mut self) {
        self.edges.clear();
        self.recording = true;
        info!("[TAPE] Recording started");
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
        info!("[TAPE] Recording stopped, {} edges", self.edges.len());
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Logs bit 7 of `value` if it differs from the last logged level.
    pub fn record_edge(&mut self, value: u8, t: u64) {
        let level = (value >> 7) & 1;
        if self.edges.last().map(|e| e.level) != Some(level) {
            trace!("[TAPE] Edge {} at {}", level, t);
            self.edges.push(Edge { level, t });
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn synthesize_wav(&self) -> Option<Vec<u8>> {
        synthesize_wav(&self.timing, &self.edges)
    }

    /// Decodes what has been recorded so far.
    pub fn recorded_bytes(&self) -> Vec<u8> {
        decode_edges(&self.timing, &self.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_constants() {
        let timing = TapeTiming::default();
        assert_eq!(timing.half_period_2k, 448);
        assert_eq!(timing.half_period_1k, 895);
        assert_eq!(timing.bit_duration(), 448 * 16 + 895 * 8);
    }

    #[test]
    fn test_slow_clock_keeps_playback_alive() {
        for hz in [0, 1, 1_000, 1_999] {
            let timing = TapeTiming::new(hz, 44_100);
            assert!(timing.half_period_2k >= 1, "{} Hz", hz);
            assert!(timing.byte_duration() >= 1, "{} Hz", hz);

            let mut tape = Tape::new(timing);
            tape.load_bytes(&[1]);
            assert_ne!(tape.read_bit(10), 0xFF, "{} Hz", hz);
            assert_ne!(tape.read_bit(11), 0xFF, "{} Hz", hz);
        }
    }

    #[test]
    fn test_read_without_tape() {
        let mut tape = Tape::default();
        assert_eq!(tape.read_bit(0), 0xFF);
        assert_eq!(tape.read_bit(1_000_000), 0xFF);
    }

    #[test]
    fn test_playback_toggles_on_2k_half_period() {
        let mut tape = Tape::default();
        tape.load_bytes(&[0x55]);

        assert_eq!(tape.read_bit(1000), 0x80);
        assert_eq!(tape.read_bit(1000 + 447), 0x80);
        assert_eq!(tape.read_bit(1000 + 448), 0x00);
        assert_eq!(tape.read_bit(1000 + 896), 0x80);
    }

    #[test]
    fn test_playback_ends_after_last_byte() {
        let mut tape = Tape::default();
        tape.load_hex(":0218000011229F\n:00000001FF\n");
        let byte = tape.timing().byte_duration();

        assert_ne!(tape.read_bit(0), 0xFF);
        assert_ne!(tape.read_bit(2 * byte - 1), 0xFF);
        assert_eq!(tape.read_bit(2 * byte), 0xFF);

        tape.rewind();
        assert_ne!(tape.read_bit(5 * byte), 0xFF);
    }

    #[test]
    fn test_record_edge_only_on_change() {
        let mut tape = Tape::default();
        tape.record_edge(0x80, 10);
        tape.record_edge(0xFF, 20);
        tape.record_edge(0x00, 30);
        tape.record_edge(0x7F, 40);
        tape.record_edge(0x80, 50);

        assert_eq!(
            tape.edges(),
            &[
                Edge { level: 1, t: 10 },
                Edge { level: 0, t: 30 },
                Edge { level: 1, t: 50 }
            ]
        );
    }

    #[test]
    fn test_start_recording_clears_log() {
        let mut tape = Tape::default();
        tape.record_edge(0x80, 10);
        tape.start_recording();
        assert!(tape.is_recording());
        assert!(tape.edges().is_empty());
    }

    #[test]
    fn test_wav_needs_two_edges() {
        let mut tape = Tape::default();
        assert!(tape.synthesize_wav().is_none());
        tape.record_edge(0x80, 0);
        assert!(tape.synthesize_wav().is_none());
    }

    #[test]
    fn test_pcm_levels_and_length() {
        let timing = TapeTiming::default();
        let edges = [
            Edge { level: 1, t: 0 },
            Edge { level: 0, t: 17_900 },
            Edge { level: 1, t: 35_800 },
        ];
        let samples = pcm_samples(&timing, &edges);
        assert_eq!(samples.len(), 882);
        assert!(samples[..441].iter().all(|s| *s == AMPLITUDE));
        assert!(samples[441..].iter().all(|s| *s == -AMPLITUDE));
    }

    #[test]
    fn test_encoded_bit_lengths() {
        let timing = TapeTiming::default();
        let edges = encode_bytes(&timing, &[0x00], 0);
        // 10 bits: nine 0s (start + data) and the stop bit
        let zero = 16 * 448 + 4 * 895;
        let one = 8 * 448 + 8 * 895;
        assert_eq!(edges.last().map(|e| e.t), Some(9 * zero + one));
        assert!(edges.windows(2).all(|w| w[0].level != w[1].level));
    }

    #[test]
    fn test_decode_encoded_bytes() {
        let timing = TapeTiming::default();
        let data = [0x00, 0xFF, 0xA5, 0x3C];
        let edges = encode_bytes(&timing, &data, 1234);
        assert_eq!(decode_edges(&timing, &edges), data);
    }
}
