use derivative::Derivative;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cpu::CpuState;

pub const DEFAULT_VOLUME: f32 = 0.05;

/// Value of `L` while the monitor's tone routine drives the speaker.
const TONE_ROUTINE_L: u8 = 0x5E;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beep {
    pub frequency: u32,
    pub duration_ms: u32,
    pub volume: f32,
}

/// Plays a square-wave tone. Fire and forget.
pub trait ToneSink {
    fn beep(&mut self, beep: Beep);
}

/// The piezo speaker on PC7 of the 8255.
///
/// The tone routine leaves the half period in `C` and the length in `HL`,
/// so a single strobe is enough to hand the whole tone to the host instead
/// of bit-banging it sample by sample.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Speaker {
    volume: f32,
    beeps: u32,
    #[derivative(Debug = "ignore")]
    sink: Option<Box<dyn ToneSink>>,
}

impl Default for Speaker {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

impl Speaker {
    pub fn new(volume: f32) -> Self {
        Speaker {
            volume,
            beeps: 0,
            sink: None,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn ToneSink>) {
        self.sink = Some(sink);
    }

    pub fn beeps(&self) -> u32 {
        self.beeps
    }

    /// Checks a digit-select write against the registers of the instruction
    /// that made it.
    pub fn strobe(&mut self, value: u8, regs: &CpuState) -> Option<Beep> {
        if value & 0x80 == 0 || regs.l != TONE_ROUTINE_L {
            return None;
        }

        let beep = Beep {
            frequency: regs.c as u32 * 10,
            duration_ms: regs.hl() as u32,
            volume: self.volume,
        };
        trace!(
            "[SOUND] Beep {} Hz for {} ms",
            beep.frequency,
            beep.duration_ms
        );

        self.beeps += 1;
        if let Some(sink) = self.sink.as_mut() {
            sink.beep(beep);
        }
        Some(beep)
    }
}
