use std::{fs, ops::RangeInclusive, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    clock::{DEFAULT_CLOCK_HZ, SLICE_CYCLES, SLICE_MS},
    keypad::DEFAULT_HOLD_SCANS,
    memory::RAM_WINDOW,
    printer::PrinterConfig,
    sound::DEFAULT_VOLUME,
    wav::SAMPLE_RATE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomImage {
    pub path: String,
    #[serde(default)]
    pub base: u16,
    #[serde(default)]
    pub protect: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub clock_hz: u32,
    pub sample_rate: u32,
    pub slice_cycles: u32,
    pub slice_ms: u32,
    pub breakpoint: u16,
    pub key_hold_scans: i32,
    pub key_interval_ms: u32,
    pub volume: f32,
    pub ram_window: RangeInclusive<u16>,
    pub printer: PrinterConfig,
    pub roms: Vec<RomImage>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            clock_hz: DEFAULT_CLOCK_HZ,
            sample_rate: SAMPLE_RATE,
            slice_cycles: SLICE_CYCLES,
            slice_ms: SLICE_MS,
            breakpoint: 0xFFFF,
            key_hold_scans: DEFAULT_HOLD_SCANS,
            key_interval_ms: 200,
            volume: DEFAULT_VOLUME,
            ram_window: RAM_WINDOW,
            printer: PrinterConfig::default(),
            roms: vec![
                RomImage {
                    path: "/archive/monitor_and_tiny_basic.u6.hex".to_string(),
                    base: 0x0000,
                    protect: false,
                },
                RomImage {
                    path: "/archive/prt-ib.hex".to_string(),
                    base: 0x6000,
                    protect: true,
                },
            ],
        }
    }
}

impl MachineConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
