use std::{fs, ops::RangeInclusive, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::{hex, utils::hexdump};

pub const MEMORY_SIZE: usize = 0x10000;

/// Default writable window: the 2K of on-board RAM at 0x1800.
pub const RAM_WINDOW: RangeInclusive<u16> = 0x1800..=0x1FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomRegion {
    pub start: u16,
    pub end: u16,
}

impl RomRegion {
    pub fn contains(&self, address: u16) -> bool {
        address >= self.start && address <= self.end
    }
}

/// The flat 64K address space seen by the CPU.
///
/// Every address is always readable; unwritten cells read as 0xFF. Writes
/// land only inside the RAM window and never inside a protected ROM region;
/// anything else is dropped with a warning, the way a bus write to a chip
/// that is not there simply vanishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    data: Vec<u8>,
    rom_regions: Vec<RomRegion>,
    ram_window: RangeInclusive<u16>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(RAM_WINDOW)
    }
}

impl Memory {
    pub fn new(ram_window: RangeInclusive<u16>) -> Self {
        Memory {
            data: vec![0xFF; MEMORY_SIZE],
            rom_regions: Vec::new(),
            ram_window,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_rom(&self, address: u16) -> bool {
        self.rom_regions.iter().any(|r| r.contains(address))
    }

    pub fn rom_regions(&self) -> &[RomRegion] {
        &self.rom_regions
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        self.data[address as usize]
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        if self.is_rom(address) {
            warn!(
                "[MEM] Attempt to write to ROM at {:04X} ignored (value {:02X})",
                address, value
            );
            return;
        }

        if self.ram_window.contains(&address) {
            self.data[address as usize] = value;
        } else {
            warn!("[MEM] Invalid memory write at {:04X} value {:02X}", address, value);
        }
    }

    pub fn read_word(&self, address: u16) -> u16 {
        let low_byte = self.read_byte(address) as u16;
        let high_byte = self.read_byte(address.wrapping_add(1)) as u16;
        (high_byte << 8) | low_byte
    }

    /// Copies raw bytes in, bypassing both ROM protection and the RAM window.
    pub fn load(&mut self, start: u16, data: &[u8]) {
        let mut addr = start;
        for &byte in data {
            self.data[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Loads an Intel-HEX image at `base + record address`. When `protect` is
    /// set, the span covered by the image becomes a ROM region. Returns the
    /// number of bytes written.
    pub fn load_hex_rom(&mut self, text: &str, base: u16, protect: bool) -> usize {
        let records = hex::parse_lenient(text);
        let mut written = 0;
        let mut span: Option<(u16, u16)> = None;

        for record in records.iter().filter(|r| r.is_data()) {
            for (i, byte) in record.data.iter().enumerate() {
                let addr = base.wrapping_add(record.address).wrapping_add(i as u16);
                self.data[addr as usize] = *byte;
                written += 1;
                span = Some(match span {
                    Some((lo, hi)) => (lo.min(addr), hi.max(addr)),
                    None => (addr, addr),
                });
            }
        }

        match span {
            Some((start, end)) => {
                if protect {
                    self.rom_regions.push(RomRegion { start, end });
                }
                info!(
                    "[MEM] Loaded {} bytes at {:04X}..{:04X}{}",
                    written,
                    start,
                    end,
                    if protect { " (ROM)" } else { "" }
                );
            }
            None => warn!("[MEM] No data records found in HEX image"),
        }

        written
    }

    pub fn load_hex_rom_file(
        &mut self,
        path: impl AsRef<Path>,
        base: u16,
        protect: bool,
    ) -> anyhow::Result<usize> {
        let path = path.as_ref();
        trace!("[MEM] Reading {}", path.display());
        let text = fs::read_to_string(path)?;
        Ok(self.load_hex_rom(&text, base, protect))
    }

    pub fn dump(&self, start: u16, end: u16) -> String {
        hexdump(&self.data, start, end)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}
