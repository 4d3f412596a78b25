//! Intel-HEX line records.
//!
//! Only data records (type `00`) carry bytes; everything else (end of file,
//! extended addresses) is parsed but ignored by the loaders. Checksums are
//! generated by [`encode`] but never validated when reading.

use tracing::warn;

use crate::error::HexError;

pub const DATA_RECORD: u8 = 0x00;
pub const EOF_RECORD: u8 = 0x01;

const BYTES_PER_LINE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub address: u16,
    pub record_type: u8,
    pub data: Vec<u8>,
}

impl Record {
    pub fn is_data(&self) -> bool {
        self.record_type == DATA_RECORD
    }
}

fn field(line: &str, start: usize, len: usize, line_no: usize, name: &'static str) -> Result<u32, HexError> {
    let digits = line.get(start..start + len).ok_or(HexError::InvalidDigit {
        line: line_no,
        field: name,
    })?;
    u32::from_str_radix(digits, 16).map_err(|_| HexError::InvalidDigit {
        line: line_no,
        field: name,
    })
}

/// Parses one `:LLAAAATTDD..CC` line. `line_no` is 1-based and only used for
/// error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<Record, HexError> {
    let line = line.trim();
    if !line.starts_with(':') {
        return Err(HexError::MissingStartCode { line: line_no });
    }

    let length = field(line, 1, 2, line_no, "length")? as u8;
    let address = field(line, 3, 4, line_no, "address")? as u16;
    let record_type = field(line, 7, 2, line_no, "type")? as u8;

    if line.len() < 9 + length as usize * 2 {
        return Err(HexError::Truncated {
            line: line_no,
            length,
        });
    }

    let data = (0..length as usize)
        .map(|i| field(line, 9 + i * 2, 2, line_no, "data").map(|b| b as u8))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Record {
        address,
        record_type,
        data,
    })
}

/// Parses every non-blank line, failing on the first malformed one.
pub fn parse(text: &str) -> Result<Vec<Record>, HexError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(line, i + 1))
        .collect()
}

/// Like [`parse`] but skips malformed lines with a warning. This is what the
/// device loaders use: a bad line in a program should not stop the machine.
pub fn parse_lenient(text: &str) -> Vec<Record> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match parse_line(line, i + 1) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("[HEX] Skipping malformed record: {}", err);
                None
            }
        })
        .collect()
}

/// Concatenates the payload of every data record, in file order.
pub fn data_bytes(records: &[Record]) -> Vec<u8> {
    records
        .iter()
        .filter(|r| r.is_data())
        .flat_map(|r| r.data.iter().copied())
        .collect()
}

/// Two's complement of the byte sum of length, address, type and payload.
pub fn checksum(address: u16, record_type: u8, data: &[u8]) -> u8 {
    let sum = data.iter().fold(
        (data.len() as u8)
            .wrapping_add((address >> 8) as u8)
            .wrapping_add(address as u8)
            .wrapping_add(record_type),
        |acc, b| acc.wrapping_add(*b),
    );
    (!sum).wrapping_add(1)
}

/// Encodes `data` as 16-byte data records starting at `start`, followed by
/// the end-of-file record.
pub fn encode(data: &[u8], start: u16) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let address = start.wrapping_add((i * BYTES_PER_LINE) as u16);
        out.push_str(&format!(":{:02X}{:04X}{:02X}", chunk.len(), address, DATA_RECORD));
        for byte in chunk {
            out.push_str(&format!("{:02X}", byte));
        }
        out.push_str(&format!("{:02X}\n", checksum(address, DATA_RECORD, chunk)));
    }
    out.push_str(":00000001FF\n");
    out
}
