use crate::error::FormatError;

/// Classic 16-bytes-per-line dump of `buffer[start..end]` with an ASCII column.
pub fn hexdump(buffer: &[u8], start: u16, end: u16) -> String {
    let mut str = String::new();
    let end = (end as usize).min(buffer.len());
    let mut addr = start as usize;
    while addr < end {
        let mut line = format!("{:04X}  ", addr);
        let mut chars = String::new();
        for byte in &buffer[addr..(addr + 16).min(end)] {
            line.push_str(&format!("{:02X} ", byte));
            let c = *byte as char;
            chars.push(if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '.'
            });
        }

        str.push_str(&format!("{:<55} {}\n", line, chars));
        addr += 16;
    }

    str
}

/// Formats `number` as `bytes * 2` upper-case hex digits.
///
/// Negative numbers, numbers that do not fit in `bytes`, and widths of 16
/// bytes or more are a formatting bug on the caller's side and are reported
/// as an error rather than truncated.
pub fn decimal_to_hex(number: i64, bytes: u32) -> Result<String, FormatError> {
    let max_value = 256i128.checked_pow(bytes).map(|limit| limit - 1);
    if number < 0 || max_value.map_or(true, |max| number as i128 > max) {
        return Err(FormatError::OutOfRange {
            value: number,
            bytes,
        });
    }

    Ok(format!("{:0width$X}", number, width = bytes as usize * 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_to_hex() {
        assert_eq!(decimal_to_hex(0, 1).unwrap(), "00");
        assert_eq!(decimal_to_hex(0x5E, 1).unwrap(), "5E");
        assert_eq!(decimal_to_hex(0x1800, 2).unwrap(), "1800");
        assert_eq!(decimal_to_hex(0xFF, 2).unwrap(), "00FF");
    }

    #[test]
    fn test_decimal_to_hex_out_of_range() {
        assert_eq!(
            decimal_to_hex(-1, 1),
            Err(FormatError::OutOfRange { value: -1, bytes: 1 })
        );
        assert!(decimal_to_hex(0x100, 1).is_err());
        assert!(decimal_to_hex(0x10000, 2).is_err());
        assert_eq!(decimal_to_hex(i64::MAX, 8).unwrap(), "7FFFFFFFFFFFFFFF");
        assert_eq!(
            decimal_to_hex(1, 16),
            Err(FormatError::OutOfRange { value: 1, bytes: 16 })
        );
        assert!(decimal_to_hex(1, u32::MAX).is_err());
    }

    #[test]
    fn test_hexdump() {
        let mut buffer = vec![0u8; 0x20];
        buffer[0x10..0x15].copy_from_slice(b"HELLO");

        let dump = hexdump(&buffer, 0x10, 0x20);
        assert_eq!(dump.lines().count(), 1);
        assert!(dump.starts_with("0010  48 45 4C 4C 4F 00"));
        assert!(dump.trim_end().ends_with("HELLO..........."));
    }
}
