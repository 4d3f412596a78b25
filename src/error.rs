use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("line {line}: record must start with ':'")]
    MissingStartCode { line: usize },
    #[error("line {line}: invalid hex digit in {field}")]
    InvalidDigit { line: usize, field: &'static str },
    #[error("line {line}: record is shorter than its declared length {length}")]
    Truncated { line: usize, length: u8 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("number {value} out of range for {bytes}-byte input")]
    OutOfRange { value: i64, bytes: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("malformed WAV stream: {0}")]
    Malformed(String),
    #[error("unsupported WAV encoding")]
    UnsupportedEncoding,
    #[error("unsupported WAV format: {channels} channel(s), {bits} bits, float={float}")]
    Unsupported { channels: u16, bits: u16, float: bool },
}

impl From<hound::Error> for WavError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::Unsupported => WavError::UnsupportedEncoding,
            other => WavError::Malformed(other.to_string()),
        }
    }
}
