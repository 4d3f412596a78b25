//! 16-bit signed mono PCM WAV files, in memory.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::WavError;

pub const SAMPLE_RATE: u32 = 44_100;
pub const HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

fn pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// Builds a complete WAV file around `samples`.
pub fn write_pcm16(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let mut wav = Vec::with_capacity(HEADER_LEN + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut wav), pcm16_spec(sample_rate))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(wav)
}

/// Parses a 16-bit mono PCM WAV file into its sample rate and samples.
pub fn read_pcm16(data: &[u8]) -> Result<(u32, Vec<i16>), WavError> {
    let mut reader = WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int
        || spec.channels != CHANNELS
        || spec.bits_per_sample != BITS_PER_SAMPLE
    {
        return Err(WavError::Unsupported {
            channels: spec.channels,
            bits: spec.bits_per_sample,
            float: spec.sample_format == SampleFormat::Float,
        });
    }

    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((spec.sample_rate, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u16(data: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([data[offset], data[offset + 1]])
    }

    fn le_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_header_layout() {
        let wav = write_pcm16(&[1, -1, 16000], SAMPLE_RATE).unwrap();
        assert_eq!(wav.len(), HEADER_LEN + 6);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(le_u32(&wav, 4), 36 + 6);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(le_u32(&wav, 16), 16);
        assert_eq!(le_u16(&wav, 20), 1);
        assert_eq!(le_u16(&wav, 22), 1);
        assert_eq!(le_u32(&wav, 24), 44_100);
        assert_eq!(le_u32(&wav, 28), 88_200);
        assert_eq!(le_u16(&wav, 32), 2);
        assert_eq!(le_u16(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(le_u32(&wav, 40), 6);
        assert_eq!(&wav[44..46], &[0x01, 0x00]);
        assert_eq!(&wav[46..48], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_read_back() {
        let samples = vec![16000, -16000, -16000, 16000];
        let wav = write_pcm16(&samples, 22_050).unwrap();
        let (rate, read) = read_pcm16(&wav).unwrap();
        assert_eq!(rate, 22_050);
        assert_eq!(read, samples);
    }

    #[test]
    fn test_read_skips_unknown_chunks() {
        let wav = write_pcm16(&[7, 8], SAMPLE_RATE).unwrap();
        let mut patched = wav[..36].to_vec();
        patched.extend_from_slice(b"LIST");
        patched.extend_from_slice(&4u32.to_le_bytes());
        patched.extend_from_slice(&[0, 0, 0, 0]);
        patched.extend_from_slice(&wav[36..]);
        let riff_len = (patched.len() - 8) as u32;
        patched[4..8].copy_from_slice(&riff_len.to_le_bytes());

        let (_, read) = read_pcm16(&patched).unwrap();
        assert_eq!(read, vec![7, 8]);
    }

    #[test]
    fn test_read_rejects_garbage() {
        assert!(matches!(read_pcm16(b"RIFX"), Err(WavError::Malformed(_))));

        let wav = write_pcm16(&[0], SAMPLE_RATE).unwrap();
        assert!(matches!(read_pcm16(&wav[..36]), Err(WavError::Malformed(_))));

        // a chunk claiming to run far past the end of the buffer
        let mut corrupt = wav[..36].to_vec();
        corrupt.extend_from_slice(b"JUNK");
        corrupt.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(read_pcm16(&corrupt).is_err());
    }

    #[test]
    fn test_read_rejects_stereo() {
        let spec = WavSpec {
            channels: 2,
            ..pcm16_spec(SAMPLE_RATE)
        };
        let mut stereo = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut stereo), spec).unwrap();
            writer.write_sample(0i16).unwrap();
            writer.write_sample(0i16).unwrap();
            writer.finalize().unwrap();
        }

        assert_eq!(
            read_pcm16(&stereo),
            Err(WavError::Unsupported {
                channels: 2,
                bits: 16,
                float: false
            })
        );
    }
}
