//! Canonical 44-byte WAVE container handling.
//!
//! The engine hands rendered float buffers to collaborators as 16-bit
//! PCM stereo WAVE files: `RIFF`/`WAVE` with a single `fmt ` chunk
//! (format code 1) followed by `data`, everything little-endian.

use engine_core::Error;

/// Parsed `fmt `/`data` facts of a WAVE file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_bytes: u32,
}

/// Encode stereo float samples as a 16-bit PCM WAVE file. Samples are
/// clamped to [-1, 1] before quantization.
pub fn encode_stereo_pcm16(left: &[f32], right: &[f32], sample_rate: u32) -> Vec<u8> {
    let frames = left.len().min(right.len());
    let data_bytes = (frames * 2 * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_bytes as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_bytes).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM format code
    out.extend_from_slice(&2u16.to_le_bytes()); // channels
    out.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate * 2 * 2;
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_bytes.to_le_bytes());
    for i in 0..frames {
        for sample in [left[i], right[i]] {
            let s = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            out.extend_from_slice(&s.to_le_bytes());
        }
    }
    out
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, Error> {
    let chunk: [u8; 4] = bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| Error::Decode("WAVE header truncated".to_string()))?;
    Ok(u32::from_le_bytes(chunk))
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16, Error> {
    let chunk: [u8; 2] = bytes
        .get(at..at + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| Error::Decode("WAVE header truncated".to_string()))?;
    Ok(u16::from_le_bytes(chunk))
}

/// Parse the header of a WAVE file, scanning chunks until `fmt ` and
/// `data` have both been seen.
pub fn parse_header(bytes: &[u8]) -> Result<WavHeader, Error> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(Error::Decode("not a RIFF/WAVE file".to_string()));
    }

    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut data_bytes: Option<u32> = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4)? as usize;
        match id {
            b"fmt " => {
                let format_code = read_u16(bytes, pos + 8)?;
                if format_code != 1 {
                    return Err(Error::Decode(format!(
                        "unsupported WAVE format code {}",
                        format_code
                    )));
                }
                fmt = Some((
                    read_u16(bytes, pos + 10)?,
                    read_u32(bytes, pos + 12)?,
                    read_u16(bytes, pos + 22)?,
                ));
            }
            b"data" => {
                data_bytes = Some(size as u32);
            }
            _ => {}
        }
        if let (Some(_), Some(_)) = (&fmt, &data_bytes) {
            break;
        }
        // Chunks are word-aligned.
        pos += 8 + size + (size & 1);
    }

    let (num_channels, sample_rate, bits_per_sample) =
        fmt.ok_or_else(|| Error::Decode("missing fmt chunk".to_string()))?;
    let data_bytes = data_bytes.ok_or_else(|| Error::Decode("missing data chunk".to_string()))?;
    Ok(WavHeader {
        num_channels,
        sample_rate,
        bits_per_sample,
        data_bytes,
    })
}
