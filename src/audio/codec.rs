//! # Audio Codec Utilities
//!
//! Pure conversion functions shared by the transcription pipeline:
//! float/int16 sample conversion, the uncompressed WAV container, and
//! linear-interpolation resampling. These run on whichever thread calls
//! them; the background worker re-exposes the heavy ones off the
//! interactive path (see `audio::worker` / `audio::bridge`).
//!
//! ## Container Layout:
//! 44-byte header (RIFF/WAVE magic, PCM format fields, sample rate, byte
//! counts) followed by 16-bit little-endian samples. Downstream consumers
//! may hash or persist the output, so the byte layout is exact:
//! - offset 4: `36 + 2 * sample_count` (u32 LE)
//! - offset 24: sample rate (u32 LE)
//! - offset 40: `2 * sample_count` (u32 LE)

use crate::error::{EngineError, EngineResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// WAV header size in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// Default inference sample rate (Whisper expects 16kHz mono).
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Convert float samples in [-1.0, 1.0] to 16-bit signed integers.
///
/// Each sample maps to `round(clamp(s, -1, 1) * 32767)`, clamped to the
/// asymmetric two's-complement range (floor -32768, ceiling 32767).
pub fn float_to_int16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = (s.clamp(-1.0, 1.0) * 32767.0).round();
            scaled.clamp(-32768.0, 32767.0) as i16
        })
        .collect()
}

/// Convert 16-bit PCM samples to floats in [-1.0, 1.0].
pub fn pcm_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Build an uncompressed mono 16-bit WAV container from float samples.
pub fn float_to_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);

    // RIFF chunk descriptor
    out.extend_from_slice(b"RIFF");
    out.write_u32::<LittleEndian>(36 + data_len).unwrap();
    out.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    out.extend_from_slice(b"fmt ");
    out.write_u32::<LittleEndian>(16).unwrap(); // Subchunk1Size (PCM)
    out.write_u16::<LittleEndian>(1).unwrap(); // AudioFormat (PCM)
    out.write_u16::<LittleEndian>(1).unwrap(); // NumChannels (mono)
    out.write_u32::<LittleEndian>(sample_rate).unwrap();
    out.write_u32::<LittleEndian>(sample_rate * 2).unwrap(); // ByteRate
    out.write_u16::<LittleEndian>(2).unwrap(); // BlockAlign
    out.write_u16::<LittleEndian>(16).unwrap(); // BitsPerSample

    // data sub-chunk
    out.extend_from_slice(b"data");
    out.write_u32::<LittleEndian>(data_len).unwrap();

    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let value = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
        out.write_i16::<LittleEndian>(value as i16).unwrap();
    }

    out
}

/// Parse a mono 16-bit WAV container back into float samples.
///
/// Validates the magic markers and the header length fields before
/// trusting the payload. Returns the samples and the container's sample
/// rate.
pub fn wav_to_float(bytes: &[u8]) -> EngineResult<(Vec<f32>, u32)> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(EngineError::InvalidContainer(format!(
            "container too short: {} bytes (header is {})",
            bytes.len(),
            WAV_HEADER_LEN
        )));
    }

    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(EngineError::InvalidContainer(
            "container magic markers missing".to_string(),
        ));
    }

    let mut cursor = Cursor::new(&bytes[24..28]);
    let sample_rate = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| EngineError::InvalidContainer(e.to_string()))?;

    let mut cursor = Cursor::new(&bytes[40..44]);
    let data_len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| EngineError::InvalidContainer(e.to_string()))? as usize;

    if bytes.len() != WAV_HEADER_LEN + data_len || data_len % 2 != 0 {
        return Err(EngineError::InvalidContainer(format!(
            "container length field inconsistent: data={} total={}",
            data_len,
            bytes.len()
        )));
    }

    let mut cursor = Cursor::new(&bytes[WAV_HEADER_LEN..]);
    let mut pcm = Vec::with_capacity(data_len / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        pcm.push(sample);
    }

    Ok((pcm_to_float(&pcm), sample_rate))
}

/// Downsample audio from `input_rate` to `target_rate` via linear
/// interpolation.
///
/// Identity when the rates are equal (the input allocation is returned
/// untouched). Upsampling is rejected with a defined error. The
/// interpolation window at the tail clamps to the last available sample
/// instead of reading out of bounds.
pub fn downsample_audio(
    audio: Vec<f32>,
    input_rate: u32,
    target_rate: u32,
) -> EngineResult<Vec<f32>> {
    if input_rate == target_rate {
        return Ok(audio);
    }

    if target_rate > input_rate {
        return Err(EngineError::UnsupportedRate {
            input: input_rate,
            target: target_rate,
        });
    }

    let ratio = input_rate as f64 / target_rate as f64;
    let new_len = (audio.len() as f64 / ratio).floor() as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let position = i as f64 * ratio;
        let index = position.floor() as usize;
        let decimal = (position - index as f64) as f32;

        let p0 = audio.get(index).copied().unwrap_or(0.0);
        let p1 = audio.get(index + 1).copied().unwrap_or(p0);

        result.push(p0 + decimal * (p1 - p0));
    }

    Ok(result)
}

/// Concatenate audio frames into a single contiguous buffer.
///
/// Total-length preserving; an empty list yields an empty result.
pub fn concatenate_frames(frames: &[Vec<f32>]) -> Vec<f32> {
    let total: usize = frames.iter().map(|f| f.len()).sum();
    let mut result = Vec::with_capacity(total);
    for frame in frames {
        result.extend_from_slice(frame);
    }
    result
}
