//! # Audio Decoding
//!
//! Turns uploaded audio payloads into the 16 kHz mono f32 samples the
//! Whisper model consumes. Supports RIFF/WAVE containers with 8-bit,
//! 16-bit PCM or 32-bit float data; multi-channel audio is downmixed by
//! averaging and other sample rates are linearly resampled.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Sample rate expected by the model.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

struct WavFormat {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// Decode a WAV payload into 16 kHz mono f32 samples in [-1.0, 1.0].
pub fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("payload is not a RIFF/WAVE file".to_string());
    }

    let mut format: Option<WavFormat> = None;
    let mut data: Option<&[u8]> = None;

    // Walk the chunk list; anything other than fmt/data is skipped.
    let mut offset = 12usize;
    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let body_start = offset + 8;
        let body_end = (body_start + chunk_size).min(bytes.len());

        match chunk_id {
            b"fmt " => {
                format = Some(parse_fmt_chunk(&bytes[body_start..body_end])?);
            }
            b"data" => {
                data = Some(&bytes[body_start..body_end]);
            }
            _ => {}
        }
        // Chunks are word-aligned.
        offset = body_start + chunk_size + (chunk_size & 1);
    }

    let format = format.ok_or_else(|| "missing fmt chunk".to_string())?;
    let data = data.ok_or_else(|| "missing data chunk".to_string())?;
    if format.channels == 0 {
        return Err("WAV declares zero channels".to_string());
    }

    let interleaved = decode_samples(data, &format)?;
    if interleaved.is_empty() {
        return Err("WAV contains no audio samples".to_string());
    }

    let mono = downmix(&interleaved, format.channels as usize);
    Ok(resample(&mono, format.sample_rate, TARGET_SAMPLE_RATE))
}

fn parse_fmt_chunk(body: &[u8]) -> Result<WavFormat, String> {
    let mut cursor = Cursor::new(body);
    let audio_format = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| "truncated fmt chunk".to_string())?;
    let channels = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| "truncated fmt chunk".to_string())?;
    let sample_rate = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| "truncated fmt chunk".to_string())?;
    // Skip byte rate and block align.
    cursor
        .read_u32::<LittleEndian>()
        .and(cursor.read_u16::<LittleEndian>())
        .map_err(|_| "truncated fmt chunk".to_string())?;
    let bits_per_sample = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| "truncated fmt chunk".to_string())?;

    Ok(WavFormat {
        audio_format,
        channels,
        sample_rate,
        bits_per_sample,
    })
}

fn decode_samples(data: &[u8], format: &WavFormat) -> Result<Vec<f32>, String> {
    match (format.audio_format, format.bits_per_sample) {
        (FORMAT_PCM, 16) => {
            let mut cursor = Cursor::new(data);
            let mut samples = Vec::with_capacity(data.len() / 2);
            while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
                samples.push(sample as f32 / 32768.0);
            }
            Ok(samples)
        }
        (FORMAT_PCM, 8) => Ok(data
            .iter()
            .map(|&b| (b as f32 - 128.0) / 128.0)
            .collect()),
        (FORMAT_IEEE_FLOAT, 32) => {
            let mut cursor = Cursor::new(data);
            let mut samples = Vec::with_capacity(data.len() / 4);
            while let Ok(sample) = cursor.read_f32::<LittleEndian>() {
                samples.push(sample);
            }
            Ok(samples)
        }
        (fmt, bits) => Err(format!(
            "unsupported WAV encoding (format {}, {} bits per sample)",
            fmt, bits
        )),
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler. Good enough for speech input; anything
/// fancier belongs in the client.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let position = i as f64 * ratio;
        let index = position.floor() as usize;
        let frac = (position - index as f64) as f32;
        let current = samples[index.min(samples.len() - 1)];
        let next = samples[(index + 1).min(samples.len() - 1)];
        out.push(current + (next - current) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn make_wav(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.write_u32::<LittleEndian>(36 + data_len).unwrap();
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.write_u32::<LittleEndian>(16).unwrap();
        bytes.write_u16::<LittleEndian>(FORMAT_PCM).unwrap();
        bytes.write_u16::<LittleEndian>(channels).unwrap();
        bytes.write_u32::<LittleEndian>(sample_rate).unwrap();
        bytes
            .write_u32::<LittleEndian>(sample_rate * channels as u32 * 2)
            .unwrap();
        bytes.write_u16::<LittleEndian>(channels * 2).unwrap();
        bytes.write_u16::<LittleEndian>(16).unwrap();
        bytes.extend_from_slice(b"data");
        bytes.write_u32::<LittleEndian>(data_len).unwrap();
        for &sample in samples {
            bytes.write_i16::<LittleEndian>(sample).unwrap();
        }
        bytes
    }

    #[test]
    fn decodes_mono_pcm16_at_target_rate() {
        let samples = vec![0i16, 16384, -16384, 32767];
        let wav = make_wav(&samples, 1, TARGET_SAMPLE_RATE);

        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.len(), 4);
        assert!((decoded[1] - 0.5).abs() < 0.001);
        assert!((decoded[2] + 0.5).abs() < 0.001);
    }

    #[test]
    fn downmixes_stereo_to_mono() {
        // L/R pairs average to zero and to 0.5.
        let samples = vec![16384i16, -16384, 16384, 16384];
        let wav = make_wav(&samples, 2, TARGET_SAMPLE_RATE);

        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].abs() < 0.001);
        assert!((decoded[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn resamples_to_sixteen_khz() {
        let samples = vec![0i16; 8000];
        let wav = make_wav(&samples, 1, 8000);

        let decoded = decode_wav(&wav).unwrap();
        // One second of 8 kHz audio becomes one second at 16 kHz.
        assert!((decoded.len() as i64 - 16000).abs() <= 2);
    }

    #[test]
    fn rejects_non_wav_payload() {
        assert!(decode_wav(b"not audio at all").is_err());
        assert!(decode_wav(&[]).is_err());
    }

    #[test]
    fn rejects_wav_without_data_chunk() {
        let mut wav = make_wav(&[0i16; 4], 1, TARGET_SAMPLE_RATE);
        wav.truncate(20);
        assert!(decode_wav(&wav).is_err());
    }
}
