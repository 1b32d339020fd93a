//! WAV file I/O.
//!
//! Writes generated mono waveforms and reads uploaded melody files using
//! the hound crate.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, WebdError};

/// Number of output channels. MusicGen decodes a mono waveform and we
/// store it as such; the front end's player upmixes.
pub const CHANNELS: u16 = 1;

/// Writes mono audio samples to a WAV file.
pub fn write_wav(samples: &[f32], path: &Path, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| WebdError::export_failed(format!("Failed to create WAV file: {}", e)))?;

    for sample in samples {
        writer
            .write_sample(*sample)
            .map_err(|e| WebdError::export_failed(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| WebdError::export_failed(format!("Failed to finalize WAV file: {}", e)))?;

    Ok(())
}

/// Reads a WAV file as a mono f32 waveform.
///
/// Multi-channel files are mixed down by averaging; integer formats are
/// scaled to [-1, 1]. Returns the samples and the file's sample rate.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)
        .map_err(|e| WebdError::invalid_melody(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| WebdError::invalid_melody(format!("bad float sample: {}", e)))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| WebdError::invalid_melody(format!("bad int sample: {}", e)))?
        }
    };

    let mut mono = Vec::with_capacity(interleaved.len() / channels);
    for frame in interleaved.chunks_exact(channels) {
        mono.push(frame.iter().sum::<f32>() / channels as f32);
    }

    Ok((mono, spec.sample_rate))
}

/// Calculates the duration of audio in seconds from sample count.
pub fn samples_to_duration(sample_count: usize, sample_rate: u32) -> f32 {
    sample_count as f32 / sample_rate as f32
}
