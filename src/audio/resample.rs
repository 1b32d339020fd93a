//! Sample rate conversion.
//!
//! MusicGen decodes at 32kHz; the optional 44.1kHz export step and melody
//! conditioning both go through [`resample_to`].

use rubato::{FftFixedIn, Resampler};

use crate::error::{Result, WebdError};

/// Frames fed to the resampler per process call.
const CHUNK: usize = 1024;

/// Resamples a mono waveform from one rate to another.
///
/// Returns the input unchanged when the rates already match. The output
/// is trimmed to the expected length so the FFT resampler's trailing
/// zero padding does not leak into the file.
pub fn resample_to(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, 2, 1)
        .map_err(|e| WebdError::export_failed(format!("Failed to create resampler: {}", e)))?;

    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let mut out = Vec::with_capacity(expected_len + CHUNK);

    // Feed fixed-size chunks, zero-padding the tail, then trim the output
    // back to the expected frame count.
    let mut pos = 0;
    while pos < samples.len() {
        let end = (pos + CHUNK).min(samples.len());
        let mut input_chunk = vec![0.0f32; CHUNK];
        input_chunk[..end - pos].copy_from_slice(&samples[pos..end]);

        let frames = resampler
            .process(&[input_chunk], None)
            .map_err(|e| WebdError::export_failed(format!("Resampling failed: {}", e)))?;
        out.extend_from_slice(&frames[0]);
        pos = end;
    }

    out.truncate(expected_len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let samples = vec![0.1f32, -0.2, 0.3];
        let out = resample_to(&samples, 32000, 32000).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn empty_input_stays_empty() {
        let out = resample_to(&[], 32000, 44100).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn output_length_matches_rate_ratio() {
        let samples = vec![0.0f32; 32000];
        let out = resample_to(&samples, 32000, 44100).unwrap();
        assert_eq!(out.len(), 44100);
    }

    #[test]
    fn downsample_halves_length() {
        let samples: Vec<f32> = (0..8000)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();
        let out = resample_to(&samples, 32000, 16000).unwrap();
        assert_eq!(out.len(), 4000);
    }
}
