//! Loudness normalization and peak limiting.
//!
//! Generated waveforms come out of the codec at unpredictable levels.
//! Before export the signal is brought to a target RMS level below full
//! scale and run through a soft limiter so transient peaks cannot clip.

/// Floor used when a waveform is effectively silent. Avoids dividing by
/// a zero RMS and blowing the gain up to infinity.
const SILENCE_RMS: f32 = 1e-8;

/// Computes the RMS level of a waveform in dBFS.
pub fn rms_dbfs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (energy / samples.len() as f64).sqrt() as f32;
    20.0 * rms.max(SILENCE_RMS).log10()
}

/// Normalizes a waveform to sit `headroom_db` below full scale (RMS),
/// then applies a tanh soft limiter to catch peaks pushed past 1.0.
///
/// A silent waveform is returned untouched rather than amplified.
pub fn normalize(samples: &mut [f32], headroom_db: f32) {
    let current = rms_dbfs(samples);
    if current == f32::NEG_INFINITY || current <= 20.0 * SILENCE_RMS.log10() {
        return;
    }

    let target = -headroom_db.abs();
    let gain = 10.0f32.powf((target - current) / 20.0);

    for s in samples.iter_mut() {
        *s = (*s * gain).tanh();
    }
}
