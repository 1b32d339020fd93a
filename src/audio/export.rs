//! Export pipeline for generated audio.
//!
//! Takes a raw mono waveform off the inference engine and turns it into
//! an on-disk artifact: fades, loudness normalization, an optional
//! 44.1kHz resample, a prompt-derived file name, and a JSON sidecar with
//! the full parameter set.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::audio::loudness::normalize;
use crate::audio::resample::resample_to;
use crate::audio::wav::write_wav;
use crate::error::{Result, WebdError};
use crate::models::ModelVariant;
use crate::params::{ParameterSet, DEFAULT_LOUDNESS_HEADROOM_DB};
use crate::types::{GeneratedArtifact, ResampleOutcome};

/// Maximum length of a prompt-derived file name stem.
const MAX_SLUG_LEN: usize = 80;

/// Target rate for the optional resample step.
const EXPORT_RATE: u32 = 44100;

/// Derives a filesystem-safe file name stem from a prompt.
///
/// Keeps ASCII alphanumerics, underscores, hyphens and spaces, collapses
/// whitespace runs, and caps the result at 80 characters. A prompt with
/// nothing usable falls back to a content hash so distinct prompts still
/// get distinct names.
pub fn sanitize_slug(prompt: &str) -> String {
    let mut slug = String::with_capacity(prompt.len().min(MAX_SLUG_LEN));
    let mut last_space = true;
    for c in prompt.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
            last_space = false;
        } else if c.is_whitespace() && !last_space {
            slug.push(' ');
            last_space = true;
        }
    }
    let slug = slug.trim().to_string();
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end().to_string();

    if slug.is_empty() {
        let digest = Sha256::digest(prompt.as_bytes());
        format!("audio-{}", &hex::encode(digest)[..8])
    } else {
        slug
    }
}

/// Picks an unused `base.wav` / `base.json` pair under `dir`, appending
/// `(1)`, `(2)`, ... to the stem when either file already exists.
fn unique_pair(dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
    let mut candidate = stem.to_string();
    let mut counter = 0u32;
    loop {
        let audio = dir.join(format!("{}.wav", candidate));
        let meta = dir.join(format!("{}.json", candidate));
        if !audio.exists() && !meta.exists() {
            return (audio, meta);
        }
        counter += 1;
        candidate = format!("{}({})", stem, counter);
    }
}

/// Applies linear fade-in and fade-out in place.
///
/// Skipped entirely when the waveform is not longer than twice the fade,
/// so very short clips keep their energy.
pub fn apply_fades(samples: &mut [f32], sample_rate: u32, fade_ms: u32) {
    let fade_len = (sample_rate as u64 * fade_ms as u64 / 1000) as usize;
    if fade_len == 0 || samples.len() <= fade_len * 2 {
        return;
    }

    for i in 0..fade_len {
        let gain = i as f32 / fade_len as f32;
        samples[i] *= gain;
    }
    let n = samples.len();
    for i in 0..fade_len {
        let gain = i as f32 / fade_len as f32;
        samples[n - 1 - i] *= gain;
    }
}

/// Post-processes and writes a generated waveform plus its metadata
/// sidecar. Returns the artifact describing both files.
pub fn export(
    dir: &Path,
    variant: ModelVariant,
    prompt: &str,
    samples: Vec<f32>,
    sample_rate: u32,
    params: &ParameterSet,
) -> Result<GeneratedArtifact> {
    export_with(dir, variant, prompt, samples, sample_rate, params, resample_to)
}

/// Export with an explicit resample function, so the degraded path can
/// be driven without a broken resampler.
fn export_with(
    dir: &Path,
    variant: ModelVariant,
    prompt: &str,
    mut samples: Vec<f32>,
    sample_rate: u32,
    params: &ParameterSet,
    resample: fn(&[f32], u32, u32) -> Result<Vec<f32>>,
) -> Result<GeneratedArtifact> {
    fs::create_dir_all(dir)
        .map_err(|e| WebdError::export_failed(format!("Failed to create output dir: {}", e)))?;

    if let Some(fade_ms) = params.fade_ms {
        apply_fades(&mut samples, sample_rate, fade_ms);
    }

    let headroom = params
        .loudness_headroom_db
        .unwrap_or(DEFAULT_LOUDNESS_HEADROOM_DB);
    normalize(&mut samples, headroom);

    let stem = sanitize_slug(prompt);
    let (audio_path, metadata_path) = unique_pair(dir, &stem);

    // Resampling is best effort: a failure keeps the native-rate file
    // and the export still succeeds.
    let mut out_rate = sample_rate;
    let resample = if params.resample_44k == Some(true) && sample_rate != EXPORT_RATE {
        match resample(&samples, sample_rate, EXPORT_RATE) {
            Ok(resampled) => {
                samples = resampled;
                normalize(&mut samples, headroom);
                out_rate = EXPORT_RATE;
                ResampleOutcome::Done
            }
            Err(e) => {
                warn!("44.1kHz resample failed, keeping {}Hz: {}", sample_rate, e);
                ResampleOutcome::Degraded(e.message)
            }
        }
    } else {
        ResampleOutcome::NotRequested
    };

    write_wav(&samples, &audio_path, out_rate)?;

    let created_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let parameters = params.to_json();

    let sidecar = serde_json::json!({
        "model": variant.as_str(),
        "prompt": prompt,
        "parameters": parameters,
        "generated_at": created_at,
    });
    let body = serde_json::to_string_pretty(&sidecar)
        .map_err(|e| WebdError::export_failed(format!("Failed to serialize metadata: {}", e)))?;
    fs::write(&metadata_path, body)
        .map_err(|e| WebdError::export_failed(format!("Failed to write metadata: {}", e)))?;

    debug!(
        audio = %audio_path.display(),
        rate = out_rate,
        "Exported generated audio"
    );

    Ok(GeneratedArtifact {
        audio_path,
        metadata_path,
        variant,
        prompt: prompt.to_string(),
        parameters,
        created_at,
        resample,
    })
}
