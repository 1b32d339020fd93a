//! Model file provisioning.
//!
//! Checks that a variant's ONNX export is present and, for the small
//! variant, downloads the published export from HuggingFace on first use.
//! The larger variants have no hosted ONNX export, so missing files are
//! reported with the repository to convert from.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Result, WebdError};

use super::musicgen::{check_model_files, REQUIRED_MODEL_FILES};
use super::ModelVariant;

/// Hosted ONNX export of musicgen-small (fp16).
pub const SMALL_MODEL_URLS: &[(&str, &str)] = &[
    (
        "tokenizer.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/tokenizer.json",
    ),
    (
        "text_encoder.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/text_encoder.onnx",
    ),
    (
        "decoder_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_model.onnx",
    ),
    (
        "decoder_with_past_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_with_past_model.onnx",
    ),
    (
        "encodec_decode.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/encodec_decode.onnx",
    ),
];

/// Ensures all model files for a variant exist, downloading when possible.
pub fn ensure_models(variant: ModelVariant, model_dir: &Path) -> Result<()> {
    if check_model_files(model_dir, variant).is_ok() {
        return Ok(());
    }

    if variant != ModelVariant::Small {
        return Err(WebdError::model_not_found(format!(
            "{} (no hosted ONNX export for '{}'; convert {} and place the files there)",
            model_dir.display(),
            variant,
            variant.repo_id()
        )));
    }

    fs::create_dir_all(model_dir).map_err(|e| {
        WebdError::model_download_failed(format!(
            "Failed to create model directory {}: {}",
            model_dir.display(),
            e
        ))
    })?;

    let missing: Vec<&str> = REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|f| !model_dir.join(f).exists())
        .collect();

    info!(count = missing.len(), "downloading missing model files");

    for file in &missing {
        let url = SMALL_MODEL_URLS
            .iter()
            .find(|(name, _)| name == file)
            .map(|(_, url)| *url)
            .ok_or_else(|| {
                WebdError::model_download_failed(format!("No download URL for {}", file))
            })?;
        download_file_streaming(url, &model_dir.join(file))?;
    }

    check_model_files(model_dir, variant)
}

/// Downloads a file in chunks so multi-GB decoder weights stream to disk.
fn download_file_streaming(url: &str, dest: &Path) -> Result<()> {
    let file_name = dest.file_name().unwrap_or_default().to_string_lossy();
    info!(file = %file_name, "downloading");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| {
            WebdError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })?;

    let mut response = client.get(url).send().map_err(|e| {
        WebdError::model_download_failed(format!("Failed to download {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(WebdError::model_download_failed(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let mut file = fs::File::create(dest).map_err(|e| {
        WebdError::model_download_failed(format!(
            "Failed to create file {}: {}",
            dest.display(),
            e
        ))
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| {
            WebdError::model_download_failed(format!("Failed to read response: {}", e))
        })?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read]).map_err(|e| {
            WebdError::model_download_failed(format!("Failed to write file: {}", e))
        })?;
        downloaded += bytes_read as u64;
    }

    info!(
        file = %file_name,
        mb = format!("{:.1}", downloaded as f64 / (1024.0 * 1024.0)),
        "download complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_urls_cover_required_files() {
        for file in REQUIRED_MODEL_FILES {
            assert!(
                SMALL_MODEL_URLS.iter().any(|(name, _)| name == file),
                "missing URL for {}",
                file
            );
        }
    }

    #[test]
    fn non_small_variants_are_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_models(ModelVariant::Large, dir.path()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelNotFound);
        assert!(err.message.contains("facebook/musicgen-large"));
    }

    #[test]
    fn present_files_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        for file in REQUIRED_MODEL_FILES {
            std::fs::write(dir.path().join(file), b"stub").unwrap();
        }
        assert!(ensure_models(ModelVariant::Medium, dir.path()).is_ok());
    }
}
