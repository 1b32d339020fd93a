//! JSON-RPC method handlers.
//!
//! Implements the handlers for all supported JSON-RPC methods.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use tracing::warn;

use crate::audio::read_wav_mono;
use crate::models::ModelVariant;
use crate::params::ParameterSet;
use crate::store::list_artifact_pairs;
use crate::types::{GenerationRequest, LastRunSettings, MelodyReference};

use super::server::{send_notification, ServerState};
use super::types::{
    AudioPairsParams, ErrorMessageParams, JsonRpcError, SubmitParams, SubmitResult,
    UploadMelodyParams, UploadMelodyResult,
};

/// Handles a JSON-RPC method call.
pub fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "submit" => handle_submit(params, state),
        "upload_melody" => handle_upload_melody(params, state),
        "list_tracks" => handle_list_tracks(state),
        "get_settings" => handle_get_settings(state),
        "ping" => handle_ping(),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<serde_json::Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Handles the shutdown method.
fn handle_shutdown(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

/// Handles the submit method: validates, persists settings, enqueues.
fn handle_submit(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: SubmitParams = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?;

    let prompt = params.prompt.trim().to_string();
    if prompt.is_empty() {
        // Rejected submissions notify as well, so the front end can show
        // the failure without matching up the RPC response.
        send_notification(
            "error",
            ErrorMessageParams {
                prompt: prompt.clone(),
                message: "Prompt cannot be empty".to_string(),
            },
        );
        return Err(JsonRpcError::invalid_prompt("Prompt cannot be empty"));
    }

    let variant = match params.model.as_deref() {
        Some(name) => ModelVariant::parse(name)
            .ok_or_else(|| JsonRpcError::model_not_found(format!("Unknown model: {}", name)))?,
        None => state.config.default_model,
    };

    let parameter_set = ParameterSet::normalize(&params.values, params.advanced_expanded);

    let melody = if variant.requires_melody() {
        let melody_url = match params.melody_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => {
                send_notification(
                    "error",
                    ErrorMessageParams {
                        prompt: prompt.clone(),
                        message: "No melody file has been uploaded".to_string(),
                    },
                );
                return Err(JsonRpcError::melody_required(
                    "The melody model needs an uploaded melody file",
                ));
            }
        };
        match load_melody(&state.config.effective_melody_scratch_path(), melody_url) {
            Ok(melody) => Some(melody),
            // Resolution failures notify like every rejected submission
            // before surfacing the RPC error.
            Err(err) => {
                let message = err
                    .data
                    .as_ref()
                    .and_then(|d| d.details.clone())
                    .unwrap_or_else(|| err.message.clone());
                send_notification(
                    "error",
                    ErrorMessageParams {
                        prompt: prompt.clone(),
                        message,
                    },
                );
                return Err(err);
            }
        }
    } else {
        None
    };

    let settings = LastRunSettings {
        model: variant.as_str().to_string(),
        prompt: prompt.clone(),
        parameters: parameter_set.to_json(),
    };
    if let Err(e) = state.settings.save_last_run(&settings) {
        warn!("Failed to persist last-run settings: {}", e);
    }

    let mut request = GenerationRequest::new(variant, prompt, parameter_set);
    if let Some(melody) = melody {
        request = request.with_melody(melody);
    }
    state.worker.submit(request, state.sink.as_ref());

    Ok(serde_json::to_value(SubmitResult { status: "queued" })
        .map_err(|e| JsonRpcError::internal_error(e.to_string()))?)
}

/// Resolves and reads an uploaded melody file.
///
/// The path must land inside the scratch directory once symlinks are
/// resolved. The front end only ever sends back paths this daemon handed
/// out, so anything else is treated as invalid rather than an accident.
fn load_melody(scratch: &Path, melody_url: &str) -> Result<MelodyReference, JsonRpcError> {
    let scratch = scratch
        .canonicalize()
        .map_err(|_| JsonRpcError::invalid_melody("No melody has been uploaded"))?;

    let raw = Path::new(melody_url);
    let candidate = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        scratch.join(raw)
    };
    let resolved = candidate
        .canonicalize()
        .map_err(|_| JsonRpcError::invalid_melody(format!("Melody file not found: {}", melody_url)))?;
    if !resolved.starts_with(&scratch) {
        return Err(JsonRpcError::invalid_melody(
            "Melody path is outside the upload directory",
        ));
    }

    let (samples, sample_rate) = read_wav_mono(&resolved).map_err(JsonRpcError::from)?;
    if samples.is_empty() {
        return Err(JsonRpcError::invalid_melody("Melody file contains no audio"));
    }
    Ok(MelodyReference {
        samples,
        sample_rate,
    })
}

/// Handles the upload_melody method.
///
/// Only one melody is kept at a time: each upload clears the scratch
/// directory before writing.
fn handle_upload_melody(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: UploadMelodyParams = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?;

    if !params.content_type.starts_with("audio/") {
        return Err(JsonRpcError::invalid_melody(format!(
            "Not an audio file: {}",
            params.content_type
        )));
    }

    let data = base64::engine::general_purpose::STANDARD
        .decode(&params.data)
        .map_err(|e| JsonRpcError::invalid_melody(format!("Invalid base64 payload: {}", e)))?;
    if data.is_empty() {
        return Err(JsonRpcError::invalid_melody("Empty melody payload"));
    }

    // Strip any directory components the client sent along.
    let file_name = Path::new(&params.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| JsonRpcError::invalid_melody("Invalid melody file name"))?;

    let scratch = state.config.effective_melody_scratch_path();
    clear_dir(&scratch)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to reset upload dir: {}", e)))?;

    let path = scratch.join(file_name);
    fs::write(&path, &data)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to store melody: {}", e)))?;

    Ok(serde_json::to_value(UploadMelodyResult {
        file_path: path.to_string_lossy().into_owned(),
    })
    .map_err(|e| JsonRpcError::internal_error(e.to_string()))?)
}

fn clear_dir(dir: &PathBuf) -> std::io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Handles the list_tracks method.
fn handle_list_tracks(state: &ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let pairs = list_artifact_pairs(&state.config.effective_audio_path());
    serde_json::to_value(AudioPairsParams { pairs })
        .map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Handles the get_settings method.
fn handle_get_settings(state: &ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let settings = state.settings.load_last_run();
    serde_json::to_value(settings).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;
    use crate::config::DaemonConfig;
    use crate::models::engine::test_support::StubLoader;
    use crate::rpc::server::notification_log;
    use tempfile::TempDir;

    /// Parsed `error` notifications sent on this thread so far.
    fn error_notifications() -> Vec<serde_json::Value> {
        notification_log::take()
            .iter()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .filter(|v| v["method"] == "error")
            .collect()
    }

    fn test_state() -> (TempDir, ServerState) {
        let dir = TempDir::new().unwrap();
        let config = DaemonConfig {
            model_path: None,
            audio_path: Some(dir.path().join("audio")),
            melody_scratch_path: Some(dir.path().join("melody")),
            settings_path: Some(dir.path().join("settings.json")),
            default_model: Default::default(),
            threads: None,
        };
        let state = ServerState::new(config, Box::new(StubLoader::new()));
        (dir, state)
    }

    fn melody_base64(dir: &Path) -> String {
        let path = dir.join("src.wav");
        write_wav(&vec![0.1f32; 800], &path, 32000).unwrap();
        base64::engine::general_purpose::STANDARD.encode(fs::read(&path).unwrap())
    }

    #[test]
    fn submit_rejects_empty_prompt() {
        let (_dir, mut state) = test_state();
        let err = handle_submit(
            serde_json::json!({"prompt": "   "}),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32004);

        let errors = error_notifications();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["params"]["message"], "Prompt cannot be empty");
    }

    #[test]
    fn submit_rejects_unknown_model() {
        let (_dir, mut state) = test_state();
        let err = handle_submit(
            serde_json::json!({"prompt": "lofi", "model": "gigantic"}),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32000);
    }

    #[test]
    fn submit_queues_with_defaults() {
        let (_dir, mut state) = test_state();
        let result = handle_submit(
            serde_json::json!({"prompt": "night drive", "model": "small"}),
            &mut state,
        )
        .unwrap();
        assert_eq!(result["status"], "queued");

        // Settings were saved before the job ran.
        let saved = state.settings.load_last_run();
        assert_eq!(saved.model, "small");
        assert_eq!(saved.prompt, "night drive");
    }

    #[test]
    fn submit_melody_model_without_upload_fails() {
        let (_dir, mut state) = test_state();
        let err = handle_submit(
            serde_json::json!({"prompt": "hum this", "model": "melody"}),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32005);

        let errors = error_notifications();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["params"]["prompt"], "hum this");
        assert_eq!(
            errors[0]["params"]["message"],
            "No melody file has been uploaded"
        );
    }

    #[test]
    fn upload_then_submit_melody_model() {
        let (dir, mut state) = test_state();
        let data = melody_base64(dir.path());

        let uploaded = handle_upload_melody(
            serde_json::json!({
                "file_name": "riff.wav",
                "content_type": "audio/wav",
                "data": data,
            }),
            &mut state,
        )
        .unwrap();
        let file_path = uploaded["file_path"].as_str().unwrap().to_string();
        assert!(file_path.ends_with("riff.wav"));

        let result = handle_submit(
            serde_json::json!({
                "prompt": "hum this",
                "model": "melody",
                "melody_url": file_path,
            }),
            &mut state,
        )
        .unwrap();
        assert_eq!(result["status"], "queued");
    }

    #[test]
    fn upload_rejects_non_audio() {
        let (_dir, mut state) = test_state();
        let err = handle_upload_melody(
            serde_json::json!({
                "file_name": "riff.wav",
                "content_type": "text/plain",
                "data": "YWJj",
            }),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32006);
    }

    #[test]
    fn upload_replaces_previous_melody() {
        let (dir, mut state) = test_state();
        let data = melody_base64(dir.path());

        for name in ["first.wav", "second.wav"] {
            handle_upload_melody(
                serde_json::json!({
                    "file_name": name,
                    "content_type": "audio/wav",
                    "data": data.clone(),
                }),
                &mut state,
            )
            .unwrap();
        }

        let scratch = state.config.effective_melody_scratch_path();
        let names: Vec<String> = fs::read_dir(&scratch)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["second.wav"]);
    }

    #[test]
    fn upload_strips_path_components() {
        let (dir, mut state) = test_state();
        let data = melody_base64(dir.path());

        let uploaded = handle_upload_melody(
            serde_json::json!({
                "file_name": "../../etc/riff.wav",
                "content_type": "audio/wav",
                "data": data,
            }),
            &mut state,
        )
        .unwrap();
        let file_path = uploaded["file_path"].as_str().unwrap();
        let scratch = state.config.effective_melody_scratch_path();
        assert_eq!(
            Path::new(file_path),
            scratch.join("riff.wav").as_path()
        );
    }

    #[test]
    fn melody_outside_scratch_is_rejected() {
        let (dir, mut state) = test_state();
        let data = melody_base64(dir.path());
        // Make the scratch dir exist but point at a file elsewhere.
        handle_upload_melody(
            serde_json::json!({
                "file_name": "inside.wav",
                "content_type": "audio/wav",
                "data": data,
            }),
            &mut state,
        )
        .unwrap();

        notification_log::take();
        let err = handle_submit(
            serde_json::json!({
                "prompt": "hum this",
                "model": "melody",
                "melody_url": dir.path().join("src.wav").to_string_lossy(),
            }),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32006);

        let errors = error_notifications();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["params"]["prompt"], "hum this");
        assert_eq!(
            errors[0]["params"]["message"],
            "Melody path is outside the upload directory"
        );
    }

    #[test]
    fn missing_melody_file_notifies_error() {
        let (dir, mut state) = test_state();
        let data = melody_base64(dir.path());
        // Something must be uploaded first so the scratch dir exists.
        handle_upload_melody(
            serde_json::json!({
                "file_name": "inside.wav",
                "content_type": "audio/wav",
                "data": data,
            }),
            &mut state,
        )
        .unwrap();

        notification_log::take();
        let err = handle_submit(
            serde_json::json!({
                "prompt": "hum this",
                "model": "melody",
                "melody_url": "gone.wav",
            }),
            &mut state,
        )
        .unwrap_err();
        assert_eq!(err.code, -32006);

        let errors = error_notifications();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["params"]["prompt"], "hum this");
        assert_eq!(
            errors[0]["params"]["message"],
            "Melody file not found: gone.wav"
        );
    }

    #[test]
    fn list_tracks_reports_pairs() {
        let (_dir, mut state) = test_state();
        let audio_dir = state.config.effective_audio_path();
        fs::create_dir_all(&audio_dir).unwrap();
        fs::write(audio_dir.join("a.wav"), b"x").unwrap();
        fs::write(audio_dir.join("a.json"), b"x").unwrap();

        let result = handle_list_tracks(&mut state).unwrap();
        assert_eq!(result["pairs"][0][0], "a.wav");
        assert_eq!(result["pairs"][0][1], "a.json");
    }

    #[test]
    fn get_settings_defaults_before_first_submit() {
        let (_dir, state) = test_state();
        let result = handle_get_settings(&state).unwrap();
        assert_eq!(result["model"], "large");
        assert_eq!(result["parameters"]["duration"], 30);
    }
}
