//! JSON-RPC server over stdin/stdout.
//!
//! Implements the JSON-RPC 2.0 protocol for daemon communication. The
//! main loop owns stdin; worker lifecycle events arrive through the
//! [`EventSink`] implementation and are pushed as notifications.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::generation::{EventSink, GenerationWorker, LifecycleEvent};
use crate::models::EngineLoader;
use crate::store::SettingsStore;

use super::methods::handle_request;
use super::types::{
    AddToQueueParams, FinishAudioParams, GenErrorParams, JobState, JsonRpcError,
    JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, StatusParams,
};

/// Forwards worker lifecycle events to the client as notifications.
pub struct NotificationSink;

impl EventSink for NotificationSink {
    fn emit(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Queued { prompt } => {
                send_notification("add_to_queue", AddToQueueParams { prompt });
            }
            LifecycleEvent::Started { prompt } => {
                send_notification(
                    "status",
                    StatusParams {
                        prompt,
                        state: JobState::Started,
                    },
                );
            }
            LifecycleEvent::Finished {
                prompt,
                artifact,
                elapsed_sec,
            } => {
                send_notification(
                    "on_finish_audio",
                    FinishAudioParams {
                        prompt: prompt.clone(),
                        filename: artifact.audio_file_name(),
                        json_filename: artifact.metadata_file_name(),
                        elapsed_sec,
                    },
                );
                send_notification(
                    "status",
                    StatusParams {
                        prompt,
                        state: JobState::Finished,
                    },
                );
            }
            LifecycleEvent::Failed { prompt, message } => {
                send_notification(
                    "gen_error",
                    GenErrorParams {
                        prompt: prompt.clone(),
                        message,
                    },
                );
                send_notification(
                    "status",
                    StatusParams {
                        prompt,
                        state: JobState::Error,
                    },
                );
            }
        }
    }
}

/// State shared across all request handlers.
pub struct ServerState {
    /// Handle to the background generation thread.
    pub worker: GenerationWorker,
    /// Sink shared with the worker, used for submission-time events.
    pub sink: Arc<NotificationSink>,
    /// Last-run settings persistence.
    pub settings: SettingsStore,
    /// Daemon configuration.
    pub config: DaemonConfig,
    /// Flag to signal server shutdown.
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Creates server state and spawns the generation worker.
    pub fn new(config: DaemonConfig, loader: Box<dyn EngineLoader>) -> Self {
        let sink = Arc::new(NotificationSink);
        let worker = GenerationWorker::start(
            loader,
            config.effective_audio_path(),
            sink.clone() as Arc<dyn EventSink>,
        );
        let settings = SettingsStore::new(config.effective_settings_path());
        Self {
            worker,
            sink,
            settings,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs the JSON-RPC server, reading from stdin and writing to stdout.
pub fn run_server(mut state: ServerState) -> Result<()> {
    let stdin = io::stdin();
    let reader = stdin.lock();

    info!("JSON-RPC server started, waiting for requests");

    // Let the client render existing tracks before the first request.
    send_notification(
        "audio_pairs",
        super::types::AudioPairsParams {
            pairs: crate::store::list_artifact_pairs(&state.config.effective_audio_path()),
        },
    );

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Error reading stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = process_request(&line, &mut state) {
            write_line(&response);
        }

        if state.is_shutdown() {
            info!("Server shutdown requested");
            break;
        }
    }

    info!("JSON-RPC server stopped");
    Ok(())
}

/// Processes a single JSON-RPC request line.
fn process_request(line: &str, state: &mut ServerState) -> Option<String> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let error = JsonRpcErrorResponse::new(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            );
            return Some(serde_json::to_string(&error).unwrap_or_default());
        }
    };

    if request.jsonrpc != "2.0" {
        let error = JsonRpcErrorResponse::new(
            Some(request.id),
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        );
        return Some(serde_json::to_string(&error).unwrap_or_default());
    }

    let result = handle_request(&request.method, request.params.clone(), state);

    match result {
        Ok(response) => Some(
            serde_json::to_string(&serde_json::json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "result": response
            }))
            .unwrap_or_default(),
        ),
        Err(error) => Some(
            serde_json::to_string(&JsonRpcErrorResponse::new(Some(request.id), error))
                .unwrap_or_default(),
        ),
    }
}

/// Sends a JSON-RPC notification to stdout. Under test the line is
/// captured per thread instead, so handlers can be asserted on.
pub fn send_notification<T: serde::Serialize>(method: &'static str, params: T) {
    let notification = JsonRpcNotification::new(method, params);
    if let Ok(json) = serde_json::to_string(&notification) {
        #[cfg(test)]
        notification_log::record(&json);
        #[cfg(not(test))]
        write_line(&json);
    }
}


// One locked write per line keeps worker notifications from splicing
// into responses.
fn write_line(json: &str) {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json).ok();
    stdout.flush().ok();
}
