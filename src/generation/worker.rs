//! Background generation worker.
//!
//! One thread owns the [`ModelManager`] and drains an unbounded FIFO
//! channel of requests. Jobs never run concurrently and never retry;
//! a failed job reports its error and the worker moves on.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{error, info};

use crate::audio::export;
use crate::generation::invoke::run_inference;
use crate::models::{EngineLoader, ModelManager};
use crate::types::{GeneratedArtifact, GenerationRequest};

/// Maximum length of an error message forwarded to clients.
const MAX_ERROR_LEN: usize = 200;

/// Job lifecycle notifications, in the order a job passes through them.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// The request was accepted onto the queue.
    Queued { prompt: String },
    /// The worker picked the request up and inference began.
    Started { prompt: String },
    /// Audio was generated and exported.
    Finished {
        prompt: String,
        artifact: GeneratedArtifact,
        elapsed_sec: f64,
    },
    /// The job failed; `message` is already truncated for clients.
    Failed { prompt: String, message: String },
}

/// Receiver for lifecycle events, implemented by the RPC layer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

enum WorkerMessage {
    Job(Box<GenerationRequest>),
    Shutdown,
}

/// Handle to the single background generation thread.
///
/// Dropping the worker shuts the thread down after any in-flight job
/// completes; queued jobs behind it are discarded.
pub struct GenerationWorker {
    tx: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    /// Spawns the worker thread. The thread owns the model manager, so
    /// the first job on each variant pays the load cost.
    pub fn start(
        loader: Box<dyn EngineLoader>,
        audio_dir: PathBuf,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let thread_sink = Arc::clone(&sink);

        let handle = thread::Builder::new()
            .name("generation-worker".to_string())
            .spawn(move || {
                let mut manager = ModelManager::new(loader);
                while let Ok(message) = rx.recv() {
                    match message {
                        WorkerMessage::Job(request) => {
                            process_job(&mut manager, &audio_dir, &thread_sink, *request);
                        }
                        WorkerMessage::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn generation worker thread");

        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Enqueues a request. Emits `Queued` immediately so clients see the
    /// acceptance before any later event for the same job.
    pub fn submit(&self, request: GenerationRequest, sink: &dyn EventSink) {
        let prompt = request.prompt.clone();
        sink.emit(LifecycleEvent::Queued {
            prompt: prompt.clone(),
        });
        // The receiver only disappears after Shutdown; a queued job must
        // still reach a terminal state.
        if self.tx.send(WorkerMessage::Job(Box::new(request))).is_err() {
            sink.emit(LifecycleEvent::Failed {
                prompt,
                message: "Generation worker is not running".to_string(),
            });
        }
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn process_job(
    manager: &mut ModelManager,
    audio_dir: &PathBuf,
    sink: &Arc<dyn EventSink>,
    mut request: GenerationRequest,
) {
    let prompt = request.prompt.clone();
    sink.emit(LifecycleEvent::Started {
        prompt: prompt.clone(),
    });
    info!(model = %request.variant, prompt = %prompt, "Starting generation");

    let started = Instant::now();
    let result = manager.ensure_loaded(request.variant).and_then(|engine| {
        let samples = run_inference(
            engine,
            &request.prompt,
            &mut request.params,
            request.melody.as_ref(),
        )?;
        let sample_rate = engine.sample_rate();
        export(
            audio_dir,
            request.variant,
            &request.prompt,
            samples,
            sample_rate,
            &request.params,
        )
    });

    match result {
        Ok(artifact) => {
            let elapsed_sec = started.elapsed().as_secs_f64();
            info!(
                file = %artifact.audio_file_name(),
                elapsed_sec = format!("{:.1}", elapsed_sec).as_str(),
                "Generation finished"
            );
            sink.emit(LifecycleEvent::Finished {
                prompt,
                artifact,
                elapsed_sec,
            });
        }
        Err(e) => {
            error!(prompt = %prompt, "Generation failed: {}", e);
            sink.emit(LifecycleEvent::Failed {
                prompt,
                message: truncate_message(&e.to_string(), MAX_ERROR_LEN),
            });
        }
    }
}

/// Truncates on a char boundary so multibyte errors cannot split.
fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        message.chars().take(max_chars).collect()
    }
}
