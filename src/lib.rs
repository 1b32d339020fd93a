//! musicgen-webd: MusicGen music generation daemon.
//!
//! This library backs a browser front end with queued, parameterized
//! MusicGen generation via ONNX Runtime: a JSON-RPC stdio server accepts
//! submissions, a single worker thread runs inference, and finished audio
//! lands on disk as WAV/JSON pairs.
//!
//! # Modules
//!
//! - [`rpc`]: JSON-RPC 2.0 server, methods, and notifications
//! - [`generation`]: The worker thread and engine invocation
//! - [`models`]: Model variants, the engine seam, and the ONNX engine
//! - [`params`]: Wire-value coercion into typed parameter sets
//! - [`audio`]: Fades, loudness, resampling, and WAV/JSON export
//! - [`store`]: Last-run settings and the generated-audio listing
//! - [`config`]: Runtime configuration (paths, default model, threads)
//! - [`error`]: Error types and codes (WebdError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use musicgen_webd::{
//!     config::DaemonConfig,
//!     models::OnnxEngineLoader,
//!     rpc::{run_server, ServerState},
//! };
//!
//! let config = DaemonConfig::from_env();
//! let loader = OnnxEngineLoader::new(config.effective_model_path());
//! let state = ServerState::new(config, Box::new(loader));
//! run_server(state)?;
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod params;
pub mod rpc;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::DaemonConfig;
pub use error::{ErrorCode, Result, WebdError};
pub use models::ModelVariant;
pub use params::{ParameterSet, SeedSpec};
pub use types::{GeneratedArtifact, GenerationRequest, LastRunSettings, MelodyReference};
