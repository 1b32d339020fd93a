//! JSON-RPC module for daemon communication.
//!
//! Provides the JSON-RPC 2.0 server implementation for:
//! - `submit`: Queue a music generation request
//! - `upload_melody`: Store a reference melody for the melody model
//! - `list_tracks`: List generated audio/metadata pairs
//! - `get_settings`: Last-run settings for UI pre-population
//! - `ping`: Health check
//! - `shutdown`: Graceful shutdown
//!
//! Notifications:
//! - `add_to_queue`: Request accepted
//! - `status`: Job state changes
//! - `on_finish_audio`: Generated files ready
//! - `error` / `gen_error`: Submission rejection / in-job failure
//! - `audio_pairs`: Directory snapshot at startup

pub mod methods;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{run_server, send_notification, NotificationSink, ServerState};
pub use types::{
    AddToQueueParams, AudioPairsParams, ErrorMessageParams, FinishAudioParams, GenErrorParams,
    JobState, JsonRpcError, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, StatusParams, SubmitParams, SubmitResult, UploadMelodyParams,
    UploadMelodyResult,
};
