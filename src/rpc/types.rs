//! JSON-RPC types for the daemon protocol.
//!
//! Requests and notifications exchanged with the browser front end over
//! the daemon's stdio transport.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, WebdError};

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: RequestId,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application-specific errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonRpcError {
    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }

    fn application(code: i32, message: &str, error_code: &str, details: String) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(JsonRpcErrorData {
                error_code: error_code.to_string(),
                details: Some(details),
            }),
        }
    }

    /// Creates a model not found error (-32000).
    pub fn model_not_found(details: impl Into<String>) -> Self {
        Self::application(-32000, "Model not found", "MODEL_NOT_FOUND", details.into())
    }

    /// Creates a model load failed error (-32001).
    pub fn model_load_failed(details: impl Into<String>) -> Self {
        Self::application(
            -32001,
            "Model load failed",
            "MODEL_LOAD_FAILED",
            details.into(),
        )
    }

    /// Creates a model download failed error (-32002).
    pub fn model_download_failed(details: impl Into<String>) -> Self {
        Self::application(
            -32002,
            "Model download failed",
            "MODEL_DOWNLOAD_FAILED",
            details.into(),
        )
    }

    /// Creates a model inference failed error (-32003).
    pub fn model_inference_failed(details: impl Into<String>) -> Self {
        Self::application(
            -32003,
            "Model inference failed",
            "MODEL_INFERENCE_FAILED",
            details.into(),
        )
    }

    /// Creates an invalid prompt error (-32004).
    pub fn invalid_prompt(details: impl Into<String>) -> Self {
        Self::application(-32004, "Invalid prompt", "INVALID_PROMPT", details.into())
    }

    /// Creates a melody required error (-32005).
    pub fn melody_required(details: impl Into<String>) -> Self {
        Self::application(
            -32005,
            "Melody required",
            "MELODY_REQUIRED",
            details.into(),
        )
    }

    /// Creates an invalid melody error (-32006).
    pub fn invalid_melody(details: impl Into<String>) -> Self {
        Self::application(-32006, "Invalid melody", "INVALID_MELODY", details.into())
    }

    /// Creates an export failed error (-32007).
    pub fn export_failed(details: impl Into<String>) -> Self {
        Self::application(-32007, "Export failed", "EXPORT_FAILED", details.into())
    }
}

impl From<WebdError> for JsonRpcError {
    fn from(e: WebdError) -> Self {
        match e.code {
            ErrorCode::ModelNotFound => Self::model_not_found(e.message),
            ErrorCode::ModelLoadFailed => Self::model_load_failed(e.message),
            ErrorCode::ModelDownloadFailed => Self::model_download_failed(e.message),
            ErrorCode::ModelInferenceFailed => Self::model_inference_failed(e.message),
            ErrorCode::InvalidPrompt => Self::invalid_prompt(e.message),
            ErrorCode::MelodyRequired => Self::melody_required(e.message),
            ErrorCode::InvalidMelody => Self::invalid_melody(e.message),
            ErrorCode::ExportFailed => Self::export_failed(e.message),
        }
    }
}

// ============================================================================
// Method parameters and results
// ============================================================================

/// Parameters for a `submit` request.
#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    /// Text description of desired music.
    pub prompt: String,

    /// Model variant name ("small", "medium", "large", "melody").
    #[serde(default)]
    pub model: Option<String>,

    /// Raw form values from the front end, coerced server-side.
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,

    /// Whether the advanced section of the form was expanded.
    #[serde(default)]
    pub advanced_expanded: bool,

    /// Path of a previously uploaded melody file.
    #[serde(default)]
    pub melody_url: Option<String>,
}

/// Result of a `submit` request.
#[derive(Debug, Serialize)]
pub struct SubmitResult {
    pub status: &'static str,
}

/// Parameters for an `upload_melody` request.
#[derive(Debug, Deserialize)]
pub struct UploadMelodyParams {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file contents.
    pub data: String,
}

/// Result of an `upload_melody` request.
#[derive(Debug, Serialize)]
pub struct UploadMelodyResult {
    pub file_path: String,
}

// ============================================================================
// Notifications
// ============================================================================

/// A JSON-RPC notification (no id field).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<T: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: T,
}

impl<T: Serialize> JsonRpcNotification<T> {
    pub fn new(method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// `add_to_queue`: a request was accepted.
#[derive(Debug, Serialize)]
pub struct AddToQueueParams {
    pub prompt: String,
}

/// `status`: a job changed state.
#[derive(Debug, Serialize)]
pub struct StatusParams {
    pub prompt: String,
    pub state: JobState,
}

/// State carried in `status` notifications. Acceptance is announced by
/// `add_to_queue` rather than a status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Started,
    Finished,
    Error,
}

/// `on_finish_audio`: a job produced files.
#[derive(Debug, Serialize)]
pub struct FinishAudioParams {
    pub prompt: String,
    pub filename: String,
    pub json_filename: String,
    pub elapsed_sec: f64,
}

/// `error`: a submission was rejected before enqueueing.
#[derive(Debug, Serialize)]
pub struct ErrorMessageParams {
    pub prompt: String,
    pub message: String,
}

/// `gen_error`: a queued job failed during processing.
#[derive(Debug, Serialize)]
pub struct GenErrorParams {
    pub prompt: String,
    pub message: String,
}

/// `audio_pairs`: snapshot of the generated-audio directory.
#[derive(Debug, Serialize)]
pub struct AudioPairsParams {
    pub pairs: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_from_int() {
        let id: RequestId = 42.into();
        assert_eq!(id, RequestId::Integer(42));
    }

    #[test]
    fn request_id_from_string() {
        let id: RequestId = "abc".to_string().into();
        assert_eq!(id, RequestId::String("abc".to_string()));
    }

    #[test]
    fn json_rpc_error_codes() {
        assert_eq!(JsonRpcError::parse_error("").code, -32700);
        assert_eq!(JsonRpcError::invalid_request("").code, -32600);
        assert_eq!(JsonRpcError::method_not_found("").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("").code, -32602);
        assert_eq!(JsonRpcError::internal_error("").code, -32603);
        assert_eq!(JsonRpcError::model_not_found("").code, -32000);
        assert_eq!(JsonRpcError::model_load_failed("").code, -32001);
        assert_eq!(JsonRpcError::model_download_failed("").code, -32002);
        assert_eq!(JsonRpcError::model_inference_failed("").code, -32003);
        assert_eq!(JsonRpcError::invalid_prompt("").code, -32004);
        assert_eq!(JsonRpcError::melody_required("").code, -32005);
        assert_eq!(JsonRpcError::invalid_melody("").code, -32006);
        assert_eq!(JsonRpcError::export_failed("").code, -32007);
    }

    #[test]
    fn daemon_error_maps_to_rpc_error() {
        let e = WebdError::empty_prompt();
        let rpc: JsonRpcError = e.into();
        assert_eq!(rpc.code, -32004);
        assert_eq!(rpc.data.unwrap().error_code, "INVALID_PROMPT");
    }

    #[test]
    fn submit_params_defaults() {
        let params: SubmitParams =
            serde_json::from_value(serde_json::json!({"prompt": "lofi"})).unwrap();
        assert_eq!(params.prompt, "lofi");
        assert_eq!(params.model, None);
        assert!(params.values.is_empty());
        assert!(!params.advanced_expanded);
        assert_eq!(params.melody_url, None);
    }

    #[test]
    fn error_notification_carries_prompt_and_message() {
        let n = JsonRpcNotification::new(
            "error",
            ErrorMessageParams {
                prompt: "hum this".to_string(),
                message: "Melody file not found".to_string(),
            },
        );
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["params"]["prompt"], "hum this");
        assert_eq!(v["params"]["message"], "Melody file not found");
    }

    #[test]
    fn notification_wire_shape() {
        let n = JsonRpcNotification::new(
            "add_to_queue",
            AddToQueueParams {
                prompt: "rain".to_string(),
            },
        );
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["method"], "add_to_queue");
        assert_eq!(v["params"]["prompt"], "rain");
        assert!(v.get("id").is_none());
    }
}
