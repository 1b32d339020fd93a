//! Error types for musicgen-webd.
//!
//! Defines all error codes and types used throughout the daemon for
//! consistent error handling and reporting.

use std::fmt;

/// Error codes returned by the daemon in error responses.
///
/// These codes are used in JSON-RPC error responses and allow clients
/// to programmatically handle specific error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// ONNX model files not found at expected path.
    /// Trigger: Model files missing from the model directory.
    ModelNotFound,

    /// Failed to load ONNX model into memory.
    /// Trigger: Corrupt file, wrong format, or OOM during load.
    ModelLoadFailed,

    /// Failed to download model from remote source.
    /// Trigger: Network error, disk full during download.
    ModelDownloadFailed,

    /// Model inference failed during generation.
    /// Trigger: Numerical instability, OOM during generation.
    ModelInferenceFailed,

    /// Prompt text is invalid.
    /// Trigger: Empty or whitespace-only prompt.
    InvalidPrompt,

    /// The selected model requires a reference melody.
    /// Trigger: Melody variant submitted without a melody file.
    MelodyRequired,

    /// The melody reference could not be used.
    /// Trigger: Path escapes the scratch directory, file missing,
    /// or unreadable audio.
    InvalidMelody,

    /// Audio export failed.
    /// Trigger: I/O error writing the audio file or its metadata sidecar.
    ExportFailed,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::ModelInferenceFailed => "MODEL_INFERENCE_FAILED",
            ErrorCode::InvalidPrompt => "INVALID_PROMPT",
            ErrorCode::MelodyRequired => "MELODY_REQUIRED",
            ErrorCode::InvalidMelody => "INVALID_MELODY",
            ErrorCode::ExportFailed => "EXPORT_FAILED",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "ONNX model files not found at expected path",
            ErrorCode::ModelLoadFailed => "Failed to load ONNX model into memory",
            ErrorCode::ModelDownloadFailed => "Failed to download model from remote source",
            ErrorCode::ModelInferenceFailed => "Model inference failed during generation",
            ErrorCode::InvalidPrompt => "Prompt must be non-empty",
            ErrorCode::MelodyRequired => "The melody model requires a reference melody file",
            ErrorCode::InvalidMelody => "The melody reference is missing or unreadable",
            ErrorCode::ExportFailed => "Failed to write the generated audio or its metadata",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for daemon operations.
#[derive(Debug)]
pub struct WebdError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WebdError {
    /// Creates a new WebdError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new WebdError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_DOWNLOAD_FAILED error.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_INFERENCE_FAILED error.
    pub fn model_inference_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelInferenceFailed,
            format!("Inference failed: {}", reason.into()),
        )
    }

    /// Creates an INVALID_PROMPT error for empty prompts.
    pub fn empty_prompt() -> Self {
        Self::new(ErrorCode::InvalidPrompt, "Prompt cannot be empty")
    }

    /// Creates a MELODY_REQUIRED error.
    pub fn melody_required(model: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MelodyRequired,
            format!("Model '{}' requires a reference melody file", model.into()),
        )
    }

    /// Creates an INVALID_MELODY error.
    pub fn invalid_melody(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidMelody,
            format!("Invalid melody reference: {}", reason.into()),
        )
    }

    /// Creates an EXPORT_FAILED error.
    pub fn export_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExportFailed,
            format!("Audio export failed: {}", reason.into()),
        )
    }
}

impl fmt::Display for WebdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for WebdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using WebdError.
pub type Result<T> = std::result::Result<T, WebdError>;
