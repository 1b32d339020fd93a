//! Core types for musicgen-webd.
//!
//! This module re-exports the core data types used throughout the daemon:
//! - [`GenerationRequest`]: A validated request consumed by the worker
//! - [`MelodyReference`]: A decoded reference melody
//! - [`GeneratedArtifact`]: An exported audio/metadata pair
//! - [`LastRunSettings`]: The persisted last-submission record

mod artifact;
mod request;
mod settings;

pub use artifact::{GeneratedArtifact, ResampleOutcome};
pub use request::{GenerationRequest, MelodyReference};
pub use settings::LastRunSettings;
