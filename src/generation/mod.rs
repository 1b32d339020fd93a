//! Generation pipeline: invocation and the background worker.

pub mod invoke;
pub mod worker;

// Re-export commonly used items
pub use invoke::run_inference;
pub use worker::{EventSink, GenerationWorker, LifecycleEvent};
