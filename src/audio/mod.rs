//! Audio post-processing and file I/O.
//!
//! Everything between a raw decoded waveform and the files the front end
//! plays: fades, loudness, resampling, and the WAV/JSON artifact pair.

pub mod export;
pub mod loudness;
pub mod resample;
pub mod wav;

// Re-export commonly used items
pub use export::{apply_fades, export, sanitize_slug};
pub use loudness::{normalize, rms_dbfs};
pub use resample::resample_to;
pub use wav::{read_wav_mono, samples_to_duration, write_wav, CHANNELS};
