//! CLI argument parser for standalone mode.
//!
//! Provides a command-line interface for one-off music generation
//! without the full daemon infrastructure.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::models::ModelVariant;

/// Available MusicGen model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    /// Small: fastest, lowest quality
    Small,
    /// Medium: balanced quality and speed
    Medium,
    /// Large: best text-only quality
    #[default]
    Large,
    /// Melody: conditions on an uploaded reference melody
    Melody,
}

impl ModelArg {
    /// Converts the CLI argument into the daemon's variant type.
    pub fn variant(self) -> ModelVariant {
        match self {
            ModelArg::Small => ModelVariant::Small,
            ModelArg::Medium => ModelVariant::Medium,
            ModelArg::Large => ModelVariant::Large,
            ModelArg::Melody => ModelVariant::Melody,
        }
    }
}

/// musicgen-webd: MusicGen music generation daemon
#[derive(Parser, Debug)]
#[command(name = "musicgen-webd")]
#[command(about = "MusicGen music generation daemon for the web front end")]
#[command(version)]
pub struct Cli {
    /// Text prompt describing the music to generate
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Duration of audio to generate in seconds
    #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=30))]
    pub duration: u32,

    /// Output WAV file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to directory containing ONNX model files
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Random seed for reproducible generation
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Model variant to generate with
    #[arg(long, value_enum, default_value_t = ModelArg::Large)]
    pub model: ModelArg,

    /// Reference melody WAV file (melody model only)
    #[arg(long)]
    pub melody: Option<PathBuf>,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if running in CLI mode (not daemon mode).
    pub fn is_cli_mode(&self) -> bool {
        !self.daemon && self.prompt.is_some()
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Returns the effective output path.
    ///
    /// Defaults to "output.wav" in the current directory if not specified.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from("output.wav"))
    }
}
