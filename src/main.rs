//! musicgen-webd: MusicGen music generation daemon.
//!
//! This binary can run in two modes:
//! - CLI mode: Standalone one-off generation for testing
//! - Daemon mode: JSON-RPC server backing the web front end

use std::time::Instant;

use musicgen_webd::audio::{read_wav_mono, write_wav};
use musicgen_webd::cli::Cli;
use musicgen_webd::config::DaemonConfig;
use musicgen_webd::error::{Result, WebdError};
use musicgen_webd::generation::run_inference;
use musicgen_webd::models::{EngineLoader, OnnxEngineLoader};
use musicgen_webd::params::{ParameterSet, SeedSpec};
use musicgen_webd::rpc::{run_server, ServerState};
use musicgen_webd::types::MelodyReference;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();

    if cli.is_daemon_mode() {
        run_daemon_mode(&cli)
    } else if cli.is_cli_mode() {
        run_cli_mode(&cli)
    } else {
        print_usage();
        Ok(())
    }
}

/// Runs the daemon mode (JSON-RPC server).
fn run_daemon_mode(cli: &Cli) -> Result<()> {
    // Logs go to stderr; stdout carries the JSON-RPC stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = DaemonConfig::from_env();
    if let Some(ref model_dir) = cli.model_dir {
        config.model_path = Some(model_dir.clone());
    }
    if let Some(message) = config.validate() {
        return Err(WebdError::model_load_failed(format!(
            "Invalid configuration: {}",
            message
        )));
    }

    let loader = OnnxEngineLoader::new(config.effective_model_path());
    let state = ServerState::new(config, Box::new(loader));
    run_server(state)
}

/// Runs the CLI mode for one-off music generation.
fn run_cli_mode(cli: &Cli) -> Result<()> {
    let prompt = cli.prompt.as_deref().unwrap_or_default();
    let output_path = cli.output_path();
    let variant = cli.model.variant();

    let mut config = DaemonConfig::from_env();
    if let Some(ref model_dir) = cli.model_dir {
        config.model_path = Some(model_dir.clone());
    }
    let loader = OnnxEngineLoader::new(config.effective_model_path());

    eprintln!("=== musicgen-webd CLI ===");
    eprintln!("Model: {}", variant);
    eprintln!("Prompt: \"{}\"", prompt);
    eprintln!("Duration: {}s", cli.duration);
    eprintln!("Output: {}", output_path.display());
    eprintln!("Model directory: {}", loader.variant_dir(variant).display());
    if let Some(seed) = cli.seed {
        eprintln!("Seed: {}", seed);
    }
    eprintln!();

    let melody = match cli.melody {
        Some(ref path) => {
            if !variant.requires_melody() {
                eprintln!("Warning: --melody is only used by the melody model.");
            }
            let (samples, sample_rate) = read_wav_mono(path)?;
            Some(MelodyReference {
                samples,
                sample_rate,
            })
        }
        None => {
            if variant.requires_melody() {
                return Err(WebdError::melody_required(
                    "The melody model needs a --melody WAV file",
                ));
            }
            None
        }
    };

    eprintln!("Checking model files...");
    let mut engine = loader.load(variant)?;
    eprintln!();

    let mut params = ParameterSet {
        duration_sec: Some(cli.duration),
        seed: cli.seed.map(SeedSpec::Fixed),
        ..Default::default()
    };

    let start_time = Instant::now();
    let samples = run_inference(engine.as_mut(), prompt, &mut params, melody.as_ref())?;
    let generation_time_sec = start_time.elapsed().as_secs_f32();
    let sample_rate = engine.sample_rate();

    eprintln!();
    eprintln!("Generation complete!");
    eprintln!("  Time: {:.2}s", generation_time_sec);
    eprintln!("  Samples: {}", samples.len());
    eprintln!(
        "  Audio duration: {:.2}s",
        samples.len() as f32 / sample_rate as f32
    );
    eprintln!();

    eprintln!("Writing WAV file...");
    write_wav(&samples, &output_path, sample_rate)?;
    eprintln!("Saved to: {}", output_path.display());

    Ok(())
}

/// Prints usage information.
fn print_usage() {
    eprintln!("musicgen-webd: MusicGen music generation");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  One-off generation:");
    eprintln!("    musicgen-webd --prompt \"lofi hip hop beats\" --duration 10 --output test.wav");
    eprintln!();
    eprintln!("  Melody-conditioned generation:");
    eprintln!("    musicgen-webd --model melody --melody riff.wav --prompt \"orchestral\"");
    eprintln!();
    eprintln!("  Daemon mode (JSON-RPC server):");
    eprintln!("    musicgen-webd --daemon");
    eprintln!();
    eprintln!("Run 'musicgen-webd --help' for full options.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_usage_doesnt_panic() {
        print_usage();
    }
}
