//! ONNX-backed MusicGen engine.
//!
//! Wraps the split MusicGen export: a T5 text encoder, a decoder pair
//! (first pass plus KV-cache pass), and the EnCodec decoder. Tokens are
//! generated autoregressively across the four EnCodec codebooks using the
//! delay pattern, with classifier-free guidance scaled by `cfg_coef`.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::path::Path;

use half::f16;
use ndarray::Array2;
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use crate::audio::resample_to;
use crate::error::{Result, WebdError};
use crate::types::MelodyReference;

use super::engine::{GenerationParams, InferenceEngine};
use super::sampling::Sampler;
use super::ModelVariant;

/// Model files every variant export must contain.
pub const REQUIRED_MODEL_FILES: &[&str] = &[
    "tokenizer.json",
    "text_encoder.onnx",
    "decoder_model.onnx",
    "decoder_with_past_model.onnx",
    "encodec_decode.onnx",
];

/// Extra file the melody variant needs for waveform conditioning.
pub const MELODY_ENCODER_FILE: &str = "melody_encoder.onnx";

/// Token frames generated per second of audio.
const TOKENS_PER_SECOND: u32 = 50;

/// Number of EnCodec codebooks.
const CODEBOOKS: usize = 4;

/// Codebook pad token id used by the delay pattern warmup.
const PAD_TOKEN_ID: i64 = 2048;

/// Longest text-to-audio window MusicGen generates in one pass.
const MAX_WINDOW_SEC: u32 = 30;

/// Clamps a requested duration to the single-window range, warning when
/// the cap shortens what the metadata will record.
fn clamp_duration(requested: u32) -> u32 {
    if requested > MAX_WINDOW_SEC {
        warn!(
            requested,
            "Requested duration exceeds the {}s window, capping the audio", MAX_WINDOW_SEC
        );
    }
    requested.clamp(1, MAX_WINDOW_SEC)
}

/// Checks that all model files for a variant are present.
pub fn check_model_files(model_dir: &Path, variant: ModelVariant) -> Result<()> {
    let mut missing: Vec<&str> = REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|f| !model_dir.join(f).exists())
        .collect();
    if variant.requires_melody() && !model_dir.join(MELODY_ENCODER_FILE).exists() {
        missing.push(MELODY_ENCODER_FILE);
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(WebdError::model_not_found(format!(
            "{} (missing: {})",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// A loaded MusicGen variant.
pub struct OnnxMusicGen {
    variant: ModelVariant,
    tokenizer: Tokenizer,
    text_encoder: Session,
    decoder: Session,
    decoder_with_past: Session,
    audio_codec: Session,
    melody_encoder: Option<Session>,
    params: GenerationParams,
    sampler: Sampler,
}

impl OnnxMusicGen {
    /// Loads all sessions for a variant from its model directory.
    pub fn load(model_dir: &Path, variant: ModelVariant) -> Result<Self> {
        check_model_files(model_dir, variant)?;

        let mut tokenizer =
            Tokenizer::from_file(model_dir.join("tokenizer.json")).map_err(|e| {
                WebdError::model_load_failed(format!("Failed to load tokenizer: {}", e))
            })?;
        tokenizer
            .with_padding(None)
            .with_truncation(None)
            .map_err(|e| {
                WebdError::model_load_failed(format!("Failed to configure tokenizer: {}", e))
            })?;

        let text_encoder = load_session(&model_dir.join("text_encoder.onnx"))?;
        let decoder = load_session(&model_dir.join("decoder_model.onnx"))?;
        let decoder_with_past = load_session(&model_dir.join("decoder_with_past_model.onnx"))?;
        let audio_codec = load_session(&model_dir.join("encodec_decode.onnx"))?;

        let melody_encoder = if variant.requires_melody() {
            Some(load_session(&model_dir.join(MELODY_ENCODER_FILE))?)
        } else {
            None
        };

        debug!(variant = %variant, dir = %model_dir.display(), "model sessions loaded");

        Ok(Self {
            variant,
            tokenizer,
            text_encoder,
            decoder,
            decoder_with_past,
            audio_codec,
            melody_encoder,
            params: GenerationParams::default(),
            sampler: Sampler::new(),
        })
    }

    /// Runs the T5 encoder over the prompt.
    ///
    /// Returns the hidden states as `(shape, data)` with shape
    /// `[1, seq_len, d_model]`.
    fn encode_prompt(&mut self, prompt: &str) -> Result<(Vec<usize>, Vec<f32>)> {
        let tokens: Vec<i64> = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| WebdError::model_inference_failed(format!("Tokenization failed: {}", e)))?
            .get_ids()
            .iter()
            .map(|id| *id as i64)
            .collect();
        let seq_len = tokens.len();

        let input_ids = Tensor::from_array(([1, seq_len], tokens)).map_err(tensor_err)?;
        let attention_mask =
            Tensor::from_array(([1, seq_len], vec![1i64; seq_len])).map_err(tensor_err)?;

        let mut outputs = self
            .text_encoder
            .run(ort::inputs![input_ids, attention_mask])
            .map_err(|e| {
                WebdError::model_inference_failed(format!("Text encoder inference failed: {}", e))
            })?;

        let hidden = outputs.remove("last_hidden_state").ok_or_else(|| {
            WebdError::model_inference_failed("last_hidden_state not found in output")
        })?;
        to_f32_parts(&hidden)
    }

    /// Encodes the reference melody and appends its hidden states to the
    /// text conditioning along the sequence axis.
    fn append_melody(
        &mut self,
        hidden: (Vec<usize>, Vec<f32>),
        melody: &MelodyReference,
    ) -> Result<(Vec<usize>, Vec<f32>)> {
        let encoder = self.melody_encoder.as_mut().ok_or_else(|| {
            WebdError::model_inference_failed(format!(
                "model '{}' has no melody conditioning",
                self.variant
            ))
        })?;

        // The melody encoder expects the engine's native rate.
        let native_rate = self.variant.sample_rate();
        let samples = if melody.sample_rate == native_rate {
            melody.samples.clone()
        } else {
            resample_to(&melody.samples, melody.sample_rate, native_rate).map_err(|e| {
                WebdError::model_inference_failed(format!("melody resample failed: {}", e))
            })?
        };

        let waveform =
            Tensor::from_array(([1, samples.len()], samples)).map_err(tensor_err)?;
        let mut outputs = encoder.run(ort::inputs![waveform]).map_err(|e| {
            WebdError::model_inference_failed(format!("Melody encoder inference failed: {}", e))
        })?;
        let melody_hidden = outputs.remove("melody_hidden_states").ok_or_else(|| {
            WebdError::model_inference_failed("melody_hidden_states not found in output")
        })?;
        let (m_shape, m_data) = to_f32_parts(&melody_hidden)?;

        let (shape, mut data) = hidden;
        if m_shape.len() != 3 || shape.len() != 3 || m_shape[2] != shape[2] {
            return Err(WebdError::model_inference_failed(format!(
                "melody hidden shape {:?} incompatible with text hidden {:?}",
                m_shape, shape
            )));
        }

        data.extend_from_slice(&m_data);
        let merged = vec![shape[0], shape[1] + m_shape[1], shape[2]];
        Ok((merged, data))
    }

    /// Autoregressive token generation with classifier-free guidance.
    ///
    /// `two_step_cfg` runs the conditional and unconditional halves as two
    /// sequential passes with separate caches; the default fuses them into
    /// one doubled batch per step, matching the export's intended layout.
    fn generate_tokens(
        &mut self,
        hidden: (Vec<usize>, Vec<f32>),
        steps: usize,
    ) -> Result<VecDeque<[i64; CODEBOOKS]>> {
        let (shape, data) = hidden;
        let (seq_len, d_model) = (shape[1], shape[2]);
        let zeros = vec![0.0f32; data.len()];

        let mut branches: Vec<CfgBranch> = if self.params.two_step_cfg {
            vec![
                CfgBranch::new(vec![1, seq_len, d_model], data, vec![1i64; seq_len])?,
                CfgBranch::new(vec![1, seq_len, d_model], zeros, vec![0i64; seq_len])?,
            ]
        } else {
            let mut fused = data;
            fused.extend_from_slice(&zeros);
            let mut mask = vec![1i64; seq_len];
            mask.extend(std::iter::repeat(0).take(seq_len));
            vec![CfgBranch::new(vec![2, seq_len, d_model], fused, mask)?]
        };

        // Delay pattern loses CODEBOOKS-1 frames at the start.
        let total_iterations = steps + CODEBOOKS - 1;
        let mut delay = CodebookDelay::new();
        let mut results = VecDeque::new();

        for iteration in 0..=total_iterations {
            let delayed = delay.last_delayed_masked(PAD_TOKEN_ID);

            let mut cond: Option<Array2<f32>> = None;
            let mut uncond: Option<Array2<f32>> = None;
            for branch in &mut branches {
                let rows = branch.batch * CODEBOOKS;
                let mut ids = Vec::with_capacity(rows);
                for _ in 0..branch.batch {
                    ids.extend_from_slice(&delayed);
                }
                let session = if iteration == 0 {
                    &mut self.decoder
                } else {
                    &mut self.decoder_with_past
                };
                let logits = branch.step(session, ids, iteration == 0)?;

                if self.params.two_step_cfg {
                    if cond.is_none() {
                        cond = Some(logits);
                    } else {
                        uncond = Some(logits);
                    }
                } else {
                    // Fused batch: first half conditional, second half not.
                    let (c, u) = split_fused(logits)?;
                    cond = Some(c);
                    uncond = Some(u);
                }
            }

            let (cond, uncond) = match (cond, uncond) {
                (Some(c), Some(u)) => (c, u),
                _ => {
                    return Err(WebdError::model_inference_failed(
                        "decoder produced no logits",
                    ))
                }
            };
            let guided = apply_guidance(&cond, &uncond, self.params.cfg_coef);

            let mut sampled = [0i64; CODEBOOKS];
            for (i, slot) in sampled.iter_mut().enumerate() {
                let row: Vec<f32> = guided.row(i).to_vec();
                *slot = self.sampler.sample(&row)?;
            }
            delay.push(sampled);

            if let Some(frame) = delay.last_de_delayed() {
                results.push_back(frame);
                if results.len() >= steps {
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Decodes generated token frames to a mono waveform via EnCodec.
    fn decode_audio(&mut self, frames: VecDeque<[i64; CODEBOOKS]>) -> Result<Vec<f32>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let seq_len = frames.len();

        // EnCodec wants [1, 1, codebooks, seq_len].
        let mut transposed = vec![0i64; seq_len * CODEBOOKS];
        for (t, frame) in frames.iter().enumerate() {
            for (c, id) in frame.iter().enumerate() {
                transposed[c * seq_len + t] = *id;
            }
        }
        let tokens =
            Tensor::from_array(([1usize, 1, CODEBOOKS, seq_len], transposed)).map_err(tensor_err)?;

        let mut outputs = self.audio_codec.run(ort::inputs![tokens]).map_err(|e| {
            WebdError::model_inference_failed(format!("Audio codec inference failed: {}", e))
        })?;
        let audio = outputs
            .remove("audio_values")
            .ok_or_else(|| WebdError::model_inference_failed("audio_values not found in output"))?;
        let (_, samples) = to_f32_parts(&audio)?;
        Ok(samples)
    }

    fn run(&mut self, prompt: &str, melody: Option<&MelodyReference>) -> Result<Vec<f32>> {
        let duration = clamp_duration(self.params.duration_sec);
        let steps = (duration * TOKENS_PER_SECOND) as usize;

        let mut hidden = self.encode_prompt(prompt)?;
        if let Some(melody) = melody {
            hidden = self.append_melody(hidden, melody)?;
        }

        let frames = self.generate_tokens(hidden, steps)?;
        let mut samples = self.decode_audio(frames)?;
        samples.truncate((duration * self.variant.sample_rate()) as usize);
        Ok(samples)
    }
}

impl InferenceEngine for OnnxMusicGen {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn sample_rate(&self) -> u32 {
        self.variant.sample_rate()
    }

    fn set_params(&mut self, params: &GenerationParams) {
        self.params = *params;
        self.sampler.configure(params);
    }

    fn seed(&mut self, seed: u64) {
        self.sampler.reseed(seed);
    }

    fn generate(&mut self, prompt: &str) -> Result<Vec<f32>> {
        self.run(prompt, None)
    }

    fn generate_with_melody(&mut self, prompt: &str, melody: &MelodyReference) -> Result<Vec<f32>> {
        self.run(prompt, Some(melody))
    }
}

/// One guidance branch: its encoder conditioning plus the KV cache
/// accumulated across steps.
struct CfgBranch {
    batch: usize,
    hidden: DynValue,
    mask: DynValue,
    kv: Vec<(String, DynValue)>,
}

impl CfgBranch {
    fn new(shape: Vec<usize>, data: Vec<f32>, mask: Vec<i64>) -> Result<Self> {
        let batch = shape[0];
        let seq_len = shape[1];
        let hidden = Tensor::from_array((shape, data)).map_err(tensor_err)?;
        let mask = Tensor::from_array((vec![batch, seq_len], mask)).map_err(tensor_err)?;
        Ok(Self {
            batch,
            hidden: hidden.into_dyn(),
            mask: mask.into_dyn(),
            kv: Vec::new(),
        })
    }

    /// Runs one decoder step for this branch and returns its logits as
    /// `[rows, vocab]`.
    fn step(&mut self, session: &mut Session, ids: Vec<i64>, first: bool) -> Result<Array2<f32>> {
        let rows = ids.len();
        let input_ids = Tensor::from_array(([rows, 1], ids)).map_err(tensor_err)?;

        let mut inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
            (
                Cow::from("encoder_attention_mask"),
                SessionInputValue::from(self.mask.view()),
            ),
        ];
        if first {
            inputs.push((
                Cow::from("encoder_hidden_states"),
                SessionInputValue::from(self.hidden.view()),
            ));
        } else {
            for (name, value) in &self.kv {
                inputs.push((Cow::from(name.as_str()), SessionInputValue::from(value.view())));
            }
        }

        let mut outputs = session.run(inputs).map_err(|e| {
            WebdError::model_inference_failed(format!("Decoder inference failed: {}", e))
        })?;

        let logits_value = outputs
            .remove("logits")
            .ok_or_else(|| WebdError::model_inference_failed("logits not found in output"))?;
        let logits = logits_to_rows(&logits_value)?;

        // Harvest the updated cache. The first pass emits encoder entries
        // too; later passes only refresh the decoder ones.
        if first {
            self.kv.clear();
            let mut layer = 0;
            loop {
                let dk = outputs.remove(&format!("present.{layer}.decoder.key"));
                let Some(dk) = dk else { break };
                let dv = take_present(&mut outputs, layer, "decoder.value")?;
                let ek = take_present(&mut outputs, layer, "encoder.key")?;
                let ev = take_present(&mut outputs, layer, "encoder.value")?;
                self.kv.push((format!("past_key_values.{layer}.decoder.key"), dk));
                self.kv.push((format!("past_key_values.{layer}.decoder.value"), dv));
                self.kv.push((format!("past_key_values.{layer}.encoder.key"), ek));
                self.kv.push((format!("past_key_values.{layer}.encoder.value"), ev));
                layer += 1;
            }
            if self.kv.is_empty() {
                return Err(WebdError::model_inference_failed(
                    "decoder emitted no KV cache entries",
                ));
            }
        } else {
            let layers = self.kv.len() / 4;
            for layer in 0..layers {
                let dk = take_present(&mut outputs, layer, "decoder.key")?;
                let dv = take_present(&mut outputs, layer, "decoder.value")?;
                self.kv[layer * 4] = (format!("past_key_values.{layer}.decoder.key"), dk);
                self.kv[layer * 4 + 1] = (format!("past_key_values.{layer}.decoder.value"), dv);
            }
        }

        Ok(logits)
    }
}

fn take_present(
    outputs: &mut ort::session::SessionOutputs,
    layer: usize,
    suffix: &str,
) -> Result<DynValue> {
    outputs
        .remove(&format!("present.{layer}.{suffix}"))
        .ok_or_else(|| {
            WebdError::model_inference_failed(format!("present.{layer}.{suffix} not found"))
        })
}

fn tensor_err(e: ort::Error) -> WebdError {
    WebdError::model_inference_failed(format!("Failed to build tensor: {}", e))
}

fn load_session(path: &Path) -> Result<Session> {
    Session::builder()
        .map_err(|e| WebdError::model_load_failed(format!("Failed to create session: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| {
            WebdError::model_load_failed(format!("Failed to load {}: {}", path.display(), e))
        })
}

/// Extracts a tensor as `(shape, f32 data)`, accepting f32 and f16 exports.
fn to_f32_parts(value: &DynValue) -> Result<(Vec<usize>, Vec<f32>)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        let shape = shape.iter().map(|&d| d as usize).collect();
        return Ok((shape, data.to_vec()));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
        let shape = shape.iter().map(|&d| d as usize).collect();
        return Ok((shape, data.iter().map(|v| f32::from(*v)).collect()));
    }
    Err(WebdError::model_inference_failed(
        "tensor must be f32 or f16",
    ))
}

/// Collapses `[rows, 1, vocab]` logits to `[rows, vocab]`.
fn logits_to_rows(value: &DynValue) -> Result<Array2<f32>> {
    let (shape, data) = to_f32_parts(value)?;
    if shape.len() != 3 || shape[1] != 1 {
        return Err(WebdError::model_inference_failed(format!(
            "unexpected logits shape {:?}",
            shape
        )));
    }
    Array2::from_shape_vec((shape[0], shape[2]), data)
        .map_err(|e| WebdError::model_inference_failed(format!("bad logits layout: {}", e)))
}

/// Splits a fused `[2 * codebooks, vocab]` batch into its conditional and
/// unconditional halves.
fn split_fused(logits: Array2<f32>) -> Result<(Array2<f32>, Array2<f32>)> {
    let rows = logits.nrows();
    if rows != 2 * CODEBOOKS {
        return Err(WebdError::model_inference_failed(format!(
            "expected {} fused logits rows, got {}",
            2 * CODEBOOKS,
            rows
        )));
    }
    let cond = logits.slice(ndarray::s![..CODEBOOKS, ..]).to_owned();
    let uncond = logits.slice(ndarray::s![CODEBOOKS.., ..]).to_owned();
    Ok((cond, uncond))
}

/// `guided = uncond + (cond - uncond) * cfg_coef`
fn apply_guidance(cond: &Array2<f32>, uncond: &Array2<f32>, cfg_coef: f32) -> Array2<f32> {
    uncond + &((cond - uncond) * cfg_coef)
}

/// Token bookkeeping for the 4-codebook delay pattern.
///
/// Each codebook lags the previous one by a single frame, so the decoder
/// sees causal inputs while all four are generated in parallel:
/// ```text
///   0 1 2 3 4 ...
/// 0 x x x x x
/// 1 P x x x x
/// 2 P P x x x
/// 3 P P P x x
/// ```
#[derive(Debug, Default)]
struct CodebookDelay {
    rows: [Vec<i64>; CODEBOOKS],
}

impl CodebookDelay {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, frame: [i64; CODEBOOKS]) {
        for (row, id) in self.rows.iter_mut().zip(frame) {
            row.push(id);
        }
    }

    /// The next decoder input per codebook, padding rows still inside
    /// their delay window.
    fn last_delayed_masked(&self, pad: i64) -> [i64; CODEBOOKS] {
        let len = self.rows[0].len();
        let mut out = [pad; CODEBOOKS];
        for (i, slot) in out.iter_mut().enumerate() {
            if len > i {
                if let Some(last) = self.rows[i].last() {
                    *slot = *last;
                }
            }
        }
        out
    }

    /// The newest fully de-delayed frame, once every codebook has cleared
    /// its delay window.
    fn last_de_delayed(&self) -> Option<[i64; CODEBOOKS]> {
        let len = self.rows[0].len();
        if len < CODEBOOKS {
            return None;
        }
        let mut out = [0i64; CODEBOOKS];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.rows[i][len - CODEBOOKS + i];
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_pattern_pads_until_row_opens() {
        let mut delay = CodebookDelay::new();
        assert_eq!(delay.last_delayed_masked(9), [9, 9, 9, 9]);
        delay.push([1, 2, 3, 4]);
        assert_eq!(delay.last_delayed_masked(9), [1, 9, 9, 9]);
        delay.push([5, 6, 7, 8]);
        assert_eq!(delay.last_delayed_masked(9), [5, 6, 9, 9]);
        delay.push([10, 11, 12, 13]);
        delay.push([14, 15, 16, 17]);
        assert_eq!(delay.last_delayed_masked(9), [14, 15, 16, 17]);
    }

    #[test]
    fn duration_clamped_to_window() {
        assert_eq!(clamp_duration(0), 1);
        assert_eq!(clamp_duration(10), 10);
        assert_eq!(clamp_duration(45), MAX_WINDOW_SEC);
    }

    #[test]
    fn de_delay_reads_the_diagonal() {
        let mut delay = CodebookDelay::new();
        delay.push([1, 2, 3, 4]);
        delay.push([5, 6, 7, 8]);
        delay.push([9, 10, 11, 12]);
        assert_eq!(delay.last_de_delayed(), None);
        delay.push([13, 14, 15, 16]);
        assert_eq!(delay.last_de_delayed(), Some([1, 6, 11, 16]));
        delay.push([17, 18, 19, 20]);
        assert_eq!(delay.last_de_delayed(), Some([5, 10, 15, 20]));
    }

    #[test]
    fn guidance_formula() {
        let cond = Array2::from_shape_vec((1, 3), vec![10.0, -1.0, 3.0]).unwrap();
        let uncond = Array2::from_shape_vec((1, 3), vec![2.0, 1.0, 3.0]).unwrap();
        let guided = apply_guidance(&cond, &uncond, 2.0);
        assert_eq!(guided[[0, 0]], 18.0);
        assert_eq!(guided[[0, 1]], -3.0);
        assert_eq!(guided[[0, 2]], 3.0);
    }

    #[test]
    fn fused_split_rejects_odd_batches() {
        let logits = Array2::from_shape_vec((3, 2), vec![0.0; 6]).unwrap();
        assert!(split_fused(logits).is_err());
    }

    #[test]
    fn missing_files_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_model_files(dir.path(), ModelVariant::Melody).unwrap_err();
        assert!(err.message.contains("tokenizer.json"));
        assert!(err.message.contains(MELODY_ENCODER_FILE));
    }

    #[test]
    fn melody_encoder_not_required_for_text_variants() {
        let dir = tempfile::tempdir().unwrap();
        for file in REQUIRED_MODEL_FILES {
            std::fs::write(dir.path().join(file), b"stub").unwrap();
        }
        assert!(check_model_files(dir.path(), ModelVariant::Small).is_ok());
        assert!(check_model_files(dir.path(), ModelVariant::Melody).is_err());
    }
}
