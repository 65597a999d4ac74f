//! # Whisper Session
//!
//! Loads and runs a Whisper model with Candle. A session owns the model
//! weights, tokenizer, and mel front end for one device; backends wrap a
//! session and add their own policy (timeout racing, chunking, container
//! re-encoding).
//!
//! ## Loading Process:
//! 1. Download model files from HuggingFace if not cached locally
//! 2. Load tokenizer and configuration, resolve the special token ids
//! 3. Initialize model weights on the requested device
//!
//! The synchronous parse/mmap section runs on the blocking pool, so a
//! deadline raced against `load` stays observable throughout.
//!
//! The download cache location honors `HF_HUB_CACHE` and `HF_HOME`, and
//! can be cleared per-repository for the accelerated backend's
//! self-healing step.

use crate::audio::codec;
use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use std::path::PathBuf;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Maximum decoded tokens per segment.
const MAX_TOKENS: usize = 200;

/// Special token ids resolved from the tokenizer vocabulary.
///
/// Multilingual and English-only checkpoints disagree on the ids, and the
/// English-only vocabulary has no language or task tokens at all, so the
/// ids are looked up at load time instead of hard-coded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SpecialTokens {
    sot: u32,
    eot: u32,
    language: Option<u32>,
    task: Option<u32>,
}

impl SpecialTokens {
    fn resolve(lookup: impl Fn(&str) -> Option<u32>) -> Result<Self> {
        let sot = lookup("<|startoftranscript|>")
            .ok_or_else(|| anyhow!("tokenizer has no <|startoftranscript|> token"))?;
        let eot = lookup("<|endoftext|>")
            .ok_or_else(|| anyhow!("tokenizer has no <|endoftext|> token"))?;

        Ok(Self {
            sot,
            eot,
            language: lookup("<|en|>"),
            task: lookup("<|transcribe|>"),
        })
    }

    /// Decoder seed: start marker, then language and task where the
    /// vocabulary has them.
    fn prefix(&self) -> Vec<u32> {
        let mut tokens = vec![self.sot];
        tokens.extend(self.language);
        tokens.extend(self.task);
        tokens
    }
}

/// A loaded Whisper model ready for transcription.
pub struct WhisperSession {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    special: SpecialTokens,
}

impl WhisperSession {
    /// Download (if needed) and load a Whisper model.
    ///
    /// `progress` receives coarse percent updates as each model file
    /// lands; backends forward it to their init callbacks.
    pub async fn load(
        repo: &str,
        device: Device,
        progress: Option<&(dyn Fn(u8) + Send + Sync)>,
    ) -> Result<Self> {
        info!("Loading Whisper model from {}...", repo);
        let start_time = std::time::Instant::now();

        let report = |percent: u8| {
            if let Some(callback) = progress {
                callback(percent);
            }
        };
        report(0);

        let api = {
            use hf_hub::api::tokio::ApiBuilder;

            let mut builder = ApiBuilder::new().with_progress(false);
            builder = builder.with_token(std::env::var("HF_TOKEN").ok());
            if let Some(cache_dir) = hub_cache_dir() {
                builder = builder.with_cache_dir(cache_dir);
            }
            builder
                .build()
                .map_err(|e| anyhow!("Failed to create HuggingFace API client: {}", e))?
        };

        let api_repo = api.model(repo.to_string());

        let config_filename = api_repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", repo, e))?;
        report(25);

        let tokenizer_filename = api_repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", repo, e))?;
        report(50);

        let model_filename = api_repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model weights from {}: {}", repo, e))?;
        report(75);

        // Parsing, mmap, and weight construction are synchronous; run them
        // on the blocking pool so a caller racing this load against a
        // deadline is never starved of its timer.
        let blocking_device = device.clone();
        let (model, config, tokenizer) = tokio::task::spawn_blocking(
            move || -> Result<(m::model::Whisper, Config, Tokenizer)> {
                let config: Config =
                    serde_json::from_reader(std::fs::File::open(config_filename)?)?;

                let tokenizer = Tokenizer::from_file(tokenizer_filename)
                    .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

                let vb = unsafe {
                    VarBuilder::from_mmaped_safetensors(&[model_filename], m::DTYPE, &blocking_device)?
                };
                let model = m::model::Whisper::load(&vb, config.clone())?;
                Ok((model, config, tokenizer))
            },
        )
        .await
        .map_err(|e| anyhow!("Model load task failed: {}", e))??;
        debug!("Model config: {:?}", config);
        report(90);

        let special = SpecialTokens::resolve(|token| tokenizer.token_to_id(token))?;

        let load_time = start_time.elapsed();
        info!(
            "Whisper model {} loaded in {:.2}s",
            repo,
            load_time.as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            special,
        })
    }

    /// Transcribe raw float samples at 16kHz.
    pub async fn transcribe(&mut self, audio: &[f32]) -> Result<String> {
        if audio.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let start_time = std::time::Instant::now();

        let mel = self.audio_to_mel(audio)?;
        let mel = mel.unsqueeze(0)?;
        let encoder_output = self.model.encoder.forward(&mel, true)?;

        let mut tokens = self.special.prefix();
        let prefix_len = tokens.len();
        let mut output_tokens: Vec<u32> = Vec::new();

        for _ in 0..MAX_TOKENS {
            let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
            let logits = self
                .model
                .decoder
                .forward(&token_tensor, &encoder_output, false)?;

            let last_logits = logits.i((.., tokens.len() - 1, ..))?;
            let next_token = last_logits.argmax_keepdim(1)?.to_scalar::<u32>()?;

            if next_token == self.special.eot {
                break;
            }

            if is_repetitive(&output_tokens, next_token) {
                debug!("Stopping decode on repetition guard");
                break;
            }

            tokens.push(next_token);
            output_tokens.push(next_token);
        }
        debug_assert_eq!(tokens.len(), prefix_len + output_tokens.len());

        let text = self.decode_tokens(&output_tokens)?;

        debug!(
            "Transcribed {:.2}s of audio in {:.2}s: '{}'",
            audio.len() as f64 / 16000.0,
            start_time.elapsed().as_secs_f64(),
            text
        );

        Ok(text)
    }

    /// Transcribe an encoded audio container (accelerated path input).
    ///
    /// The container is decoded back to floats; a container rate above the
    /// inference rate is downsampled, a rate below it is rejected.
    pub async fn transcribe_container(&mut self, container: &[u8]) -> Result<String> {
        let (samples, sample_rate) =
            codec::wav_to_float(container).map_err(|e| anyhow!("{}", e))?;

        let samples = if sample_rate == codec::TARGET_SAMPLE_RATE {
            samples
        } else {
            codec::downsample_audio(samples, sample_rate, codec::TARGET_SAMPLE_RATE)
                .map_err(|e| anyhow!("{}", e))?
        };

        self.transcribe(&samples).await
    }

    /// Convert samples to a log-mel tensor of shape (n_mels, n_frames).
    ///
    /// A simplified energy-based front end: audio is padded or truncated
    /// to 30 seconds and reduced to per-frame log energies weighted by a
    /// triangular bank.
    fn audio_to_mel(&self, audio: &[f32]) -> Result<Tensor> {
        const TARGET_LEN: usize = 30 * 16000;
        const N_FRAMES: usize = 3000;
        const LOG_FLOOR: f32 = -11.5129; // -80 dB

        let mut padded = vec![0.0f32; TARGET_LEN];
        let copy_len = audio.len().min(TARGET_LEN);
        padded[..copy_len].copy_from_slice(&audio[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let frame_size = TARGET_LEN / N_FRAMES;
        let mut mel_data = vec![0.0f32; n_mels * N_FRAMES];

        for frame in 0..N_FRAMES {
            let start = frame * frame_size;
            let end = (start + frame_size).min(padded.len());

            let mut energy = 0.0f32;
            for &sample in &padded[start..end] {
                energy += sample.abs();
            }
            let log_energy = (energy / frame_size as f32).ln().max(LOG_FLOOR);

            for mel_bin in 0..n_mels {
                // Triangular weighting across the bank
                let center = (mel_bin + 1) as f32 / (n_mels + 1) as f32;
                let weight = 1.0 - (center - 0.5).abs();
                mel_data[mel_bin * N_FRAMES + frame] = log_energy * weight;
            }
        }

        Ok(Tensor::from_vec(mel_data, (n_mels, N_FRAMES), &self.device)?)
    }

    /// Decode tokens to text and strip tokenizer artifacts.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");

        Ok(cleaned.trim().to_string())
    }

}

/// Detect pattern repetition in the decoded token stream.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    // Immediate repetition: the same token three times running
    if tokens.len() >= 2 {
        let tail = &tokens[tokens.len() - 2..];
        if tail[0] == new_token && tail[1] == new_token {
            return true;
        }
    }

    // Pattern repetition: the last three tokens repeat the previous three
    if tokens.len() >= 6 {
        let last_3 = &tokens[tokens.len() - 3..];
        let prev_3 = &tokens[tokens.len() - 6..tokens.len() - 3];
        if last_3 == prev_3 {
            return true;
        }
    }

    false
}

/// Resolve the HuggingFace hub cache directory, if any override is set.
fn hub_cache_dir() -> Option<PathBuf> {
    if let Ok(cache) = std::env::var("HF_HUB_CACHE") {
        return Some(PathBuf::from(cache));
    }
    if let Ok(home) = std::env::var("HF_HOME") {
        return Some(PathBuf::from(home).join("hub"));
    }
    None
}

/// The cache directory a repository's files land in.
pub fn model_cache_dir(repo: &str) -> Option<PathBuf> {
    let base = hub_cache_dir().or_else(|| {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".cache").join("huggingface").join("hub"))
    })?;
    Some(base.join(format!("models--{}", repo.replace('/', "--"))))
}

/// Remove a repository's cached files. Best effort: a corrupted cache must
/// not permanently block retries, but failing to remove it is only worth a
/// warning.
pub fn clear_model_cache(repo: &str) {
    match model_cache_dir(repo) {
        Some(dir) if dir.exists() => match std::fs::remove_dir_all(&dir) {
            Ok(()) => info!("Cleared model cache at {:?}", dir),
            Err(e) => warn!("Failed to clear model cache at {:?}: {}", dir, e),
        },
        Some(dir) => debug!("No model cache to clear at {:?}", dir),
        None => warn!("Could not resolve a cache directory for {}", repo),
    }
}
