//! Text generation from local llama-family weights (candle)

use super::device::{describe, generation_dtype, select_device};
use crate::error::{RagError, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const SAMPLING_SEED: u64 = 299_792_458;

#[derive(Deserialize)]
struct Architecture {
    #[serde(default)]
    model_type: String,
}

/// Output of one generation
pub(crate) struct Generated {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Loaded causal LM; all methods are blocking
pub(crate) struct CandleGenerator {
    model: Llama,
    config: Config,
    tokenizer: Tokenizer,
    device: Device,
    dtype: DType,
    eos_token_id: Option<u32>,
}

fn tokenizer_error(e: impl std::fmt::Display) -> RagError {
    RagError::provider("huggingface", format!("tokenizer error: {}", e))
}

fn safetensors_files(model_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(model_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("safetensors"))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(RagError::ModelNotFound(format!(
            "no .safetensors weights in {}",
            model_dir.display()
        )));
    }
    Ok(files)
}

impl CandleGenerator {
    pub(crate) fn load(model_dir: &Path) -> Result<Self> {
        let raw_config = std::fs::read(model_dir.join("config.json"))?;
        let architecture: Architecture = serde_json::from_slice(&raw_config)?;
        if architecture.model_type != "llama" {
            return Err(RagError::Config(format!(
                "unsupported architecture '{}': only llama-family checkpoints run locally",
                architecture.model_type
            )));
        }
        let llama_config: LlamaConfig = serde_json::from_slice(&raw_config)?;
        let config = llama_config.into_config(false);

        let tokenizer =
            Tokenizer::from_file(model_dir.join("tokenizer.json")).map_err(tokenizer_error)?;
        let eos_token_id = tokenizer.token_to_id("</s>");

        let device = select_device();
        let dtype = generation_dtype(&device);
        let weights = safetensors_files(model_dir)?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weights, dtype, &device)? };
        let model = Llama::load(vb, &config)?;

        tracing::info!(
            "Language model loaded from {} on {} ({:?})",
            model_dir.display(),
            describe(&device),
            dtype
        );

        Ok(Self {
            model,
            config,
            tokenizer,
            device,
            dtype,
            eos_token_id,
        })
    }

    pub(crate) fn generate(
        &self,
        prompt: &str,
        max_new_tokens: usize,
        temperature: f32,
    ) -> Result<Generated> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(tokenizer_error)?;
        let mut tokens = encoding.get_ids().to_vec();
        let prompt_len = tokens.len();

        let temperature = (temperature > 0.0).then_some(temperature as f64);
        let mut sampler = LogitsProcessor::new(SAMPLING_SEED, temperature, None);
        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)?;

        let mut index_pos = 0;
        for step in 0..max_new_tokens {
            if tokens.len() >= self.config.max_position_embeddings {
                break;
            }
            let context_size = if step > 0 { 1 } else { tokens.len() };
            let context = &tokens[tokens.len() - context_size..];
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, index_pos, &mut cache)?;
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            index_pos += context.len();

            let next = sampler.sample(&logits)?;
            if Some(next) == self.eos_token_id {
                break;
            }
            tokens.push(next);
        }

        let text = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(tokenizer_error)?;

        Ok(Generated {
            text: text.trim().to_string(),
            prompt_tokens: prompt_len as u32,
            completion_tokens: (tokens.len() - prompt_len) as u32,
        })
    }
}
