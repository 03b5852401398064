//! Sentence embeddings from local BERT-family weights (candle)

use super::device::{describe, select_device};
use crate::error::{RagError, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Sequences longer than this are truncated before encoding
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Texts encoded per forward pass
const ENCODE_BATCH: usize = 32;

/// Loaded encoder; all methods are blocking
pub(crate) struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

fn tokenizer_error(e: impl std::fmt::Display) -> RagError {
    RagError::provider("huggingface", format!("tokenizer error: {}", e))
}

impl CandleEmbedder {
    /// Load tokenizer, config and weights from a snapshot directory
    pub(crate) fn load(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(RagError::ModelNotFound(format!(
                "tokenizer.json not found in {}",
                model_dir.display()
            )));
        }
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(tokenizer_error)?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(tokenizer_error)?;

        let config_str = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: Config = serde_json::from_str(&config_str)?;

        let weights_path = model_dir.join("model.safetensors");
        if !weights_path.exists() {
            return Err(RagError::ModelNotFound(format!(
                "model.safetensors not found in {}",
                model_dir.display()
            )));
        }

        let device = select_device();
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        tracing::info!(
            "Embedding model loaded from {} on {}",
            model_dir.display(),
            describe(&device)
        );

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    pub(crate) fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(ENCODE_BATCH) {
            results.extend(self.encode(batch)?);
        }
        Ok(results)
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(tokenizer_error)?;

        let ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let masks = encodings
            .iter()
            .map(|e| Tensor::new(e.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        // [batch, tokens, hidden]
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_vec2::<f32>()?)
    }
}

/// Mean over non-padding tokens, then L2 normalisation
fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?;
    let mean = summed.broadcast_div(&counts)?;
    let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
    Ok(mean.broadcast_div(&norm)?)
}
