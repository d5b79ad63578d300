//! # Embeddings
//!
//! The embedding-producing capability the resolver and the path service
//! consume. Anything that turns text into a fixed-length `f32` vector can sit
//! behind the [`Embedder`] trait.
//!
//! ## Implementations
//! - [`SentenceEmbeddingsModel`]: all-MiniLM-L6-v2 (or any BERT sentence
//!   model) run through Candle, weights fetched from the Hugging Face Hub.
//!   Mean pooling over the attention mask, then L2 normalisation.
//! - [`LookupEmbedder`]: a fixed table of text → vector, for fixtures and for
//!   running against stores whose query vocabulary is known up front.
//!
//! ## Quick Example
//! ```no_run
//! use semantic_path::embeddings::{Embedder, SentenceEmbeddingsModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SentenceEmbeddingsModel::load("sentence-transformers/all-MiniLM-L6-v2", "main")?;
//! let v = model.embed("Introduction to Algorithms")?;
//! assert_eq!(v.len(), model.dimension());
//! # Ok(()) }
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::collections::HashMap;
use tokenizers::Tokenizer;

use crate::error::EmbeddingError;

/// Text → vector capability. Implementations must be callable concurrently.
pub trait Embedder: Send + Sync {
    /// Embed `text` into a vector of length [`Embedder::dimension`].
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

/// Sentence embeddings model using Candle (pure Rust)
pub struct SentenceEmbeddingsModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl SentenceEmbeddingsModel {
    /// Load the model from Hugging Face Hub
    pub fn load(model_id: &str, revision: &str) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;

        // Download model files from Hugging Face (cached after the first run)
        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new()?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json")?;
        let tokenizer_filename = api_repo.get("tokenizer.json")?;
        let weights_filename = api_repo.get("model.safetensors")?;

        let raw_config = std::fs::read_to_string(config_filename)?;
        let config: Config = serde_json::from_str(&raw_config)?;
        let dimension = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(384) as usize;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        tracing::info!("Loaded embedding model {model_id}@{revision} (dimension {dimension})");

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    /// Encode text into an embedding
    pub fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let embedding = self.mean_pooling(&output, tokens.get_attention_mask())?;
        let embedding = self.normalize(&embedding)?;

        Ok(embedding.to_vec1::<f32>()?)
    }

    /// Mean pooling over token embeddings, considering attention mask
    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &[u32],
    ) -> Result<Tensor, EmbeddingError> {
        // embeddings: [1, seq_len, hidden]; mask broadcast as [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;

        Ok(sum.broadcast_div(&count)?.squeeze(0)?)
    }

    /// L2 normalize the embedding vector
    fn normalize(&self, tensor: &Tensor) -> Result<Tensor, EmbeddingError> {
        let norm = tensor.sqr()?.sum_all()?.sqrt()?;
        Ok(tensor.broadcast_div(&norm)?)
    }
}

impl Embedder for SentenceEmbeddingsModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.encode(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Fixed table of text → vector.
///
/// Keys are matched case-insensitively after trimming, the same normalisation
/// the resolver applies to labels.
#[derive(Debug, Clone, Default)]
pub struct LookupEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
}

impl LookupEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: HashMap::new(),
        }
    }

    /// Add or replace the vector for `text`.
    pub fn insert(&mut self, text: &str, vector: Vec<f32>) {
        self.table.insert(normalize_key(text), vector);
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.insert(text, vector);
        self
    }
}

fn normalize_key(text: &str) -> String {
    text.trim().to_lowercase()
}

impl Embedder for LookupEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.table
            .get(&normalize_key(text))
            .cloned()
            .ok_or_else(|| EmbeddingError::Unknown(text.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_embedder_normalizes_keys() {
        let embedder = LookupEmbedder::new(2).with("Linear Algebra", vec![1.0, 2.0]);
        assert_eq!(embedder.embed("  linear ALGEBRA ").unwrap(), vec![1.0, 2.0]);
        assert_eq!(embedder.dimension(), 2);
    }

    #[test]
    fn test_lookup_embedder_unknown_text() {
        let embedder = LookupEmbedder::new(2);
        let err = embedder.embed("nothing").unwrap_err();
        assert!(matches!(err, EmbeddingError::Unknown(t) if t == "nothing"));
    }

    #[test]
    #[ignore = "downloads all-MiniLM-L6-v2 from the Hugging Face Hub"]
    fn test_sentence_model_embeds_normalized_vectors() -> Result<(), Box<dyn std::error::Error>> {
        let model = SentenceEmbeddingsModel::load("sentence-transformers/all-MiniLM-L6-v2", "main")?;
        let v = model.embed("Rust is cool.")?;
        assert_eq!(v.len(), model.dimension());
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        Ok(())
    }
}
