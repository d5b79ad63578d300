//! # Error types
//!
//! Typed failures for the path pipeline. Anything that can go wrong while
//! resolving anchors, querying the index or synthesizing a path surfaces as a
//! [`PathError`]. Store construction and persistence have their own
//! [`StoreError`], and the embedding capability reports [`EmbeddingError`].
//!
//! Running out of walk candidates is **not** an error, and neither is a path
//! that comes back shorter than `max_steps`.

use thiserror::Error;

/// Errors raised by the resolver, the index and the path synthesizer.
#[derive(Debug, Error)]
pub enum PathError {
    /// `k` or `max_steps` was below 1. Raised before any search runs.
    #[error("invalid parameter `{name}`: {value} (must be >= 1)")]
    InvalidParameter { name: &'static str, value: i64 },

    /// A label could not be mapped to any item because the store is empty.
    #[error("could not resolve `{0}`: the vector store is empty")]
    NotResolvable(String),

    /// A query vector does not have the store's dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An id handed to the synthesizer is not in the store.
    ///
    /// Anchors always come from the resolver, so this means the store and the
    /// caller disagree about what exists.
    #[error("item `{0}` is not present in the vector store")]
    UnknownItem(String),

    /// The embedding capability failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// An index backend rejected an operation.
    #[error("index error: {0}")]
    Index(String),
}

/// Errors raised while loading or running the sentence embedding model.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("model download failed: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("model inference failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("invalid model config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// No embedding is known for this text (lookup embedders only).
    #[error("no embedding available for `{0}`")]
    Unknown(String),
}

/// Errors raised while building, saving or loading a [`crate::store::VectorStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("column length mismatch: {ids} ids, {embeddings} embeddings, {metadata} metadata records")]
    LengthMismatch {
        ids: usize,
        embeddings: usize,
        metadata: usize,
    },

    #[error("embedding for `{id}` has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate id `{0}`")]
    DuplicateId(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to encode store: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode store: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}
