//! # VectorStore
//!
//! Immutable, position-aligned collection of item ids, embedding vectors and
//! metadata records. Row `i` of every column describes the same item, and the
//! row order is the ingestion order; nearest-neighbour tie-breaks and the
//! id→position map both depend on it.
//!
//! ## Invariants (checked on every construction, including [`VectorStore::load`])
//! - `ids.len() == embeddings.len() == metadata.len()`
//! - every embedding has the store's dimension
//! - ids are unique
//!
//! ## Persistence layout
//! A single `bincode` (serde, standard config) blob holding the dimension, the
//! id column, the row-major `N×D` embedding matrix and the metadata column.
//!
//! ## Quick Example
//! ```rust
//! use semantic_path::store::{ItemMetadata, VectorStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = VectorStore::new(
//!     2,
//!     vec!["a".into(), "b".into()],
//!     vec![vec![0.0, 0.0], vec![1.0, 0.0]],
//!     vec![ItemMetadata::labelled("Alpha"), ItemMetadata::labelled("Beta")],
//! )?;
//! assert_eq!(store.position("b"), Some(1));
//! # Ok(()) }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::StoreError;

/// Metadata attached to one stored item.
///
/// `label` drives resolution and dedup; `document` is the combined text the
/// item was embedded from and is where display descriptions come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Display title.
    #[serde(default)]
    pub label: String,
    /// Short identifier, e.g. a catalog number.
    #[serde(default)]
    pub code: String,
    /// Provenance marker (originating sheet or feed).
    #[serde(default)]
    pub source_tag: String,
    /// Where the ingestion collaborator read this record from.
    #[serde(default)]
    pub source: String,
    /// Combined document text, fields joined with [`crate::hydrate::DOCUMENT_SEPARATOR`].
    #[serde(default)]
    pub document: String,
}

impl ItemMetadata {
    /// Metadata with only a label set. Handy for fixtures.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Position-aligned ids, embeddings and metadata with an id→position index.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    ids: Vec<String>,
    /// Row-major `N×D` matrix, shared with indexes built over the store.
    embeddings: Arc<[f32]>,
    metadata: Vec<ItemMetadata>,
    positions: HashMap<String, usize>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    dimension: usize,
    ids: &'a [String],
    embeddings: &'a [f32],
    metadata: &'a [ItemMetadata],
}

#[derive(Deserialize)]
struct StoreFile {
    dimension: usize,
    ids: Vec<String>,
    embeddings: Vec<f32>,
    metadata: Vec<ItemMetadata>,
}

impl VectorStore {
    /// Build a store from per-row embeddings.
    ///
    /// # Errors
    /// - [`StoreError::LengthMismatch`] if the three columns differ in length.
    /// - [`StoreError::DimensionMismatch`] if any row is not `dimension` long.
    /// - [`StoreError::DuplicateId`] on the first repeated id.
    pub fn new(
        dimension: usize,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<ItemMetadata>,
    ) -> Result<Self, StoreError> {
        if ids.len() != embeddings.len() || ids.len() != metadata.len() {
            return Err(StoreError::LengthMismatch {
                ids: ids.len(),
                embeddings: embeddings.len(),
                metadata: metadata.len(),
            });
        }

        let mut flat = Vec::with_capacity(ids.len() * dimension);
        for (id, row) in ids.iter().zip(&embeddings) {
            if row.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    id: id.clone(),
                    expected: dimension,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }

        Self::from_flat(dimension, ids, flat, metadata)
    }

    /// Build a store from an already flattened row-major matrix.
    pub fn from_flat(
        dimension: usize,
        ids: Vec<String>,
        embeddings: Vec<f32>,
        metadata: Vec<ItemMetadata>,
    ) -> Result<Self, StoreError> {
        let rows = if dimension == 0 {
            0
        } else {
            embeddings.len() / dimension
        };
        if ids.len() != metadata.len() || rows != ids.len() {
            return Err(StoreError::LengthMismatch {
                ids: ids.len(),
                embeddings: rows,
                metadata: metadata.len(),
            });
        }
        if dimension != 0 && embeddings.len() % dimension != 0 {
            let id = ids.last().cloned().unwrap_or_default();
            return Err(StoreError::DimensionMismatch {
                id,
                expected: dimension,
                actual: embeddings.len() % dimension,
            });
        }

        let mut positions = HashMap::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            if positions.insert(id.clone(), position).is_some() {
                return Err(StoreError::DuplicateId(id.clone()));
            }
        }

        Ok(Self {
            dimension,
            ids,
            embeddings: embeddings.into(),
            metadata,
            positions,
        })
    }

    /// An empty store of the given dimension.
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            embeddings: Vec::<f32>::new().into(),
            metadata: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, position: usize) -> &str {
        &self.ids[position]
    }

    /// Embedding row at `position`.
    ///
    /// # Panics
    /// Panics if `position >= len()`.
    pub fn embedding(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.embeddings[start..start + self.dimension]
    }

    /// The whole row-major embedding matrix.
    pub fn embeddings(&self) -> &[f32] {
        &self.embeddings
    }

    /// Shared handle to the embedding matrix; no rows are copied.
    pub fn shared_embeddings(&self) -> Arc<[f32]> {
        Arc::clone(&self.embeddings)
    }

    pub fn metadata(&self, position: usize) -> &ItemMetadata {
        &self.metadata[position]
    }

    pub fn label(&self, position: usize) -> &str {
        &self.metadata[position].label
    }

    /// Position of `id` in store order, if present.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Content hash over ids, embeddings and labels.
    ///
    /// Two stores with equal fingerprints produce identical index builds, which
    /// is what keys the on-disk HNSW cache.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.dimension as u64).to_le_bytes());
        for (id, meta) in self.ids.iter().zip(&self.metadata) {
            hasher.update(id.as_bytes());
            hasher.update(&[0]);
            hasher.update(meta.label.as_bytes());
            hasher.update(&[0]);
        }
        for value in self.embeddings.iter() {
            hasher.update(&value.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Write the store to `path` as a single bincode blob.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = StoreFileRef {
            dimension: self.dimension,
            ids: &self.ids,
            embeddings: &self.embeddings,
            metadata: &self.metadata,
        };
        let bytes = bincode::serde::encode_to_vec(&file, bincode::config::standard())?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a store written by [`VectorStore::save`], re-checking every invariant.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = fs::read(path)?;
        let (file, _): (StoreFile, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        let store = Self::from_flat(file.dimension, file.ids, file.embeddings, file.metadata)?;
        tracing::info!(
            "Loaded vector store from {} ({} items, dimension {})",
            path.display(),
            store.len(),
            store.dimension()
        );
        Ok(store)
    }
}
