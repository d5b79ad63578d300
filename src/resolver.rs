//! # Resolver
//!
//! Maps a free-text label to an item id.
//!
//! 1. Exact match: trimmed, case-insensitive comparison against every item's
//!    label in store order; the first hit wins.
//! 2. Fallback: embed the text and take the single nearest neighbour.
//!
//! Resolution only fails when the store is empty.

use crate::embeddings::Embedder;
use crate::error::PathError;
use crate::index::VectorIndex;
use crate::store::VectorStore;

/// Label → id resolution over a store, its index and an embedder.
pub struct Resolver<'a> {
    store: &'a VectorStore,
    index: &'a dyn VectorIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a VectorStore,
        index: &'a dyn VectorIndex,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    /// Resolve `text` to the id of an item in the store.
    ///
    /// # Errors
    /// - [`PathError::NotResolvable`] if the store is empty.
    /// - [`PathError::Embedding`] / [`PathError::DimensionMismatch`] if the
    ///   fallback embedding cannot be produced or does not fit the index.
    pub fn resolve(&self, text: &str) -> Result<&'a str, PathError> {
        if self.store.is_empty() {
            return Err(PathError::NotResolvable(text.to_string()));
        }

        if let Some(position) = self.exact_match(text) {
            tracing::debug!("Resolved {:?} by exact label match", text);
            return Ok(self.store.id(position));
        }

        let query = self.embedder.embed(text)?;
        let nearest = self
            .index
            .search(&query, 1)?
            .first()
            .map(|n| n.position)
            .ok_or_else(|| PathError::NotResolvable(text.to_string()))?;
        tracing::debug!("Resolved {:?} by nearest neighbour", text);
        Ok(self.store.id(nearest))
    }

    /// Position of the first item whose label equals `text`, ignoring case and
    /// surrounding whitespace.
    pub fn exact_match(&self, text: &str) -> Option<usize> {
        let wanted = text.trim().to_lowercase();
        (0..self.store.len()).find(|&position| {
            self.store.label(position).trim().to_lowercase() == wanted
        })
    }
}
