//! # Path service
//!
//! The public `compute_path` operation: resolve both labels, synthesize the
//! path, hydrate it for display.
//!
//! A [`PathService`] owns the store, its index and the embedder. All three are
//! read-only after construction, so one service can be shared behind an `Arc`
//! and called from many threads at once.
//!
//! ```rust
//! use semantic_path::embeddings::LookupEmbedder;
//! use semantic_path::index::IndexBackend;
//! use semantic_path::service::PathService;
//! use semantic_path::store::{ItemMetadata, VectorStore};
//! use semantic_path::synth::PathParams;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = VectorStore::new(
//!     1,
//!     vec!["a".into(), "b".into(), "c".into()],
//!     vec![vec![0.0], vec![1.0], vec![2.0]],
//!     vec![
//!         ItemMetadata::labelled("Start"),
//!         ItemMetadata::labelled("Middle"),
//!         ItemMetadata::labelled("Finish"),
//!     ],
//! )?;
//! let embedder = LookupEmbedder::new(1).with("Finish", vec![2.0]);
//! let service = PathService::with_backend(store, IndexBackend::Flat, None, Box::new(embedder))?;
//!
//! let steps = service.compute_path("start", "finish", PathParams::new(2, 3))?;
//! assert_eq!(steps.first().map(|s| s.label.as_str()), Some("Start"));
//! assert_eq!(steps.last().map(|s| s.label.as_str()), Some("Finish"));
//! # Ok(()) }
//! ```

use std::path::Path;

use tracing::info;

use crate::embeddings::Embedder;
use crate::error::PathError;
use crate::hydrate::{StepContent, hydrate};
use crate::index::{IndexBackend, VectorIndex};
use crate::resolver::Resolver;
use crate::store::VectorStore;
use crate::synth::{PathParams, PathSynthesizer};

/// Store + index + embedder, wired together.
pub struct PathService {
    store: VectorStore,
    index: Box<dyn VectorIndex>,
    embedder: Box<dyn Embedder>,
}

impl PathService {
    /// Wire an already built index to its store.
    ///
    /// # Errors
    /// [`PathError::DimensionMismatch`] if the index or the embedder disagree
    /// with the store's dimension, or the index does not cover every row.
    pub fn new(
        store: VectorStore,
        index: Box<dyn VectorIndex>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self, PathError> {
        for actual in [index.dimension(), embedder.dimension()] {
            if actual != store.dimension() {
                return Err(PathError::DimensionMismatch {
                    expected: store.dimension(),
                    actual,
                });
            }
        }
        if index.len() != store.len() {
            return Err(PathError::Index(format!(
                "index holds {} vectors but the store has {}",
                index.len(),
                store.len()
            )));
        }
        Ok(Self {
            store,
            index,
            embedder,
        })
    }

    /// Build `backend` over `store` and wire everything together.
    pub fn with_backend(
        store: VectorStore,
        backend: IndexBackend,
        cache_dir: Option<&Path>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self, PathError> {
        let index = backend.build(&store, cache_dir)?;
        info!(
            "{:?} index built with {} embeddings",
            backend,
            index.len()
        );
        Self::new(store, index, embedder)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Resolve both labels and synthesize the id path between them.
    pub fn path_ids(
        &self,
        start_label: &str,
        end_label: &str,
        params: PathParams,
    ) -> Result<Vec<&str>, PathError> {
        params.validate()?;

        let resolver = Resolver::new(&self.store, self.index.as_ref(), self.embedder.as_ref());
        let start_id = resolver.resolve(start_label)?;
        let end_id = resolver.resolve(end_label)?;
        info!("Resolved: {} -> {}", start_id, end_id);

        let end_vector = self.embedder.embed(end_label)?;
        let path = PathSynthesizer::new(&self.store, self.index.as_ref()).synthesize(
            start_id,
            end_id,
            &end_vector,
            params,
        )?;
        info!("Path length: {}", path.len());
        Ok(path)
    }

    /// Compute the display path from `start_label` to `end_label`.
    ///
    /// # Errors
    /// - [`PathError::InvalidParameter`] before any search if `k` or `max_steps` is 0.
    /// - [`PathError::NotResolvable`] if the store is empty.
    /// - [`PathError::Embedding`] if the end label cannot be embedded.
    pub fn compute_path(
        &self,
        start_label: &str,
        end_label: &str,
        params: PathParams,
    ) -> Result<Vec<StepContent>, PathError> {
        let path = self.path_ids(start_label, end_label, params)?;
        let steps = hydrate(&self.store, path.as_slice())?;
        info!("Returning {} items", steps.len());
        Ok(steps)
    }
}
