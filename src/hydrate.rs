//! # Hydration
//!
//! Turns a path of ids into display records, one per step, in path order.

use serde::{Deserialize, Serialize};

use crate::error::PathError;
use crate::store::VectorStore;

/// Separator the ingestion step places between fields of an item's document.
pub const DOCUMENT_SEPARATOR: &str = " \n ";

/// One displayed step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    /// 1-based position in the path.
    pub step: usize,
    pub code: String,
    pub label: String,
    pub description: String,
}

/// Description carried by a combined document.
///
/// Documents are `code`, `label` and `description` joined with
/// [`DOCUMENT_SEPARATOR`]. Only a document that splits into at least three
/// parts has a description (its last part); anything else yields `""`.
pub fn split_raw(document: &str) -> &str {
    let parts: Vec<&str> = document.split(DOCUMENT_SEPARATOR).collect();
    if parts.len() >= 3 {
        parts[parts.len() - 1]
    } else {
        ""
    }
}

/// Expand `path` into [`StepContent`] records.
///
/// # Errors
/// [`PathError::UnknownItem`] if an id is not in `store`.
pub fn hydrate<S: AsRef<str>>(
    store: &VectorStore,
    path: &[S],
) -> Result<Vec<StepContent>, PathError> {
    path.iter()
        .enumerate()
        .map(|(i, id)| {
            let id = id.as_ref();
            let position = store
                .position(id)
                .ok_or_else(|| PathError::UnknownItem(id.to_string()))?;
            let meta = store.metadata(position);
            Ok(StepContent {
                step: i + 1,
                code: meta.code.clone(),
                label: meta.label.clone(),
                description: split_raw(&meta.document).to_string(),
            })
        })
        .collect()
}
