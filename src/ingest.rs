//! # Ingestion
//!
//! Builds a [`VectorStore`] from raw catalog records so the path service has
//! something to walk over.
//!
//! ## Input
//! JSON Lines, one object per line:
//!
//! ```text
//! {"code": "6.006", "label": "Introduction to Algorithms", "description": "...", "source_tag": "Course 6"}
//! ```
//!
//! ## Rules
//! - A record with an empty `code` is skipped.
//! - The item id is `<source_tag>_<code>`; when an id repeats, the first record wins.
//! - The embedded document is the non-empty fields among `code`, `label` and
//!   `description`, joined with [`DOCUMENT_SEPARATOR`]. The hydrator relies on
//!   this layout to recover the description.
//! - Documents are embedded in parallel; row order is input order.

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::hydrate::DOCUMENT_SEPARATOR;
use crate::store::{ItemMetadata, VectorStore};

/// One raw catalog record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_tag: String,
}

impl SourceRecord {
    pub fn id(&self) -> String {
        format!("{}_{}", self.source_tag, self.code)
    }

    /// Non-empty `code`, `label`, `description`, joined with [`DOCUMENT_SEPARATOR`].
    pub fn document(&self) -> String {
        [&self.code, &self.label, &self.description]
            .into_iter()
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR)
    }
}

/// Read a JSON Lines file of [`SourceRecord`]s. Blank lines are ignored.
pub fn read_records(path: &Path) -> Result<Vec<SourceRecord>, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SourceRecord = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {}", path.display(), line_no + 1, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Embed `records` and assemble a store.
///
/// `source` is recorded in every item's metadata as its provenance.
pub fn build_store(
    records: &[SourceRecord],
    embedder: &dyn Embedder,
    source: &str,
) -> Result<VectorStore, Box<dyn Error>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut metadata = Vec::new();

    for record in records {
        if record.code.trim().is_empty() {
            warn!("Skipping record without a code: {:?}", record.label);
            continue;
        }
        let id = record.id();
        if !seen.insert(id.clone()) {
            warn!("Skipping duplicate id {}", id);
            continue;
        }
        metadata.push(ItemMetadata {
            label: record.label.trim().to_string(),
            code: record.code.trim().to_string(),
            source_tag: record.source_tag.clone(),
            source: source.to_string(),
            document: record.document(),
        });
        ids.push(id);
    }

    let bar = ProgressBar::new(metadata.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} embedding [{bar:40}] {pos}/{len} ({eta})",
    )?);

    let embeddings = metadata
        .par_iter()
        .progress_with(bar.clone())
        .map(|meta| embedder.embed(&meta.document))
        .collect::<Result<Vec<_>, _>>()?;
    bar.finish_and_clear();

    let store = VectorStore::new(embedder.dimension(), ids, embeddings, metadata)?;
    info!("Ingested {} records from {}", store.len(), source);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LookupEmbedder;
    use crate::hydrate::split_raw;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(code: &str, label: &str, description: &str, tag: &str) -> SourceRecord {
        SourceRecord {
            code: code.into(),
            label: label.into(),
            description: description.into(),
            source_tag: tag.into(),
        }
    }

    #[test]
    fn test_document_joins_present_fields() {
        let full = record("6.006", "Algorithms", "Sorting.", "c6");
        assert_eq!(full.document(), "6.006 \n Algorithms \n Sorting.");
        assert_eq!(split_raw(&full.document()), "Sorting.");

        let partial = record("6.006", "Algorithms", "", "c6");
        assert_eq!(partial.document(), "6.006 \n Algorithms");
        assert_eq!(split_raw(&partial.document()), "");
        assert_eq!(full.id(), "c6_6.006");
    }

    #[test]
    fn test_build_store_skips_bad_rows() {
        let records = vec![
            record("1", "One", "first", "s"),
            record("", "Nameless", "no code", "s"),
            record("2", "Two", "second", "s"),
            record("1", "One again", "dup", "s"),
        ];
        let embedder = LookupEmbedder::new(2)
            .with("1 \n One \n first", vec![0.0, 1.0])
            .with("2 \n Two \n second", vec![1.0, 0.0]);

        let store = build_store(&records, &embedder, "catalog.jsonl").unwrap();
        assert_eq!(store.ids(), &["s_1".to_string(), "s_2".to_string()]);
        assert_eq!(store.embedding(1), &[1.0, 0.0]);
        assert_eq!(store.metadata(0).label, "One");
        assert_eq!(store.metadata(0).source, "catalog.jsonl");
    }

    #[test]
    fn test_build_store_propagates_embedding_errors() {
        let records = vec![record("1", "One", "first", "s")];
        let embedder = LookupEmbedder::new(2);
        assert!(build_store(&records, &embedder, "x").is_err());
    }

    #[test]
    fn test_read_records() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"code": "18.01", "label": "Calculus", "source_tag": "Math"}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"code": "18.06", "label": "Linear Algebra", "description": "Matrices.", "source_tag": "Math"}}"#
        )
        .unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "");
        assert_eq!(records[1].id(), "Math_18.06");
    }

    #[test]
    fn test_read_records_reports_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        let err = read_records(file.path()).unwrap_err();
        assert!(err.to_string().contains(":1:"));
    }
}
