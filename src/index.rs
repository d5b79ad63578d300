//! # VectorIndex
//!
//! Nearest-neighbour query structures built once over a [`VectorStore`]'s
//! embedding matrix and read-only afterwards.
//!
//! Two backends sit behind the [`VectorIndex`] trait:
//!
//! - [`FlatIndex`]: exact Euclidean scan. Results come back in ascending
//!   distance with ties broken by ascending store position, and a query equal
//!   to a stored vector returns that position first at distance `0`. This is
//!   the default and the one the path synthesizer's determinism relies on.
//! - [`HnswIndex`]: a [HNSW](https://arxiv.org/abs/1603.09320) graph from the
//!   `hora` crate for stores too large to scan. The graph proposes candidate
//!   positions, distances are recomputed exactly and the list is re-sorted by
//!   `(distance, position)`. Ordering is stable for a given graph; recall is
//!   approximate.
//!
//! Both are `Send + Sync` with no scratch state kept between queries, so a
//! single index can serve concurrent requests.

use hora::core::ann_index::{ANNIndex, SerializableIndex};
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PathError;
use crate::store::VectorStore;

/// One search hit: a store position and its Euclidean distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub position: usize,
}

impl Neighbor {
    /// Ascending distance, then ascending position.
    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Read-only nearest-neighbour index over store positions.
pub trait VectorIndex: Send + Sync {
    /// Number of indexed vectors; equals the store length.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    /// The `min(k, len())` nearest positions to `query`, ascending by distance,
    /// ties by ascending position.
    ///
    /// # Errors
    /// [`PathError::DimensionMismatch`] if `query` has the wrong length.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, PathError>;
}

/// Euclidean distance between two equal-length vectors.
///
/// Extra trailing elements on either side are ignored.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn check_dimension(expected: usize, query: &[f32]) -> Result<(), PathError> {
    if query.len() != expected {
        return Err(PathError::DimensionMismatch {
            expected,
            actual: query.len(),
        });
    }
    Ok(())
}

/// Sort `hits` into rank order and keep the best `k`.
fn rank(mut hits: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    if k == 0 {
        return Vec::new();
    }
    if k < hits.len() {
        hits.select_nth_unstable_by(k - 1, Neighbor::cmp_rank);
        hits.truncate(k);
    }
    hits.sort_unstable_by(Neighbor::cmp_rank);
    hits
}

/// Exact brute-force index over a row-major `N×D` matrix.
///
/// The matrix is shared with the store it was built from.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Arc<[f32]>,
}

impl FlatIndex {
    /// Index every row of `store`, one entry per position in store order.
    pub fn build(store: &VectorStore) -> Self {
        Self::from_matrix(store.dimension(), store.shared_embeddings())
    }

    /// Index a row-major matrix directly.
    pub fn from_matrix(dimension: usize, vectors: Arc<[f32]>) -> Self {
        Self { dimension, vectors }
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

impl VectorIndex for FlatIndex {
    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, PathError> {
        check_dimension(self.dimension, query)?;
        let hits = (0..self.len())
            .map(|position| Neighbor {
                distance: euclidean_distance(self.row(position), query),
                position,
            })
            .collect();
        Ok(rank(hits, k))
    }
}

/// Approximate index backed by a `hora` HNSW graph.
pub struct HnswIndex {
    graph: HNSWIndex<f32, usize>,
    exact: FlatIndex,
}

impl HnswIndex {
    /// Build the graph over `store`, or load it from `cache_dir` when a graph
    /// for the same store fingerprint was dumped there earlier.
    ///
    /// A freshly built graph is dumped to `cache_dir` together with a blake3
    /// checksum, and graphs cached for other fingerprints are removed. A cache
    /// whose checksum does not match is rebuilt.
    pub fn build(store: &VectorStore, cache_dir: Option<&Path>) -> Result<Self, PathError> {
        let exact = FlatIndex::build(store);
        let fingerprint = store.fingerprint();
        let cache_file =
            cache_dir.map(|dir| dir.join(format!("{fingerprint}{HNSW_CACHE_SUFFIX}")));

        if let Some(file) = cache_file.as_deref().filter(|f| f.is_file()) {
            if cache_is_intact(file) {
                match HNSWIndex::<f32, usize>::load(&file.to_string_lossy()) {
                    Ok(graph) => {
                        tracing::info!("Loaded HNSW index from {}", file.display());
                        return Ok(Self { graph, exact });
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring unreadable HNSW cache {}: {}", file.display(), e)
                    }
                }
            } else {
                tracing::warn!("Ignoring corrupt HNSW cache {}", file.display());
            }
        }

        let mut graph = HNSWIndex::<f32, usize>::new(store.dimension(), &HNSWParams::default());
        for position in 0..store.len() {
            graph
                .add(store.embedding(position), position)
                .map_err(|e| PathError::Index(e.to_string()))?;
        }
        graph
            .build(Metric::Euclidean)
            .map_err(|e| PathError::Index(e.to_string()))?;
        tracing::info!("Built HNSW index over {} vectors", store.len());

        if let (Some(dir), Some(file)) = (cache_dir, cache_file) {
            match write_cache(&mut graph, &file) {
                Ok(()) => prune_caches(dir, &fingerprint),
                Err(e) => tracing::warn!("Could not cache HNSW index at {}: {}", file.display(), e),
            }
        }

        Ok(Self { graph, exact })
    }
}

const HNSW_CACHE_SUFFIX: &str = "_hnsw_index.bin";
const CHECKSUM_EXTENSION: &str = "blake3";

fn checksum_file(cache_file: &Path) -> PathBuf {
    let mut name = cache_file.as_os_str().to_owned();
    name.push(".");
    name.push(CHECKSUM_EXTENSION);
    PathBuf::from(name)
}

/// `hora` panics on a graph file it cannot decode, so only files whose
/// checksum matches the one written next to them are handed to it.
fn cache_is_intact(cache_file: &Path) -> bool {
    let (Ok(bytes), Ok(expected)) = (
        fs::read(cache_file),
        fs::read_to_string(checksum_file(cache_file)),
    ) else {
        return false;
    };
    blake3::hash(&bytes).to_hex().as_str() == expected.trim()
}

fn write_cache(graph: &mut HNSWIndex<f32, usize>, cache_file: &Path) -> Result<(), Box<dyn Error>> {
    graph.dump(&cache_file.to_string_lossy())?;
    let bytes = fs::read(cache_file)?;
    fs::write(checksum_file(cache_file), blake3::hash(&bytes).to_hex().as_str())?;
    Ok(())
}

/// Remove graphs (and their checksums) cached for any other fingerprint.
fn prune_caches(dir: &Path, fingerprint: &str) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let is_cache = name.ends_with(HNSW_CACHE_SUFFIX)
            || name.ends_with(&format!("{HNSW_CACHE_SUFFIX}.{CHECKSUM_EXTENSION}"));
        if is_cache && !name.starts_with(fingerprint) {
            match fs::remove_file(entry.path()) {
                Ok(()) => tracing::debug!("Removed stale HNSW cache {}", name),
                Err(e) => tracing::warn!("Could not remove stale HNSW cache {}: {}", name, e),
            }
        }
    }
}

impl VectorIndex for HnswIndex {
    fn len(&self) -> usize {
        self.exact.len()
    }

    fn dimension(&self) -> usize {
        self.exact.dimension()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, PathError> {
        check_dimension(self.exact.dimension(), query)?;
        let hits = self
            .graph
            .search(query, k)
            .into_iter()
            .filter(|&position| position < self.exact.len())
            .map(|position| Neighbor {
                distance: euclidean_distance(self.exact.row(position), query),
                position,
            })
            .collect();
        Ok(rank(hits, k))
    }
}

/// Which index implementation to build over a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Exact scan with deterministic tie-breaks.
    #[default]
    Flat,
    /// Approximate HNSW graph.
    Hnsw,
}

impl IndexBackend {
    /// Build the chosen backend over `store`.
    ///
    /// An empty store always gets a [`FlatIndex`]; there is no graph to build.
    pub fn build(
        self,
        store: &VectorStore,
        cache_dir: Option<&Path>,
    ) -> Result<Box<dyn VectorIndex>, PathError> {
        match self {
            IndexBackend::Hnsw if !store.is_empty() => {
                Ok(Box::new(HnswIndex::build(store, cache_dir)?))
            }
            _ => Ok(Box::new(FlatIndex::build(store))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ItemMetadata;

    fn line_store(points: &[f32]) -> VectorStore {
        VectorStore::new(
            1,
            (0..points.len()).map(|i| format!("p{i}")).collect(),
            points.iter().map(|p| vec![*p]).collect(),
            vec![ItemMetadata::default(); points.len()],
        )
        .unwrap()
    }

    #[test]
    fn test_flat_search_orders_by_distance() {
        let index = FlatIndex::build(&line_store(&[0.0, 10.0, 3.0, 1.0]));
        let hits = index.search(&[0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 3, 2]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[2].distance, 3.0);
    }

    #[test]
    fn test_flat_ties_prefer_earlier_position() {
        let index = FlatIndex::build(&line_store(&[3.0, 1.0, 2.0, 1.0]));
        let hits = index.search(&[2.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        // 2.0 is the exact hit; 3.0, 1.0 and 1.0 all sit at distance 1.
        assert_eq!(positions, vec![2, 0, 1, 3]);
    }

    #[test]
    fn test_flat_self_query_is_first() {
        let store = VectorStore::new(
            2,
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![1.0, 1.0], vec![0.5, 0.5], vec![1.0, 1.0]],
            vec![ItemMetadata::default(); 3],
        )
        .unwrap();
        let index = FlatIndex::build(&store);
        let hits = index.search(store.embedding(2), 1).unwrap();
        // Position 0 holds the same vector and wins the tie.
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[0].distance, 0.0);

        let hits = index.search(store.embedding(1), 1).unwrap();
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn test_flat_caps_at_len() {
        let index = FlatIndex::build(&line_store(&[0.0, 1.0]));
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = FlatIndex::build(&line_store(&[0.0, 1.0]));
        let err = index.search(&[0.0, 1.0], 1).unwrap_err();
        assert!(matches!(
            err,
            PathError::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_rebuild_is_identical() {
        let store = line_store(&[5.0, 1.0, 4.0, 1.0, 2.0, 9.0]);
        let a = FlatIndex::build(&store).search(&[3.0], 6).unwrap();
        let b = FlatIndex::build(&store).search(&[3.0], 6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_store_builds_flat() {
        let index = IndexBackend::Hnsw
            .build(&VectorStore::empty(3), None)
            .unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_hnsw_results_are_ranked() {
        let points: Vec<f32> = (0..50).map(|i| i as f32).collect();
        let store = line_store(&points);
        let index = HnswIndex::build(&store, None).unwrap();
        let hits = index.search(&[10.0], 5).unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 5);
        assert!(
            hits.windows(2)
                .all(|w| w[0].cmp_rank(&w[1]) == Ordering::Less)
        );
    }

    fn hnsw_hits(index: &HnswIndex, query: f32) -> Vec<usize> {
        index
            .search(&[query], 5)
            .unwrap()
            .iter()
            .map(|n| n.position)
            .collect()
    }

    #[test]
    fn test_hnsw_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let points: Vec<f32> = (0..40).map(|i| i as f32 * 0.5).collect();
        let store = line_store(&points);

        let built = HnswIndex::build(&store, Some(dir.path())).unwrap();
        let cache = dir
            .path()
            .join(format!("{}{HNSW_CACHE_SUFFIX}", store.fingerprint()));
        assert!(cache.is_file());
        assert!(cache_is_intact(&cache));

        let loaded = HnswIndex::build(&store, Some(dir.path())).unwrap();
        for query in [0.0, 7.3, 19.5] {
            assert_eq!(hnsw_hits(&built, query), hnsw_hits(&loaded, query));
        }
    }

    #[test]
    fn test_hnsw_corrupt_cache_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let points: Vec<f32> = (0..30).map(|i| i as f32).collect();
        let store = line_store(&points);
        let cache = dir
            .path()
            .join(format!("{}{HNSW_CACHE_SUFFIX}", store.fingerprint()));
        fs::write(&cache, b"not a graph").unwrap();
        fs::write(checksum_file(&cache), "0000").unwrap();

        let index = HnswIndex::build(&store, Some(dir.path())).unwrap();
        assert_eq!(index.len(), 30);
        assert_eq!(hnsw_hits(&index, 4.0).first(), Some(&4));
        assert!(cache_is_intact(&cache));
    }

    #[test]
    fn test_hnsw_cache_prunes_other_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(format!("deadbeef{HNSW_CACHE_SUFFIX}"));
        fs::write(&stale, b"old").unwrap();
        fs::write(checksum_file(&stale), "old").unwrap();
        let unrelated = dir.path().join("config.yaml");
        fs::write(&unrelated, "store_path: store.bin").unwrap();

        let points: Vec<f32> = (0..20).map(|i| i as f32).collect();
        HnswIndex::build(&line_store(&points), Some(dir.path())).unwrap();

        assert!(!stale.exists());
        assert!(!checksum_file(&stale).exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_flat_index_shares_store_matrix() {
        let store = line_store(&[0.0, 1.0, 2.0]);
        let index = FlatIndex::build(&store);
        assert!(Arc::ptr_eq(&index.vectors, &store.shared_embeddings()));
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0], &[1.0]), 0.0);
    }
}
