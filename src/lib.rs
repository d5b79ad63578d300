//! # Semantic Path (library root)
//!
//! Resolves two free-text labels to items in a pre-built embedding store and
//! synthesizes an ordered, bounded-length path of intermediate items that
//! bridges them.
//!
//! ## Pipeline
//!
//! ```text
//! start label ─┐                        ┌─ synth::PathSynthesizer ─┐
//!              ├─ resolver::Resolver ───┤  (greedy walk + repair)  ├─ hydrate ─> [StepContent]
//! end label ───┘                        └──────────────────────────┘
//! ```
//!
//! - [`store`]: immutable, position-aligned ids / embeddings / metadata.
//! - [`index`]: nearest-neighbour backends behind the `VectorIndex` trait.
//! - [`embeddings`]: the text → vector capability (Candle MiniLM, lookup table).
//! - [`resolver`]: exact label match first, nearest neighbour second.
//! - [`synth`]: the walk state machine and the dedup / anchor / pad / truncate passes.
//! - [`hydrate`]: display records for a path.
//! - [`service`]: `compute_path`, wiring all of the above.
//!
//! Around the core: [`ingest`] builds stores from JSON Lines catalogs,
//! [`server`] exposes the service over HTTP, [`pretty`] renders paths in the
//! terminal, and [`config`] / [`commands`] drive the `spath` binary.
//!
//! ## Configuration directory
//! [`config_dir`] resolves the per-platform directory holding `config.yaml`
//! and the HNSW graph cache, e.g.:
//!
//! - macOS: `~/Library/Application Support/com.semantic-path.spath`
//! - Linux (XDG): `~/.config/spath`
//! - Windows: `C:\Users\<you>\AppData\Roaming\semantic-path\spath\config`

use directories::ProjectDirs;
use std::error::Error;

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod hydrate;
pub mod index;
pub mod ingest;
pub mod pretty;
pub mod resolver;
pub mod server;
pub mod service;
pub mod store;
pub mod synth;

pub use error::{EmbeddingError, PathError, StoreError};
pub use hydrate::StepContent;
pub use service::PathService;
pub use synth::PathParams;

/// Return the per-platform configuration directory used by `spath`.
///
/// The directory is **not** created by this function; callers that need it should
/// create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined
/// (which is rare but possible in heavily sandboxed environments).
///
/// # Examples
/// ```rust
/// let cfg = semantic_path::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "semantic-path", "spath")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
