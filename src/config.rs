//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `SemanticPathConfig` struct, which holds the configuration parameters,
//! and a `load_config` function to load the configuration from a file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use semantic_path::config::{SemanticPathConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: SemanticPathConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{error::Error, fs};

use crate::index::IndexBackend;
use crate::synth::{DEFAULT_K, DEFAULT_MAX_STEPS};

/// Represents the application's configuration.
///
/// Only `store_path` is required; everything else falls back to the defaults
/// of [`SemanticPathConfig::default`].
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SemanticPathConfig {
    /// Where the ingested vector store lives.
    pub store_path: PathBuf,

    /// Nearest-neighbour backend built over the store at startup.
    #[serde(default)]
    pub index_backend: IndexBackend,

    /// Hugging Face model id of the sentence embedding model.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Model revision (branch, tag or commit).
    #[serde(default = "default_model_revision")]
    pub model_revision: String,

    // Neighbour fan-out used when a request does not set one.
    #[serde(default = "default_k")]
    pub default_k: usize,

    // Path length ceiling used when a request does not set one.
    #[serde(default = "default_max_steps")]
    pub default_max_steps: usize,

    // HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_model_id() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_model_revision() -> String {
    "main".to_string()
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for SemanticPathConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("store.bin"),
            index_backend: IndexBackend::default(),
            model_id: default_model_id(),
            model_revision: default_model_revision(),
            default_k: default_k(),
            default_max_steps: default_max_steps(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Returns
///
/// - `Ok(SemanticPathConfig)`: The loaded configuration.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or parsing the YAML.
///
/// # Examples
///
/// ```no_run
/// use semantic_path::config::load_config;
///
/// match load_config("/path/to/config.yaml") {
///     Ok(config) => println!("{:?}", config),
///     Err(err) => eprintln!("Error loading config: {}", err),
/// }
/// ```
pub fn load_config(file: &str) -> Result<SemanticPathConfig, Box<dyn Error>> {
    tracing::debug!("Loading config from {}", file);
    let content = fs::read_to_string(file)?;
    let config: SemanticPathConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}
