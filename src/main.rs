//! Main module for the Semantic Path CLI application (spath).
//!
//! Parses the command line, loads the configuration, and dispatches to the
//! library: path computation, catalog ingestion, the HTTP server, or config
//! initialization.
//!
//! # Examples
//!
//! ```sh
//! spath init
//! spath ingest catalog.jsonl
//! spath path "Introduction to Algorithms" "Theory of Computation" -k 5 -m 8
//! spath serve --port 8000
//! ```

use clap::Parser;
use once_cell::sync::OnceCell;
use std::{
    env,
    error::Error,
    fs,
    path::Path,
    sync::Arc,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use semantic_path::{
    commands::{Cli, Commands},
    config::{self, SemanticPathConfig},
    config_dir,
    embeddings::SentenceEmbeddingsModel,
    index::IndexBackend,
    ingest, pretty,
    server::{self, AppState},
    service::PathService,
    store::VectorStore,
    synth::PathParams,
};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the Semantic Path CLI application.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the selected
/// command fails.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        // In a test environment, load the config from the project directory
        None if env::var("IN_TEST_ENVIRONMENT").is_ok() => env::current_dir()?.join("config.yaml"),
        None => config_dir()?.join("config.yaml"),
    };

    dispatch(cli.command, &config_path).await
}

/// Execute `command` against the configuration at `config_path`.
///
/// `init` writes that file; every other command loads it first.
async fn dispatch(command: Commands, config_path: &Path) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Path {
            start,
            end,
            k,
            max_steps,
            json,
        } => {
            let config = &load(config_path)?;
            let service = load_service(config, config.index_backend)?;
            let params = PathParams::new(
                k.unwrap_or(config.default_k),
                max_steps.unwrap_or(config.default_max_steps),
            );
            let steps = service.compute_path(&start, &end, params)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&steps)?);
            } else {
                pretty::print_path(&steps)?;
            }
        }
        Commands::Ingest { input, out } => {
            let config = &load(config_path)?;
            let records = ingest::read_records(&input)?;
            info!("Read {} records from {}", records.len(), input.display());
            let model = SentenceEmbeddingsModel::load(&config.model_id, &config.model_revision)?;
            let store = ingest::build_store(&records, &model, &input.to_string_lossy())?;
            let out = out.unwrap_or_else(|| config.store_path.clone());
            store.save(&out)?;
            info!("Saved {} items to {}", store.len(), out.display());
        }
        Commands::Serve {
            host,
            port,
            backend,
        } => {
            let config = &load(config_path)?;
            let service = load_service(config, backend.unwrap_or(config.index_backend))?;
            let state = AppState {
                service: Arc::new(service),
                defaults: PathParams::new(config.default_k, config.default_max_steps),
            };
            let host = host.unwrap_or_else(|| config.host.clone());
            server::run(state, &host, port.unwrap_or(config.port)).await?;
        }
        Commands::Init => init(config_path)?,
    }

    Ok(())
}

fn load(config_path: &Path) -> Result<SemanticPathConfig, Box<dyn Error>> {
    debug!("Loading config from: {}", config_path.display());
    let config = config::load_config(&config_path.to_string_lossy()).map_err(|e| {
        format!(
            "could not load {} ({e}); run `spath init` to create it",
            config_path.display()
        )
    })?;
    debug!("Config loaded: {:?}", config);
    Ok(config)
}

/// Load the store, the embedding model and the index named by `backend`.
fn load_service(
    config: &SemanticPathConfig,
    backend: IndexBackend,
) -> Result<PathService, Box<dyn Error>> {
    info!("Starting up: loading store, model and {:?} index", backend);
    let store = VectorStore::load(&config.store_path)?;
    let model = SentenceEmbeddingsModel::load(&config.model_id, &config.model_revision)?;

    let cache_dir = config_dir()?;
    fs::create_dir_all(&cache_dir)?;
    let service = PathService::with_backend(store, backend, Some(&cache_dir), Box::new(model))?;
    Ok(service)
}

/// Write a default configuration file to `config_path`.
///
/// An existing file is left untouched.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if config_path.exists() {
        info!("Config already exists: {}", config_path.display());
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        info!("Creating config directory: {}", parent.display());
        fs::create_dir_all(parent)?;
    }

    let config = SemanticPathConfig {
        store_path: config_dir()?.join("store.bin"),
        ..SemanticPathConfig::default()
    };
    info!("Creating config file: {}", config_path.display());
    fs::write(config_path, serde_yaml::to_string(&config)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_writes_to_the_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("spath.yaml");

        dispatch(Commands::Init, &config_path).await.unwrap();

        let written = config::load_config(&config_path.to_string_lossy()).unwrap();
        assert_eq!(written.default_k, 5);
        assert_eq!(written.default_max_steps, 10);
    }

    #[tokio::test]
    async fn test_init_keeps_an_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "store_path: mine.bin\ndefault_k: 9\n").unwrap();

        dispatch(Commands::Init, &config_path).await.unwrap();

        let kept = config::load_config(&config_path.to_string_lossy()).unwrap();
        assert_eq!(kept.default_k, 9);
    }

    #[tokio::test]
    async fn test_missing_config_points_at_init() {
        let dir = tempfile::tempdir().unwrap();
        let command = Commands::Path {
            start: "A".into(),
            end: "B".into(),
            k: None,
            max_steps: None,
            json: false,
        };
        let err = dispatch(command, &dir.path().join("absent.yaml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spath init"), "{err}");
    }
}
