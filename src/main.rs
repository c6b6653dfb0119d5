//! Mines API server binary

use clap::Parser;
use mines_engine::{
    api::ApiServer,
    config::{EngineConfig, StorageBackend},
    games::OsRandom,
    store::{Backend, MemoryRoundStore, RocksRoundStore},
    RoundEngine,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mines-server")]
#[command(about = "Mines wagering round engine API server", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long)]
    config: Option<String>,

    /// Use the in-memory testing preset
    #[arg(long)]
    testing: bool,

    /// API server host
    #[arg(long)]
    host: Option<String>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Database directory
    #[arg(long)]
    db_path: Option<String>,

    /// Storage backend: memory or rocksdb
    #[arg(long)]
    backend: Option<String>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,
}

fn resolve_config(args: &Args) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, args.testing) {
        (Some(path), _) => EngineConfig::load(path)?,
        (None, true) => EngineConfig::testing(),
        (None, false) => EngineConfig::production(),
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = &args.db_path {
        config.storage.data_directory = path.clone();
    }
    if let Some(backend) = &args.backend {
        config.storage.backend = match backend.as_str() {
            "memory" => StorageBackend::Memory,
            "rocksdb" => StorageBackend::Rocksdb,
            other => return Err(format!("unknown backend '{}', expected memory or rocksdb", other).into()),
        };
    }
    if let Some(origins) = &args.cors_origins {
        config.server.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }

    config.validate()?;
    Ok(config)
}

fn open_backend(config: &EngineConfig) -> Result<Arc<dyn Backend>, Box<dyn std::error::Error>> {
    let storage = &config.storage;
    let backend: Arc<dyn Backend> = match storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory round store");
            Arc::new(MemoryRoundStore::new())
        }
        StorageBackend::Rocksdb if storage.clear_on_start => {
            info!("Opening cleared round store at {}", storage.data_directory);
            Arc::new(RocksRoundStore::open_cleared(&storage.data_directory)?)
        }
        StorageBackend::Rocksdb => {
            info!("Opening round store at {}", storage.data_directory);
            Arc::new(RocksRoundStore::open(&storage.data_directory)?)
        }
    };
    Ok(backend)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mines_engine=info,mines_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    let backend = open_backend(&config)?;
    let engine = Arc::new(RoundEngine::from_config(&config, backend, Arc::new(OsRandom)));

    let funded = engine.seed_balances(&config.ledger)?;
    if funded > 0 {
        info!("Seeded opening balances for {} players", funded);
    }

    ApiServer::new(config.server.clone(), engine).run().await
}
