//! photoeval-ai - Photo Evaluation Microservice
//!
//! Scans directories for photos, asks a local vision model for a score and
//! comment on each new one, stores the results in SQLite and serves them over
//! a small REST API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use photoeval_common::config::{ConfigOverrides, ModelApi, ServiceConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::util::SubscriberInitExt;

use photoeval_ai::logging;
use photoeval_ai::services::OllamaClient;
use photoeval_ai::AppState;

/// Command-line arguments for photoeval-ai
///
/// Every option falls back to its `PHOTOEVAL_*` environment variable, then the
/// TOML config file, then the compiled default.
#[derive(Parser, Debug)]
#[command(name = "photoeval-ai")]
#[command(about = "Photo evaluation microservice backed by a local vision model")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/photoeval/config.toml)
    #[arg(short, long, env = "PHOTOEVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(short, long)]
    bind: Option<String>,

    /// Folder holding the database
    #[arg(long)]
    data_folder: Option<PathBuf>,

    /// Database file (default: <data folder>/photos.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory served under /static
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Model server base URL
    #[arg(long)]
    ollama_url: Option<String>,

    /// Vision model name
    #[arg(short, long)]
    model: Option<String>,

    /// Model endpoint form: chat or generate
    #[arg(long)]
    api: Option<ModelApi>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Maximum concurrent model requests per batch
    #[arg(long)]
    max_concurrent: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind.clone(),
            data_folder: self.data_folder.clone(),
            database_file: self.database.clone(),
            static_dir: self.static_dir.clone(),
            ollama_url: self.ollama_url.clone(),
            model: self.model.clone(),
            api: self.api,
            timeout_secs: self.timeout_secs,
            max_concurrent: self.max_concurrent,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (subscriber, log_level) = logging::build_subscriber(logging::initial_filter(), std::io::stdout);
    subscriber.init();

    let config = ServiceConfig::load(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;
    logging::apply_configured_level(&log_level, &config.logging.level);

    info!("Starting photoeval-ai (Photo Evaluation) microservice");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database: {}", config.database_file.display());
    info!(
        "Model: {} at {} ({:?} API, timeout {}s)",
        config.ollama.model, config.ollama.base_url, config.ollama.api, config.ollama.timeout_secs
    );

    let db_pool = photoeval_ai::db::init_database_pool(&config.database_file)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let client = OllamaClient::new(&config.ollama).context("Failed to create model client")?;
    if !client.is_reachable().await {
        warn!(
            "Model server at {} is not reachable; evaluations will degrade until it is",
            client.base_url()
        );
    }

    let state = AppState::new(db_pool, Arc::new(client), config.evaluation.max_concurrent)
        .with_static_dir(config.static_dir.clone());

    let app = photoeval_ai::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
