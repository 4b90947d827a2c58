//! acp-lc (Lead Capture) - landing page lead persistence service
//!
//! Captures qualification answers and contact submissions for the AI Code
//! Pro event funnel and persists them through a configurable chain of
//! storage backends with a local durable fallback.

use acp_lc::config::{BackendKind, ServiceConfig};
use acp_lc::orchestrator::LeadOrchestrator;
use acp_lc::storage::{
    FallbackStore, HostedTableBackend, MemoryBackend, SqliteBackend, StorageBackend,
};
use acp_lc::tracker::QualificationTracker;
use acp_lc::{build_router, AppState};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "acp-lc", about = "AI Code Pro lead capture service")]
struct Cli {
    /// Root folder holding the database and fallback file
    /// (falls back to ACP_ROOT_FOLDER, then the TOML config)
    #[arg(long)]
    root_folder: Option<String>,

    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:3000
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting ACP Lead Capture (acp-lc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let toml_config = acp_common::config::load_toml_config(cli.config.as_deref())?;
    let config = ServiceConfig::resolve(
        cli.root_folder.as_deref(),
        cli.bind.as_deref(),
        &toml_config,
    )?;

    std::fs::create_dir_all(&config.root_folder)?;
    info!("Root folder: {}", config.root_folder.display());

    // Composition root: backends are constructed once, here, and injected
    // into the tracker and orchestrator.
    let mut backends: Vec<Arc<dyn StorageBackend>> = Vec::new();
    for kind in &config.backends {
        match kind {
            BackendKind::Sqlite => {
                let db_path = config.database_path();
                let pool = match acp_common::db::init_database(&db_path).await {
                    Ok(pool) => {
                        info!("✓ Connected to database: {}", db_path.display());
                        pool
                    }
                    Err(e) => {
                        error!("Failed to initialize database: {}", e);
                        return Err(e.into());
                    }
                };
                backends.push(Arc::new(SqliteBackend::new(pool)));
            }
            BackendKind::Hosted => {
                let Some(hosted) = config.hosted.as_ref() else {
                    anyhow::bail!("hosted backend selected without [hosted] configuration");
                };
                let backend = HostedTableBackend::new(
                    &hosted.url,
                    &hosted.api_key,
                    config.backend_timeout,
                )?;
                info!("✓ Hosted row store configured: {}", hosted.url);
                backends.push(Arc::new(backend));
            }
            BackendKind::Memory => {
                warn!("Using in-memory backend: leads will not survive a restart");
                backends.push(Arc::new(MemoryBackend::new()));
            }
        }
    }

    let fallback = FallbackStore::new(config.fallback_path.clone());
    info!("Fallback file: {}", config.fallback_path.display());

    let tracker = Arc::new(QualificationTracker::new(
        backends.clone(),
        config.qualification_ttl_hours,
    ));
    let orchestrator = Arc::new(LeadOrchestrator::new(
        backends,
        fallback,
        tracker.clone(),
        config.backend_timeout,
    ));

    let state = AppState::new(orchestrator, tracker);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("acp-lc listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
