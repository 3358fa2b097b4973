//! skywatch-fl (Favorite Locations) - ordered favorites service
//!
//! HTTP service letting authenticated SkyWatch users maintain an ordered
//! list of favorite cities: add, remove, list, reorder. Pushes list
//! updates to connected sessions over SSE and triggers weather-data
//! enrichment for brand-new cities.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use skywatch_common::config::{
    RootFolderInitializer, RootFolderResolver, ServiceConfig, TomlConfig,
};
use skywatch_common::db::init::{connect_readonly, init_database};
use skywatch_fl::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "skywatch-fl", about = "SkyWatch favorite locations service")]
struct Args {
    /// Root folder holding the service database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "SKYWATCH_FL_PORT", default_value_t = 5730)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load("skywatch-fl");

    // RUST_LOG wins; otherwise the config file's level, then info
    let default_level = toml_config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    // Build identification first, before database delays
    info!(
        "Starting SkyWatch Favorite Locations (skywatch-fl) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Zero-config startup with 4-tier root folder resolution
    let resolver = RootFolderResolver::new("skywatch-fl").with_cli_override(args.root_folder);
    let root_folder = resolver.resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let db = init_database(&db_path).await?;
    info!("✓ Connected to database (primary)");

    // Read-only pool for list reads, standing in for the read replica
    let read_db = connect_readonly(&db_path).await?;
    info!("✓ Connected to database (read-only)");

    let config = ServiceConfig::load(&toml_config, args.port)?;
    if config.allowed_origin == "*" {
        info!("CORS: permissive (no origin configured)");
    } else {
        info!("CORS: allowing origin {}", config.allowed_origin);
    }
    match &config.enrichment_url {
        Some(url) => info!("Enrichment trigger: {}", url),
        None => info!("Enrichment trigger disabled (no endpoint configured)"),
    }

    let state = AppState::new(db, read_db, &config);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("skywatch-fl listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
