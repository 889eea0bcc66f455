//! Session engine server.
//!
//! Wires the tracker to a session cache (in-process or Redis), the
//! ClickHouse store and a small HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig};
use session_cache::{CacheConfig, CacheKind};
use telemetry::{health, init_tracing_from_env, metrics};
use tracker::{Tracker, TrackerConfig};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    tracker: TrackerConfig,

    #[serde(default)]
    cache: CacheConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tracker: TrackerConfig::default(),
            cache: CacheConfig::default(),
            clickhouse: ClickHouseConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting session engine v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    // Session cache
    let cache = session_cache::from_config(&config.cache)
        .await
        .context("Failed to create session cache")?;
    health().session_cache.set_healthy();
    info!(kind = ?config.cache.kind, "Session cache ready");

    if config.cache.kind == CacheKind::Memory {
        info!("In-process session cache, sessions are not shared between instances");
    }

    // ClickHouse store
    let clickhouse = Arc::new(
        ClickHouseClient::new(config.clickhouse.clone())
            .context("Failed to create ClickHouse client")?,
    );

    if config.clickhouse.migrate {
        if let Err(e) = clickhouse_client::init_schema(&clickhouse).await {
            error!("Failed to initialize ClickHouse schema: {}", e);
            // Continue anyway - schema might already exist
        }
    }

    if clickhouse_client::check_connection(&clickhouse).await {
        info!("ClickHouse connection: healthy");
    } else {
        error!("ClickHouse connection: unhealthy");
    }

    // Tracker
    let tracker = Arc::new(
        Tracker::builder(config.tracker.clone(), clickhouse.clone())
            .session_cache(cache)
            .build()
            .context("Failed to create tracker")?,
    );

    let app = router(AppState::new(tracker.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down...");

    // Write everything still buffered
    if let Err(e) = tracker.stop().await {
        error!("Failed to write remaining rows: {}", e);
    }

    let snapshot = metrics().snapshot();
    info!(
        requests_tracked = snapshot.requests_tracked,
        requests_ignored = snapshot.requests_ignored,
        sessions_saved = snapshot.sessions_saved,
        "Shutdown complete"
    );
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. SESSION_ENGINE__TRACKER__SALT
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SESSION_ENGINE")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("tracker.trusted_proxies"),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    if config.tracker.salt.is_empty() {
        warn!("No salt configured, fingerprints will change on restart");
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
