//! tenon-api - HTTP server for asset disassembly.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tenon_core::defaults;
use tenon_db::{log_pool_metrics, Database, PoolConfig};
use tenon_engine::{Disassembler, EngineConfig};

use tenon_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "tenon_api=debug,tenon_engine=debug,...")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "tenon_api=debug,tenon_engine=debug,tenon_db=info,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("tenon-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let host = std::env::var("HOST").unwrap_or_else(|_| defaults::HTTP_HOST.to_string());
    let port: u16 = match std::env::var("PORT") {
        Ok(v) => v.parse()?,
        Err(_) => defaults::HTTP_PORT,
    };

    let mut pool_config = PoolConfig::new();
    if let Ok(v) = std::env::var("TENON_MAX_CONNECTIONS") {
        pool_config = pool_config.max_connections(v.parse()?);
    }

    let db = Database::connect_with_config(&database_url, pool_config).await?;
    log_pool_metrics(db.pool());

    let run_migrations = std::env::var("TENON_RUN_MIGRATIONS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if run_migrations {
        db.migrate().await?;
        info!(subsystem = "api", "Database migrations applied");
    }

    let engine_config = EngineConfig::from_env();
    info!(
        subsystem = "api",
        lock_timeout_secs = engine_config.lock_timeout.as_secs(),
        statement_timeout_secs = engine_config.statement_timeout.as_secs(),
        "Engine configured"
    );
    let engine = Disassembler::new(db, engine_config);

    let app = router(
        AppState { engine },
        Duration::from_secs(defaults::HTTP_REQUEST_TIMEOUT_SECS),
    );

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
