//! bgv-report - BGV reporting aggregation service
//!
//! Serves the application tracker, branch listing, and invoice entry points
//! over HTTP. Route wiring and authentication for the wider platform live in
//! the gateway; this service only exposes the aggregation facade.

use anyhow::Result;
use bgv_common::config::ServiceConfig;
use bgv_common::db::init_database;
use bgv_report::{build_router, AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting BGV reporting service (bgv-report) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = ServiceConfig::resolve()?;
    info!("Database path: {}", config.database_path.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    let state = AppState::new(pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!("bgv-report listening on http://127.0.0.1:{}", config.port);
    info!("Health check: http://127.0.0.1:{}/health", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
