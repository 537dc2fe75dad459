//! bgv-report library - BGV reporting aggregation service
//!
//! Walks candidate applications, resolves their dynamically-configured
//! per-service form tables, joins scattered attachment data, and produces
//! the nested tracker/listing/invoice summaries the platform's controllers
//! serve to admin, customer, and branch actors.

use axum::Router;
use sqlx::SqlitePool;

pub mod agg;
pub mod api;
pub mod error;
pub mod forms;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/health", get(api::health::health))
        .route(
            "/api/branch/:branch_id/applications",
            get(api::applications::list_by_branch),
        )
        .route(
            "/api/branch/:branch_id/applications/:application_id",
            get(api::applications::by_id),
        )
        .route("/api/customer/:customer_id/tracker", get(api::tracker::tracker))
        .route(
            "/api/customer/:customer_id/invoice",
            post(api::invoice::generate),
        )
        .with_state(state)
}
