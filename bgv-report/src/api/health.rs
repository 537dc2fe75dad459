//! Health endpoint

use axum::Json;
use serde_json::{json, Value};

/// GET /health
///
/// Liveness probe; carries no authentication and touches no state.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "bgv-report",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
