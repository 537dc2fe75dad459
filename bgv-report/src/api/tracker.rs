//! Tracker endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::agg::tracker::{rollup, CustomerRollup, TrackerStage};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for the tracker view
#[derive(Debug, Deserialize)]
pub struct TrackerQuery {
    /// Tracker stage: absent for the master tracker, `wip` for the
    /// report-generation queue, `downloaded` for the report tracker
    pub stage: Option<String>,
}

/// GET /api/customer/:customer_id/tracker
pub async fn tracker(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
    Query(query): Query<TrackerQuery>,
) -> ApiResult<Json<Vec<CustomerRollup>>> {
    let stage = match query.stage.as_deref() {
        None => TrackerStage::All,
        Some("wip") => TrackerStage::Wip,
        Some("downloaded") => TrackerStage::Downloaded,
        Some(other) => {
            return Err(ApiError::BadRequest(format!("unknown tracker stage: {other}")));
        }
    };

    let tree = rollup(&state.db, stage, Some(customer_id)).await?;
    Ok(Json(tree))
}
