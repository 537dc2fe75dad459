//! Application endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::agg::applications::{
    application_by_id, application_list_by_branch, ApplicationDetail, ApplicationSummary,
};
use crate::error::ApiResult;
use crate::AppState;

/// Query parameters for the branch listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Optional lifecycle-status filter (e.g. `wip`, `completed`)
    pub status: Option<String>,
}

/// GET /api/branch/:branch_id/applications
pub async fn list_by_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ApplicationSummary>>> {
    let summaries =
        application_list_by_branch(&state.db, branch_id, query.status.as_deref()).await?;
    Ok(Json(summaries))
}

/// GET /api/branch/:branch_id/applications/:application_id
pub async fn by_id(
    State(state): State<AppState>,
    Path((branch_id, application_id)): Path<(i64, i64)>,
) -> ApiResult<Json<ApplicationDetail>> {
    let detail = application_by_id(&state.db, application_id, branch_id).await?;
    Ok(Json(detail))
}
