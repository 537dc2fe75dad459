//! Invoice endpoint

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::agg::invoice::{generate_invoice, Invoice};
use crate::error::ApiResult;
use crate::AppState;

/// Query parameters selecting the reporting month
#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub month: u32,
    pub year: i32,
}

/// POST /api/customer/:customer_id/invoice
///
/// Not idempotent: collected service rows are flagged billed as a side
/// effect, so a repeat call for the same month returns only rows that were
/// not captured the first time.
pub async fn generate(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<Json<Invoice>> {
    let invoice = generate_invoice(&state.db, customer_id, query.month, query.year).await?;
    Ok(Json(invoice))
}
