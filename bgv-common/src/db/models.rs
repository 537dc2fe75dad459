//! Row models shared by the reporting services

use serde::Serialize;
use sqlx::FromRow;

/// Verification application row (candidate or client intake)
///
/// `services` is the legacy comma-separated service-id list; the schema does
/// not enforce uniqueness or well-formedness, so consumers go through
/// [`Application::service_ids`] rather than splitting it themselves.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Application {
    pub id: i64,
    pub branch_id: i64,
    pub customer_id: i64,
    pub name: String,
    pub services: String,
    pub status: String,
    pub overall_status: Option<String>,
    pub is_report_downloaded: bool,
    pub created_at: Option<String>,
}

impl Application {
    /// Deduplicated service ids in first-seen order
    pub fn service_ids(&self) -> Vec<i64> {
        parse_service_ids(&self.services)
    }
}

/// Service catalog row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Service {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
}

/// Parse a legacy CSV service-id list
///
/// Tolerates whitespace, empty fragments, and non-numeric noise; duplicates
/// are dropped, preserving first-seen order.
pub fn parse_service_ids(csv: &str) -> Vec<i64> {
    let mut seen = Vec::new();
    for fragment in csv.split(',') {
        let trimmed = fragment.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.parse::<i64>() {
            Ok(id) if !seen.contains(&id) => seen.push(id),
            Ok(_) => {}
            Err(_) => {
                tracing::warn!("Ignoring non-numeric service id fragment: {trimmed:?}");
            }
        }
    }
    seen
}
