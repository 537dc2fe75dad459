//! Status Tracker
//!
//! Determines per-service completion status for an application by
//! consulting each service's report-form table, then folds applications
//! into a customer -> branch -> application rollup tree.
//!
//! Status resolution per service:
//! - descriptor missing/unparseable: unresolved (heading omitted)
//! - descriptor ok, report table absent: the `INITIATED` sentinel
//!   (work not started, no row can exist yet)
//! - table present, no row for the application: unresolved (heading omitted)
//! - row present: its `status` value as stored
//!
//! An application enters a rollup branch only if every requested service
//! resolved to something (sentinel included). Exclusions are logged so the
//! hidden-application failure mode stays observable.

use crate::forms::{self, FormKind};
use bgv_common::db::inspect;
use bgv_common::db::models::{parse_service_ids, Application};
use bgv_common::Result;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use tracing::warn;

/// Sentinel status for a service whose report table does not exist yet
pub const INITIATED: &str = "INITIATED";

/// Statuses that count as a finished verification for report generation
pub const VALID_TERMINAL_STATUSES: &[&str] = &[
    "completed",
    "completed_green",
    "completed_red",
    "completed_orange",
    "completed_pink",
    "completed_yellow",
];

/// Which tracker view is being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStage {
    /// Master tracker: every application passing the completeness gate
    All,
    /// Report generation queue: every per-service status terminal
    Wip,
    /// Report tracker: overall status completed and report downloaded
    Downloaded,
}

/// One application in a rollup branch
#[derive(Debug, Clone, Serialize)]
pub struct TrackedApplication {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub created_at: Option<String>,
    /// Report heading -> status string (sentinel included)
    pub services: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchRollup {
    pub branch_id: i64,
    pub branch_name: String,
    pub applications: Vec<TrackedApplication>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerRollup {
    pub customer_id: i64,
    pub customer_name: String,
    pub branches: Vec<BranchRollup>,
}

/// Resolve per-service report statuses for one application
///
/// The returned map is keyed by report-form heading. Unresolvable services
/// are omitted; callers compare the map size against the requested service
/// count to apply the completeness gate.
pub async fn status_for_application(
    pool: &SqlitePool,
    application_id: i64,
    service_ids: &[i64],
) -> Result<BTreeMap<String, String>> {
    let lookups = service_ids.iter().map(|&service_id| async move {
        match service_status(pool, application_id, service_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    application_id,
                    service_id, "Service status unresolved after error: {e}"
                );
                None
            }
        }
    });

    let entries = futures::future::join_all(lookups).await;
    Ok(entries.into_iter().flatten().collect())
}

/// Status of one service for one application, None when unresolved
async fn service_status(
    pool: &SqlitePool,
    application_id: i64,
    service_id: i64,
) -> Result<Option<(String, String)>> {
    let Some(descriptor) = forms::form_descriptor(pool, FormKind::Report, service_id).await? else {
        return Ok(None);
    };

    if !inspect::is_safe_identifier(&descriptor.db_table) {
        warn!(
            service_id,
            db_table = %descriptor.db_table,
            "Report descriptor names an unsafe table, treating as unresolved"
        );
        return Ok(None);
    }

    let table = FormKind::Report.data_table(&descriptor.db_table);
    if !inspect::table_exists(pool, &table).await? {
        return Ok(Some((descriptor.heading, INITIATED.to_string())));
    }

    let status: Option<String> = sqlx::query_scalar(&format!(
        "SELECT status FROM {table} WHERE candidate_application_id = ?"
    ))
    .bind(application_id)
    .fetch_optional(pool)
    .await?;

    Ok(status.map(|status| (descriptor.heading, status)))
}

/// Application row joined with its branch and customer display names
#[derive(Debug, FromRow)]
struct RollupRow {
    #[sqlx(flatten)]
    application: Application,
    branch_name: String,
    customer_name: String,
}

/// Build the customer -> branch -> application rollup tree
///
/// `customer_id` scopes the walk to one customer when given. Branches and
/// customers that end up with zero qualifying applications are pruned.
pub async fn rollup(
    pool: &SqlitePool,
    stage: TrackerStage,
    customer_id: Option<i64>,
) -> Result<Vec<CustomerRollup>> {
    let mut sql = String::from(
        "SELECT a.id, a.branch_id, a.customer_id, a.name, a.services, a.status,
                a.overall_status, a.is_report_downloaded, a.created_at,
                b.name AS branch_name, c.name AS customer_name
         FROM candidate_applications a
         JOIN branches b ON b.id = a.branch_id
         JOIN customers c ON c.id = a.customer_id",
    );
    if customer_id.is_some() {
        sql.push_str(" WHERE a.customer_id = ?");
    }
    sql.push_str(" ORDER BY c.id, b.id, a.id");

    let mut query = sqlx::query_as::<_, RollupRow>(&sql);
    if let Some(customer_id) = customer_id {
        query = query.bind(customer_id);
    }
    let rows = query.fetch_all(pool).await?;

    let mut customers: Vec<CustomerRollup> = Vec::new();
    for row in rows {
        let app = &row.application;

        if stage == TrackerStage::Downloaded && !downloaded_gate(app) {
            continue;
        }

        let service_ids = parse_service_ids(&app.services);
        let statuses = status_for_application(pool, app.id, &service_ids).await?;

        // Completeness gate: every requested service must have resolved
        if statuses.len() != service_ids.len() {
            warn!(
                application_id = app.id,
                requested = service_ids.len(),
                resolved = statuses.len(),
                "Application excluded from rollup: unresolved service status"
            );
            continue;
        }

        if stage == TrackerStage::Wip && !wip_gate(&statuses) {
            continue;
        }

        let tracked = TrackedApplication {
            id: app.id,
            name: app.name.clone(),
            status: app.status.clone(),
            created_at: app.created_at.clone(),
            services: statuses,
        };

        // Lazy lookup-or-insert keeps only non-empty branches/customers
        let customer_idx = customers
            .iter()
            .position(|c| c.customer_id == app.customer_id)
            .unwrap_or_else(|| {
                customers.push(CustomerRollup {
                    customer_id: app.customer_id,
                    customer_name: row.customer_name.clone(),
                    branches: Vec::new(),
                });
                customers.len() - 1
            });
        let customer = &mut customers[customer_idx];
        let branch_idx = customer
            .branches
            .iter()
            .position(|b| b.branch_id == app.branch_id)
            .unwrap_or_else(|| {
                customer.branches.push(BranchRollup {
                    branch_id: app.branch_id,
                    branch_name: row.branch_name.clone(),
                    applications: Vec::new(),
                });
                customer.branches.len() - 1
            });
        customer.branches[branch_idx].applications.push(tracked);
    }

    Ok(customers)
}

/// Report-generation gate: every service landed on a terminal status
fn wip_gate(statuses: &BTreeMap<String, String>) -> bool {
    statuses
        .values()
        .all(|status| VALID_TERMINAL_STATUSES.contains(&status.as_str()))
}

/// Report-tracker gate: overall status complete and report downloaded
fn downloaded_gate(app: &Application) -> bool {
    let overall = app
        .overall_status
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    (overall == "completed" || overall == "complete") && app.is_report_downloaded
}
