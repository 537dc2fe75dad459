//! Attachment Resolver
//!
//! Collects the file attachments an application accumulated across its
//! services' intake tables. Services declare their file columns in stored
//! form descriptors; several services may share one `db_table`. Descriptors
//! drift against the live schema, so only columns that actually exist are
//! selected, and only non-empty values survive projection.

use crate::forms::{self, FormDescriptor, FormKind};
use bgv_common::db::inspect;
use bgv_common::Result;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::ApplicantKind;

/// Rows grouped under their table's display heading
pub type AttachmentGroups = BTreeMap<String, Vec<BTreeMap<String, String>>>;

/// Accumulated read target for one `db_table`
struct TableTarget {
    heading: String,
    /// Declared file columns, first-declared order, deduplicated
    columns: Vec<String>,
    /// Column -> display label
    labels: HashMap<String, String>,
}

/// Resolve all per-service file attachments for one application
///
/// A service whose descriptor is missing/unparseable, whose table does not
/// exist, or whose table read fails contributes nothing; resolution of the
/// remaining services continues.
pub async fn resolve_attachments(
    pool: &SqlitePool,
    kind: ApplicantKind,
    application_id: i64,
    service_ids: &[i64],
) -> Result<AttachmentGroups> {
    // Fan out descriptor lookups; a failed branch degrades to None without
    // cancelling its siblings.
    let lookups = service_ids.iter().map(|&service_id| async move {
        match forms::form_descriptor(pool, FormKind::Intake, service_id).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(service_id, "Skipping service in attachment resolution: {e}");
                None
            }
        }
    });
    let descriptors: Vec<Option<FormDescriptor>> = futures::future::join_all(lookups).await;

    // Group targets per db_table, accumulating the union of declared file
    // columns and labels (multiple services can feed one table).
    let mut targets: BTreeMap<String, TableTarget> = BTreeMap::new();
    for descriptor in descriptors.into_iter().flatten() {
        let file_columns = descriptor.file_columns();
        if file_columns.is_empty() {
            continue;
        }
        let labels = descriptor.file_labels();
        let target = targets
            .entry(descriptor.db_table.clone())
            .or_insert_with(|| TableTarget {
                heading: descriptor.heading.clone(),
                columns: Vec::new(),
                labels: HashMap::new(),
            });
        for column in file_columns {
            if !target.columns.contains(&column) {
                target.columns.push(column);
            }
        }
        target.labels.extend(labels);
    }

    let mut groups = AttachmentGroups::new();
    for (db_table, target) in targets {
        match read_table_attachments(pool, kind, application_id, &db_table, &target).await {
            Ok(rows) if !rows.is_empty() => {
                groups.entry(target.heading).or_default().extend(rows);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    application_id,
                    db_table = %db_table,
                    "Skipping attachment table after read failure: {e}"
                );
            }
        }
    }

    Ok(groups)
}

/// Read and project one intake table's rows for the application
async fn read_table_attachments(
    pool: &SqlitePool,
    kind: ApplicantKind,
    application_id: i64,
    db_table: &str,
    target: &TableTarget,
) -> Result<Vec<BTreeMap<String, String>>> {
    if !inspect::is_safe_identifier(db_table) {
        warn!(db_table, "Descriptor names an unsafe table, ignoring");
        return Ok(Vec::new());
    }

    let data_table = FormKind::Intake.data_table(db_table);
    let columns = inspect::existing_columns(pool, &data_table, &target.columns).await?;
    if columns.is_empty() {
        // Table absent, or none of the declared columns materialized yet
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        columns.join(", "),
        data_table,
        kind.fk_column()
    );
    let rows = sqlx::query(&sql).bind(application_id).fetch_all(pool).await?;

    let mut projected = Vec::new();
    for row in rows {
        let mut entry = BTreeMap::new();
        for column in &columns {
            let value: Option<String> = row.try_get(column.as_str()).ok().flatten();
            let Some(value) = value else { continue };
            if value.is_empty() {
                continue;
            }
            let label = target
                .labels
                .get(column)
                .cloned()
                .unwrap_or_else(|| column.clone());
            entry.insert(label, value);
        }
        // Rows with every target column empty are noise, not data
        if !entry.is_empty() {
            projected.push(entry);
        }
    }

    Ok(projected)
}
