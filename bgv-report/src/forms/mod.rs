//! Service Form Registry
//!
//! Each verification service carries two stored form descriptors: the
//! intake form (`cef_service_forms`) and the report form (`report_forms`).
//! A descriptor is a JSON blob naming the service's target data table, a
//! display heading, and the form's input fields. The pipeline consumes only
//! `db_table`, `heading`, and the `file`-typed inputs.
//!
//! Stored JSON predates the current admin UI and may carry double-encoding
//! artifacts (literal `\"` / `\'` sequences). Parsing is strict first, then
//! retried once after stripping those escapes; the fallback is logged so the
//! stored rows can eventually be cleaned. A descriptor that fails both
//! attempts contributes nothing - the registry never fails a request over
//! malformed form JSON.

use bgv_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::warn;

/// Which of the two parallel registries to consult
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    /// Candidate intake forms (`cef_service_forms`); data lands in `cef_<db_table>`
    Intake,
    /// Verification/report forms (`report_forms`); data lands in `<db_table>`
    Report,
}

impl FormKind {
    /// Registry table holding the descriptors
    pub fn registry_table(self) -> &'static str {
        match self {
            FormKind::Intake => "cef_service_forms",
            FormKind::Report => "report_forms",
        }
    }

    /// Live data table for a descriptor's `db_table`
    pub fn data_table(self, db_table: &str) -> String {
        match self {
            FormKind::Intake => format!("cef_{db_table}"),
            FormKind::Report => db_table.to_string(),
        }
    }
}

/// One input field flattened out of the descriptor's `rows[].inputs[]`
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub label: Option<String>,
    pub field_type: String,
}

/// Parsed form descriptor
#[derive(Debug, Clone)]
pub struct FormDescriptor {
    pub db_table: String,
    pub heading: String,
    pub fields: Vec<FormField>,
}

impl FormDescriptor {
    /// Names of `file`-typed fields, in declaration order
    pub fn file_columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.field_type == "file")
            .map(|f| f.name.clone())
            .collect()
    }

    /// Column-name to display-label map for `file`-typed fields
    pub fn file_labels(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter(|f| f.field_type == "file")
            .filter_map(|f| f.label.clone().map(|label| (f.name.clone(), label)))
            .collect()
    }
}

/// Source JSON shape: `{ db_table, heading, rows: [{ inputs: [{name,label,type}] }] }`
#[derive(Debug, Deserialize)]
struct RawForm {
    db_table: String,
    heading: String,
    #[serde(default)]
    rows: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    inputs: Vec<RawInput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
}

/// Look up and parse the form descriptor for a service
///
/// Returns `Ok(None)` for a missing registry row or unparseable JSON;
/// database errors still propagate.
pub async fn form_descriptor(
    pool: &SqlitePool,
    kind: FormKind,
    service_id: i64,
) -> Result<Option<FormDescriptor>> {
    let json: Option<String> = sqlx::query_scalar(&format!(
        "SELECT json FROM {} WHERE service_id = ?",
        kind.registry_table()
    ))
    .bind(service_id)
    .fetch_optional(pool)
    .await?;

    let Some(json) = json else {
        return Ok(None);
    };

    Ok(parse_descriptor(&json, service_id))
}

/// Parse descriptor JSON: strict first, then unescape-and-retry
fn parse_descriptor(json: &str, service_id: i64) -> Option<FormDescriptor> {
    let raw = match serde_json::from_str::<RawForm>(json) {
        Ok(raw) => raw,
        Err(strict_err) => {
            let cleaned = json.replace("\\\"", "\"").replace("\\'", "'");
            match serde_json::from_str::<RawForm>(&cleaned) {
                Ok(raw) => {
                    warn!(
                        service_id,
                        "Form descriptor parsed only after unescape fallback; \
                         stored JSON needs cleanup"
                    );
                    raw
                }
                Err(_) => {
                    warn!(
                        service_id,
                        "Unparseable form descriptor, treating as absent: {strict_err}"
                    );
                    return None;
                }
            }
        }
    };

    let fields = raw
        .rows
        .into_iter()
        .flat_map(|row| row.inputs)
        .map(|input| FormField {
            name: input.name,
            label: input.label,
            field_type: input.field_type.unwrap_or_default(),
        })
        .collect();

    Some(FormDescriptor {
        db_table: raw.db_table,
        heading: raw.heading,
        fields,
    })
}
