//! Core Submission Resolver
//!
//! Every candidate application has up to two fixed intake submissions: the
//! candidate entry form (CEF) with its built-in attachment columns, and the
//! digital address verification (DAV) form. Their attachment columns are
//! fixed schema, unlike the per-service dynamic tables, so projection here
//! uses hardcoded column/label pairs.

use bgv_common::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// Heading the CEF built-in attachments are grouped under
pub const CEF_BASIC_HEADING: &str = "Candidate Basic Attachments";

/// Fixed CEF attachment columns and their display labels
const CEF_ATTACHMENT_COLUMNS: &[(&str, &str)] = &[
    ("signature", "Signature"),
    ("resume_file", "Resume"),
    ("govt_id", "Government ID"),
    ("pan_card_image", "PAN Card"),
    ("aadhar_card_image", "Aadhaar Card"),
    ("passport_photo", "Passport Size Photo"),
];

/// Fixed DAV attachment columns and their display labels
const DAV_ATTACHMENT_COLUMNS: &[(&str, &str)] = &[
    ("identity_proof", "Identity Proof"),
    ("home_photo", "Home Photo"),
    ("locality", "Locality Photo"),
];

/// Built-in attachments from the CEF and DAV submission rows
///
/// A missing submission row yields `None` for that half - downstream
/// consumers check presence before display, and an absent form is not the
/// same thing as a submitted form with no attachments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoreAttachments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cef: Option<Vec<BTreeMap<String, String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dav: Option<BTreeMap<String, String>>,
}

/// Resolve the fixed-schema CEF/DAV attachments for one application
pub async fn resolve_core_attachments(
    pool: &SqlitePool,
    application_id: i64,
) -> Result<CoreAttachments> {
    let cef = project_fixed_row(
        pool,
        "cef_applications",
        CEF_ATTACHMENT_COLUMNS,
        application_id,
    )
    .await?
    .map(|entry| vec![entry]);

    let dav = project_fixed_row(
        pool,
        "dav_applications",
        DAV_ATTACHMENT_COLUMNS,
        application_id,
    )
    .await?;

    Ok(CoreAttachments { cef, dav })
}

/// Whether the application has a submitted CEF row
pub async fn cef_submitted(pool: &SqlitePool, application_id: i64) -> Result<bool> {
    submission_exists(pool, "cef_applications", application_id).await
}

/// Whether the application has a submitted DAV row
pub async fn dav_submitted(pool: &SqlitePool, application_id: i64) -> Result<bool> {
    submission_exists(pool, "dav_applications", application_id).await
}

async fn submission_exists(pool: &SqlitePool, table: &str, application_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {table} WHERE candidate_application_id = ? AND is_submitted = 1)"
    ))
    .bind(application_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Fetch the submission row and project non-empty fixed columns, relabeled
async fn project_fixed_row(
    pool: &SqlitePool,
    table: &str,
    columns: &[(&str, &str)],
    application_id: i64,
) -> Result<Option<BTreeMap<String, String>>> {
    let select_list: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let sql = format!(
        "SELECT {} FROM {table} WHERE candidate_application_id = ?",
        select_list.join(", ")
    );

    let row = sqlx::query(&sql)
        .bind(application_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let mut entry = BTreeMap::new();
    for (name, label) in columns {
        let value: Option<String> = row.try_get(*name).ok().flatten();
        if let Some(value) = value {
            if !value.is_empty() {
                entry.insert(label.to_string(), value);
            }
        }
    }

    if entry.is_empty() {
        Ok(None)
    } else {
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        bgv_common::db::init::create_submission_tables(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_absent_rows_yield_absent_keys() {
        let pool = setup_pool().await;
        let core = resolve_core_attachments(&pool, 1).await.unwrap();
        assert!(core.cef.is_none());
        assert!(core.dav.is_none());
    }

    #[tokio::test]
    async fn test_cef_projection_drops_empty_columns() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO cef_applications
                (candidate_application_id, is_submitted, signature, resume_file, govt_id)
             VALUES (1, 1, 'uploads/sig.png', '', NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let core = resolve_core_attachments(&pool, 1).await.unwrap();
        let cef = core.cef.unwrap();
        assert_eq!(cef.len(), 1);
        assert_eq!(cef[0].get("Signature"), Some(&"uploads/sig.png".to_string()));
        assert!(!cef[0].contains_key("Resume"));
        assert!(!cef[0].contains_key("Government ID"));
    }

    #[tokio::test]
    async fn test_dav_projection_uses_fixed_labels() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO dav_applications
                (candidate_application_id, is_submitted, identity_proof, home_photo, locality)
             VALUES (1, 1, 'uploads/id.png', 'uploads/home.jpg', NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let core = resolve_core_attachments(&pool, 1).await.unwrap();
        let dav = core.dav.unwrap();
        assert_eq!(dav.get("Identity Proof"), Some(&"uploads/id.png".to_string()));
        assert_eq!(dav.get("Home Photo"), Some(&"uploads/home.jpg".to_string()));
        assert!(!dav.contains_key("Locality Photo"));
    }

    #[tokio::test]
    async fn test_submission_flags_require_is_submitted() {
        let pool = setup_pool().await;
        sqlx::query(
            "INSERT INTO cef_applications (candidate_application_id, is_submitted)
             VALUES (1, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert!(!cef_submitted(&pool, 1).await.unwrap());
        assert!(!dav_submitted(&pool, 1).await.unwrap());

        sqlx::query("UPDATE cef_applications SET is_submitted = 1 WHERE candidate_application_id = 1")
            .execute(&pool)
            .await
            .unwrap();
        assert!(cef_submitted(&pool, 1).await.unwrap());
    }
}
