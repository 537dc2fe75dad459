//! Application facade: single-application fetch and branch listings
//!
//! These are the read entry points the branch-facing controllers consume.
//! Listings merge the Attachment Resolver and Core Submission Resolver
//! output into a `service_data` bundle per application and resolve service
//! display titles from the `services` catalog.

use crate::agg::attachments::{self, AttachmentGroups};
use crate::agg::core::{self, CoreAttachments, CEF_BASIC_HEADING};
use crate::agg::ApplicantKind;
use bgv_common::db::models::{Application, Service};
use bgv_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};

/// Single-application view with submission flags
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub cef_submitted: bool,
    pub dav_submitted: bool,
    /// 1 when the application's service list includes the platform's
    /// digital address verification service
    pub dav_exist: i64,
}

/// Per-application attachment bundle in a branch listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceData {
    /// Heading -> attachment rows (dynamic per-service tables plus the
    /// fixed "Candidate Basic Attachments" entry)
    pub cef: AttachmentGroups,
    /// DAV label -> value, absent when no DAV submission exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dav: Option<BTreeMap<String, String>>,
}

/// One application in a branch listing
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    #[serde(flatten)]
    pub application: Application,
    /// Display titles of the application's services, unresolvable ids skipped
    pub service_names: Vec<String>,
    pub service_data: ServiceData,
}

/// Fetch one application scoped to a branch
///
/// Absence is the typed not-found condition, distinct from a driver error,
/// so HTTP callers can answer 404 rather than 500.
pub async fn application_by_id(
    pool: &SqlitePool,
    application_id: i64,
    branch_id: i64,
) -> Result<ApplicationDetail> {
    let application = sqlx::query_as::<_, Application>(
        "SELECT id, branch_id, customer_id, name, services, status,
                overall_status, is_report_downloaded, created_at
         FROM candidate_applications
         WHERE id = ? AND branch_id = ?",
    )
    .bind(application_id)
    .bind(branch_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        Error::NotFound(format!(
            "application {application_id} not found for branch {branch_id}"
        ))
    })?;

    let cef_submitted = core::cef_submitted(pool, application.id).await?;
    let dav_submitted = core::dav_submitted(pool, application.id).await?;
    let dav_exist = dav_exist_flag(pool, &application).await?;

    Ok(ApplicationDetail {
        application,
        cef_submitted,
        dav_submitted,
        dav_exist,
    })
}

/// List a branch's applications with merged attachment bundles
pub async fn application_list_by_branch(
    pool: &SqlitePool,
    branch_id: i64,
    status_filter: Option<&str>,
) -> Result<Vec<ApplicationSummary>> {
    let mut sql = String::from(
        "SELECT id, branch_id, customer_id, name, services, status,
                overall_status, is_report_downloaded, created_at
         FROM candidate_applications
         WHERE branch_id = ?",
    );
    if status_filter.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY id");

    let mut query = sqlx::query_as::<_, Application>(&sql).bind(branch_id);
    if let Some(status) = status_filter {
        query = query.bind(status);
    }
    let applications = query.fetch_all(pool).await?;

    let titles = load_service_titles(pool).await?;

    let mut summaries = Vec::with_capacity(applications.len());
    for application in applications {
        let service_ids = application.service_ids();

        let cef_groups =
            attachments::resolve_attachments(pool, ApplicantKind::Candidate, application.id, &service_ids)
                .await?;
        let CoreAttachments { cef, dav } =
            core::resolve_core_attachments(pool, application.id).await?;

        let mut service_data = ServiceData {
            cef: cef_groups,
            dav,
        };
        if let Some(basic) = cef {
            service_data
                .cef
                .insert(CEF_BASIC_HEADING.to_string(), basic);
        }

        let service_names = service_ids
            .iter()
            .filter_map(|id| titles.get(id).cloned())
            .collect();

        summaries.push(ApplicationSummary {
            application,
            service_names,
            service_data,
        });
    }

    Ok(summaries)
}

/// Catalog of service titles, keyed by id
async fn load_service_titles(pool: &SqlitePool) -> Result<HashMap<i64, String>> {
    let services =
        sqlx::query_as::<_, Service>("SELECT id, title, description FROM services")
            .fetch_all(pool)
            .await?;
    Ok(services
        .into_iter()
        .map(|service| (service.id, service.title))
        .collect())
}

/// Compute the `dav_exist` flag for an application
///
/// The platform is expected to carry exactly one digital address
/// verification service; it is located by fuzzy title match. Absence or
/// ambiguity degrades to 0, never an error.
pub async fn dav_exist_flag(pool: &SqlitePool, application: &Application) -> Result<i64> {
    let Some(dav_service_id) = find_dav_service_id(pool).await? else {
        return Ok(0);
    };
    Ok(i64::from(application.service_ids().contains(&dav_service_id)))
}

/// Locate the canonical DAV service by fuzzy title match
async fn find_dav_service_id(pool: &SqlitePool) -> Result<Option<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM services
         WHERE LOWER(title) LIKE '%digital%'
           AND (LOWER(title) LIKE '%verification%' OR LOWER(title) LIKE '%address%')",
    )
    .fetch_all(pool)
    .await?;

    match ids.as_slice() {
        [id] => Ok(Some(*id)),
        [] => Ok(None),
        _ => {
            tracing::warn!(
                matches = ids.len(),
                "Ambiguous digital address verification service, treating as absent"
            );
            Ok(None)
        }
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
        bgv_common::db::init::create_core_tables(&pool).await.unwrap();
        pool
    }

    async fn insert_application(pool: &SqlitePool, id: i64, branch_id: i64, services: &str) {
        sqlx::query(
            "INSERT INTO candidate_applications (id, branch_id, customer_id, name, services)
             VALUES (?, ?, 1, 'Candidate', ?)",
        )
        .bind(id)
        .bind(branch_id)
        .bind(services)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_application_by_id_not_found_is_typed() {
        let pool = setup_pool().await;
        insert_application(&pool, 1, 2, "5").await;

        // Wrong branch scopes the row away
        let err = application_by_id(&pool, 1, 99).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let detail = application_by_id(&pool, 1, 2).await.unwrap();
        assert_eq!(detail.application.id, 1);
        assert!(!detail.cef_submitted);
    }

    #[tokio::test]
    async fn test_dav_exist_fuzzy_match() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO services (id, title) VALUES (3, 'Digital Address Verification')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO services (id, title) VALUES (5, 'Education Check')")
            .execute(&pool)
            .await
            .unwrap();

        insert_application(&pool, 1, 2, "5,3").await;
        insert_application(&pool, 2, 2, "5").await;

        let with_dav = application_by_id(&pool, 1, 2).await.unwrap();
        assert_eq!(with_dav.dav_exist, 1);

        let without_dav = application_by_id(&pool, 2, 2).await.unwrap();
        assert_eq!(without_dav.dav_exist, 0);
    }

    #[tokio::test]
    async fn test_dav_exist_ambiguity_degrades_to_zero() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO services (id, title) VALUES (3, 'Digital Address Verification')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO services (id, title) VALUES (4, 'Digital Address Check')")
            .execute(&pool)
            .await
            .unwrap();

        insert_application(&pool, 1, 2, "3,4").await;
        let detail = application_by_id(&pool, 1, 2).await.unwrap();
        assert_eq!(detail.dav_exist, 0);
    }

    #[tokio::test]
    async fn test_list_by_branch_merges_service_data() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO services (id, title) VALUES (5, 'Education Check')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO cef_service_forms (service_id, json) VALUES (5,
             '{\"db_table\": \"education\", \"heading\": \"Education Verification\",
               \"rows\": [{\"inputs\": [{\"name\": \"degree_copy\", \"label\": \"Degree Certificate\", \"type\": \"file\"}]}]}')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE cef_education (candidate_application_id INTEGER, degree_copy TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        insert_application(&pool, 1, 2, "5").await;
        sqlx::query(
            "INSERT INTO cef_education (candidate_application_id, degree_copy)
             VALUES (1, 'uploads/degree.pdf')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO cef_applications (candidate_application_id, is_submitted, signature)
             VALUES (1, 1, 'uploads/sig.png')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let summaries = application_list_by_branch(&pool, 2, None).await.unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.service_names, vec!["Education Check".to_string()]);
        assert!(summary.service_data.cef.contains_key("Education Verification"));
        assert!(summary.service_data.cef.contains_key(CEF_BASIC_HEADING));
        assert!(summary.service_data.dav.is_none());
    }

    #[tokio::test]
    async fn test_service_names_resolved_from_catalog() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO services (id, title) VALUES (5, 'Education Check')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO services (id, title, description)
             VALUES (9, 'Reference Check', 'professional references')",
        )
        .execute(&pool)
        .await
        .unwrap();

        // 77 has no catalog row and is skipped, not errored
        insert_application(&pool, 1, 2, "9,5,77").await;

        let summaries = application_list_by_branch(&pool, 2, None).await.unwrap();
        assert_eq!(
            summaries[0].service_names,
            vec!["Reference Check".to_string(), "Education Check".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_by_branch_status_filter() {
        let pool = setup_pool().await;
        insert_application(&pool, 1, 2, "").await;
        sqlx::query("UPDATE candidate_applications SET status = 'wip' WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();
        insert_application(&pool, 2, 2, "").await;

        let wip = application_list_by_branch(&pool, 2, Some("wip")).await.unwrap();
        assert_eq!(wip.len(), 1);
        assert_eq!(wip[0].application.id, 1);

        let all = application_list_by_branch(&pool, 2, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
