//! Invoice generation
//!
//! Selects a customer's completed applications inside a reporting month and
//! collects the per-service status and additional fee from each service's
//! report table. Services already billed are skipped; newly collected rows
//! are flagged billed with a conditional update so two overlapping invoice
//! runs cannot double-bill a row - a zero-row update means another run won
//! the race and the service is dropped from this invoice.
//!
//! The batch is not transactional: a per-item failure is logged and the
//! successfully processed subset is still returned.

use crate::forms::{self, FormKind};
use bgv_common::db::inspect;
use bgv_common::db::models::parse_service_ids;
use bgv_common::{Error, Result};
use serde::Serialize;
use sqlx::{FromRow, Row, SqlitePool};
use tracing::warn;

/// One billed service line
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCharge {
    pub service_id: i64,
    pub heading: String,
    pub status: String,
    pub additional_fee: f64,
}

/// One application's billed services
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceApplication {
    pub application_id: i64,
    pub application_name: String,
    pub report_date: Option<String>,
    pub services: Vec<ServiceCharge>,
}

/// Invoice for one customer and reporting month
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub customer_id: i64,
    pub month: u32,
    pub year: i32,
    pub applications: Vec<InvoiceApplication>,
}

#[derive(Debug, FromRow)]
struct InvoiceCandidateRow {
    id: i64,
    name: String,
    services: String,
    report_date: Option<String>,
}

/// Generate the invoice for a customer's reporting month
///
/// Side effect: every returned service line has been flagged
/// `is_billed = 1` with `billed_date` set.
pub async fn generate_invoice(
    pool: &SqlitePool,
    customer_id: i64,
    month: u32,
    year: i32,
) -> Result<Invoice> {
    if !(1..=12).contains(&month) {
        return Err(Error::InvalidInput(format!("invalid month: {month}")));
    }

    let rows = sqlx::query_as::<_, InvoiceCandidateRow>(
        "SELECT a.id, a.name, a.services, m.report_date
         FROM candidate_applications a
         JOIN cmt_applications m ON m.application_id = a.id
         WHERE a.customer_id = ?
           AND a.status IN ('completed', 'closed')
           AND strftime('%Y', m.report_date) = ?
           AND strftime('%m', m.report_date) = ?
         ORDER BY a.id",
    )
    .bind(customer_id)
    .bind(year.to_string())
    .bind(format!("{month:02}"))
    .fetch_all(pool)
    .await?;

    let mut applications = Vec::new();
    for row in rows {
        let mut charges = Vec::new();
        for service_id in parse_service_ids(&row.services) {
            match bill_service(pool, row.id, service_id).await {
                Ok(Some(charge)) => charges.push(charge),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        application_id = row.id,
                        service_id, "Skipping service in invoice after error: {e}"
                    );
                }
            }
        }
        if !charges.is_empty() {
            applications.push(InvoiceApplication {
                application_id: row.id,
                application_name: row.name,
                report_date: row.report_date,
                services: charges,
            });
        }
    }

    Ok(Invoice {
        customer_id,
        month,
        year,
        applications,
    })
}

/// Collect and flag one service's report row; None when nothing billable
async fn bill_service(
    pool: &SqlitePool,
    application_id: i64,
    service_id: i64,
) -> Result<Option<ServiceCharge>> {
    let Some(descriptor) = forms::form_descriptor(pool, FormKind::Report, service_id).await? else {
        return Ok(None);
    };
    if !inspect::is_safe_identifier(&descriptor.db_table) {
        warn!(
            service_id,
            db_table = %descriptor.db_table,
            "Report descriptor names an unsafe table, skipping billing"
        );
        return Ok(None);
    }

    let table = FormKind::Report.data_table(&descriptor.db_table);
    if !inspect::table_exists(pool, &table).await? {
        return Ok(None);
    }

    let row = sqlx::query(&format!(
        "SELECT status, additional_fee, is_billed FROM {table}
         WHERE candidate_application_id = ?"
    ))
    .bind(application_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let already_billed: bool = row.try_get("is_billed").unwrap_or(false);
    if already_billed {
        return Ok(None);
    }

    let status: String = row.try_get("status").unwrap_or_default();
    let additional_fee: f64 = row
        .try_get::<Option<f64>, _>("additional_fee")
        .ok()
        .flatten()
        .unwrap_or(0.0);

    // Conditional flag-set: losing the race means another invoice run
    // already claimed this row, so it must not appear here.
    let updated = sqlx::query(&format!(
        "UPDATE {table}
         SET is_billed = 1, billed_date = CURRENT_TIMESTAMP
         WHERE candidate_application_id = ? AND is_billed = 0"
    ))
    .bind(application_id)
    .execute(pool)
    .await?;
    if updated.rows_affected() == 0 {
        warn!(
            application_id,
            service_id, "Billing race lost, excluding service from invoice"
        );
        return Ok(None);
    }

    Ok(Some(ServiceCharge {
        service_id,
        heading: descriptor.heading,
        status,
        additional_fee,
    }))
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

    async fn insert_fixture(pool: &SqlitePool) {
        sqlx::query(
            "INSERT INTO report_forms (service_id, json) VALUES (5,
             '{\"db_table\": \"t_bgcheck\", \"heading\": \"Background Check\", \"rows\": []}')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO candidate_applications
                (id, branch_id, customer_id, name, services, status)
             VALUES (1, 2, 1, 'Candidate', '5', 'completed')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO cmt_applications (application_id, report_date)
             VALUES (1, '2026-03-14')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE t_bgcheck (
                candidate_application_id INTEGER,
                status TEXT,
                additional_fee REAL,
                is_billed INTEGER NOT NULL DEFAULT 0,
                billed_date TEXT
            )",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO t_bgcheck (candidate_application_id, status, additional_fee)
             VALUES (1, 'completed_green', 250.0)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_generate_invoice_collects_and_flags() {
        let pool = setup_pool().await;
        insert_fixture(&pool).await;

        let invoice = generate_invoice(&pool, 1, 3, 2026).await.unwrap();
        assert_eq!(invoice.applications.len(), 1);
        let app = &invoice.applications[0];
        assert_eq!(app.application_id, 1);
        assert_eq!(app.services.len(), 1);
        assert_eq!(app.services[0].status, "completed_green");
        assert_eq!(app.services[0].additional_fee, 250.0);

        let (is_billed, billed_date): (bool, Option<String>) = sqlx::query_as(
            "SELECT is_billed, billed_date FROM t_bgcheck WHERE candidate_application_id = 1",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(is_billed);
        assert!(billed_date.is_some());
    }

    #[tokio::test]
    async fn test_second_run_does_not_rebill() {
        let pool = setup_pool().await;
        insert_fixture(&pool).await;

        let first = generate_invoice(&pool, 1, 3, 2026).await.unwrap();
        assert_eq!(first.applications.len(), 1);

        let billed_date: Option<String> =
            sqlx::query_scalar("SELECT billed_date FROM t_bgcheck WHERE candidate_application_id = 1")
                .fetch_one(&pool)
                .await
                .unwrap();

        let second = generate_invoice(&pool, 1, 3, 2026).await.unwrap();
        assert!(second.applications.is_empty());

        // billed_date untouched by the second run
        let billed_date_after: Option<String> =
            sqlx::query_scalar("SELECT billed_date FROM t_bgcheck WHERE candidate_application_id = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(billed_date, billed_date_after);
    }

    #[tokio::test]
    async fn test_month_scoping() {
        let pool = setup_pool().await;
        insert_fixture(&pool).await;

        let wrong_month = generate_invoice(&pool, 1, 4, 2026).await.unwrap();
        assert!(wrong_month.applications.is_empty());

        let wrong_year = generate_invoice(&pool, 1, 3, 2025).await.unwrap();
        assert!(wrong_year.applications.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_month_rejected() {
        let pool = setup_pool().await;
        let err = generate_invoice(&pool, 1, 13, 2026).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_report_table_skipped() {
        let pool = setup_pool().await;
        insert_fixture(&pool).await;
        sqlx::query("DROP TABLE t_bgcheck").execute(&pool).await.unwrap();

        let invoice = generate_invoice(&pool, 1, 3, 2026).await.unwrap();
        assert!(invoice.applications.is_empty());
    }
}
