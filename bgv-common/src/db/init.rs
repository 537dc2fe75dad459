//! Database initialization
//!
//! Creates the connection pool and the fixed tables on first run. The
//! dynamic per-service tables (`cef_<table>` intake tables and the report
//! status tables) are intentionally NOT created here: they are provisioned
//! by the form-administration side of the platform and discovered at read
//! time via [`crate::db::inspect`].

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create fixed tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // Busy timeout keeps overlapping report runs from failing on lock
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_core_tables(&pool).await?;

    Ok(pool)
}

/// Create all fixed tables (idempotent - safe to call multiple times)
pub async fn create_core_tables(pool: &SqlitePool) -> Result<()> {
    create_services_table(pool).await?;
    create_form_registry_tables(pool).await?;
    create_customers_table(pool).await?;
    create_branches_table(pool).await?;
    create_application_tables(pool).await?;
    create_submission_tables(pool).await?;
    create_cmt_applications_table(pool).await?;
    Ok(())
}

/// Services catalog (id, title, description)
pub async fn create_services_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS services (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Form descriptor registries: intake (`cef_service_forms`) and report (`report_forms`)
pub async fn create_form_registry_tables(pool: &SqlitePool) -> Result<()> {
    for table in ["cef_service_forms", "report_forms"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY,
                service_id INTEGER NOT NULL UNIQUE,
                json TEXT NOT NULL
            )
            "#,
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_branches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS branches (
            id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Candidate and client application tables (same shape, two intake paths)
pub async fn create_application_tables(pool: &SqlitePool) -> Result<()> {
    for table in ["candidate_applications", "client_applications"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY,
                branch_id INTEGER NOT NULL,
                customer_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                services TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'initiated',
                overall_status TEXT,
                is_report_downloaded INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Core submission tables: CEF intake row and DAV intake row per application
pub async fn create_submission_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cef_applications (
            id INTEGER PRIMARY KEY,
            candidate_application_id INTEGER NOT NULL,
            is_submitted INTEGER NOT NULL DEFAULT 0,
            signature TEXT,
            resume_file TEXT,
            govt_id TEXT,
            pan_card_image TEXT,
            aadhar_card_image TEXT,
            passport_photo TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dav_applications (
            id INTEGER PRIMARY KEY,
            candidate_application_id INTEGER NOT NULL,
            is_submitted INTEGER NOT NULL DEFAULT 0,
            identity_proof TEXT,
            home_photo TEXT,
            locality TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Case-management rows carrying the report date used by invoicing
pub async fn create_cmt_applications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cmt_applications (
            id INTEGER PRIMARY KEY,
            application_id INTEGER NOT NULL,
            report_date TEXT,
            overall_status TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
