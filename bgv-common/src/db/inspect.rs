//! Schema introspection for dynamically configured tables
//!
//! Per-service form descriptors name their own target tables and columns,
//! and those descriptors evolve independently of deployed code: a
//! descriptor may reference a column that was added to the form JSON but
//! never migrated into the table, or a table that does not exist yet. The
//! inspector answers "what actually exists right now" so callers can
//! project only live columns and skip absent tables instead of failing.
//!
//! Every entry point validates identifiers before they are interpolated
//! into SQL text. Values are always bound parameters; identifiers are the
//! only interpolation and they never pass through unvalidated.

use crate::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Maximum accepted identifier length
const MAX_IDENTIFIER_LEN: usize = 100;

/// Check whether a name is safe to use as a SQL identifier
///
/// Only alphanumerics and underscores, non-empty, bounded length. Stricter
/// than SQLite itself, deliberately: descriptor-supplied names that fail
/// this check are treated as hostile.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() < MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check if a table exists in the live schema
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    if !is_safe_identifier(table) {
        return Err(Error::InvalidInput(format!("unsafe table name: {table:?}")));
    }

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type = 'table' AND name = ?
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Read the column names of a table in schema order
///
/// Returns an empty list if the table does not exist.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    if !is_safe_identifier(table) {
        return Err(Error::InvalidInput(format!("unsafe table name: {table:?}")));
    }

    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(pool)
        .await?;

    // PRAGMA table_info returns (cid, name, type, notnull, dflt_value, pk)
    Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
}

/// Return the subset of `declared` columns present in the live schema
///
/// Declaration order is preserved. A missing table yields an empty list so
/// the caller can skip the table read entirely.
pub async fn existing_columns(
    pool: &SqlitePool,
    table: &str,
    declared: &[String],
) -> Result<Vec<String>> {
    if !table_exists(pool, table).await? {
        return Ok(Vec::new());
    }

    let live = table_columns(pool, table).await?;

    Ok(declared
        .iter()
        .filter(|column| is_safe_identifier(column) && live.iter().any(|l| l == *column))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> SqlitePool {
        SqlitePool::connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_is_safe_identifier() {
        assert!(is_safe_identifier("cef_police_verification"));
        assert!(is_safe_identifier("status_2"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("t; DROP TABLE services"));
        assert!(!is_safe_identifier("t-name"));
        assert!(!is_safe_identifier(&"x".repeat(200)));
    }

    #[tokio::test]
    async fn test_table_exists() {
        let pool = setup_pool().await;
        assert!(!table_exists(&pool, "t_edu").await.unwrap());

        sqlx::query("CREATE TABLE t_edu (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        assert!(table_exists(&pool, "t_edu").await.unwrap());
    }

    #[tokio::test]
    async fn test_table_exists_rejects_unsafe_name() {
        let pool = setup_pool().await;
        let err = table_exists(&pool, "x; DROP TABLE y").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_existing_columns_preserves_declaration_order() {
        let pool = setup_pool().await;
        sqlx::query("CREATE TABLE t_check (id INTEGER, photo TEXT, doc TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let declared = vec![
            "doc".to_string(),
            "missing_column".to_string(),
            "photo".to_string(),
        ];
        let columns = existing_columns(&pool, "t_check", &declared).await.unwrap();
        assert_eq!(columns, vec!["doc".to_string(), "photo".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_columns_missing_table_is_empty() {
        let pool = setup_pool().await;
        let declared = vec!["photo".to_string()];
        let columns = existing_columns(&pool, "no_such_table", &declared)
            .await
            .unwrap();
        assert!(columns.is_empty());
    }

    #[tokio::test]
    async fn test_existing_columns_filters_unsafe_declared_names() {
        let pool = setup_pool().await;
        sqlx::query("CREATE TABLE t_check (photo TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        // An unsafe declared name never reaches the projection, even if a
        // column of that literal name somehow existed.
        let declared = vec!["photo".to_string(), "a b".to_string()];
        let columns = existing_columns(&pool, "t_check", &declared).await.unwrap();
        assert_eq!(columns, vec!["photo".to_string()]);
    }
}
