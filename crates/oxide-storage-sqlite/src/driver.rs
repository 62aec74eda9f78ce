//! Statement execution over sqlx.
//!
//! Binds [`SqlValue`] tuples positionally and decodes result columns by the
//! storage class SQLite reports for each value.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
use sqlx::{Row, Sqlite, SqliteExecutor, TypeInfo, ValueRef};
use tracing::debug;

use oxide_storage_core::SqlValue;

use crate::error::{Result, StorageError};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds `values` to `query` in order.
fn bind_all<'q>(query: SqliteQuery<'q>, values: &[SqlValue]) -> SqliteQuery<'q> {
    values.iter().fold(query, |query, value| match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
    })
}

fn statement_error(sql: &str) -> impl FnOnce(sqlx::Error) -> StorageError + '_ {
    move |source| StorageError::Statement {
        sql: sql.to_string(),
        source,
    }
}

/// Executes `sql` with `binds`.
///
/// # Errors
///
/// Returns [`StorageError::Statement`] carrying the statement text when the
/// driver rejects it.
pub async fn execute<'c, E>(executor: E, sql: &str, binds: &[SqlValue]) -> Result<SqliteQueryResult>
where
    E: SqliteExecutor<'c>,
{
    debug!(sql = %sql, binds = binds.len(), "Executing SQL");
    bind_all(sqlx::query(sql), binds)
        .execute(executor)
        .await
        .map_err(statement_error(sql))
}

/// Runs `sql` with `binds` and decodes every row.
///
/// # Errors
///
/// Returns [`StorageError::Statement`] when the driver rejects the statement
/// and [`StorageError::Database`] when a value cannot be decoded.
pub async fn fetch_all<'c, E>(executor: E, sql: &str, binds: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>>
where
    E: SqliteExecutor<'c>,
{
    debug!(sql = %sql, binds = binds.len(), "Fetching rows");
    let rows = bind_all(sqlx::query(sql), binds)
        .fetch_all(executor)
        .await
        .map_err(statement_error(sql))?;
    rows.iter().map(decode_row).collect()
}

/// Decodes all columns of `row`.
///
/// # Errors
///
/// Returns [`StorageError::Database`] when a value cannot be decoded.
pub fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get(index)?),
        "REAL" => SqlValue::Float(row.try_get(index)?),
        "BLOB" => SqlValue::Blob(row.try_get(index)?),
        _ => SqlValue::Text(row.try_get(index)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_bind_and_decode_every_storage_class() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let binds = [
            SqlValue::Int(7),
            SqlValue::Float(1.5),
            SqlValue::Text(String::from("O'Brien")),
            SqlValue::Blob(vec![0, 1, 2]),
            SqlValue::Null,
            SqlValue::Bool(true),
        ];
        let rows = fetch_all(&pool, "SELECT ?, ?, ?, ?, ?, ?", &binds)
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                SqlValue::Int(7),
                SqlValue::Float(1.5),
                SqlValue::Text(String::from("O'Brien")),
                SqlValue::Blob(vec![0, 1, 2]),
                SqlValue::Null,
                SqlValue::Int(1),
            ]]
        );
    }

    #[tokio::test]
    async fn test_statement_error_carries_sql() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let err = execute(&pool, "INSERT INTO missing VALUES (1)", &[])
            .await
            .unwrap_err();
        assert_eq!(err.sql(), Some("INSERT INTO missing VALUES (1)"));
        assert!(err.to_string().contains("missing"));
    }
}
