//! Live schema introspection.
//!
//! Reads the catalog as-is; interpreting the rows is left to the planner.

use sqlx::{Acquire, Sqlite, SqliteExecutor};

use oxide_storage_core::dialect::quote_with;
use oxide_storage_core::schema::TableInfo;

use crate::dialect::SqliteVersion;
use crate::error::{Result, StorageError};

const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const TABLE_EXISTS_SQL: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?";

const TABLE_INFO_SQL: &str = "SELECT cid, name, type, \"notnull\", dflt_value, pk, hidden \
     FROM pragma_table_xinfo(?) ORDER BY cid";

const INDEXED_COLUMNS_SQL: &str = "SELECT ii.name FROM pragma_index_list(?) AS il \
     JOIN pragma_index_info(il.name) AS ii";

const FOREIGN_KEY_COLUMNS_SQL: &str = "SELECT \"from\" FROM pragma_foreign_key_list(?)";

const TABLE_SQL: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";

// Indexes of the table, plus every trigger and view: SQLite re-checks them
// all when a column is dropped.
const DEPENDENT_SQL: &str = "SELECT sql FROM sqlite_master WHERE sql IS NOT NULL \
     AND ((type = 'index' AND tbl_name = ?) OR type IN ('trigger', 'view'))";

/// Names of all user tables, sorted.
///
/// # Errors
///
/// Returns an error when the catalog cannot be read.
pub async fn list_tables<'c, E: SqliteExecutor<'c>>(executor: E) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(LIST_TABLES_SQL).fetch_all(executor).await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Returns whether table `name` exists.
///
/// # Errors
///
/// Returns an error when the catalog cannot be read.
pub async fn table_exists<'c, E: SqliteExecutor<'c>>(executor: E, name: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as(TABLE_EXISTS_SQL)
        .bind(name)
        .fetch_one(executor)
        .await?;
    Ok(count > 0)
}

/// Columns of table `name` as the catalog reports them, generated columns
/// included. Empty when the table does not exist.
///
/// [`TableInfo::constrained`] is set for columns that an index, a foreign
/// key, a CHECK constraint, a generated column, a trigger or a view depends
/// on. Dependencies found only in SQL text are matched by name, so the flag
/// can be set on a column that is merely mentioned.
///
/// # Errors
///
/// Returns an error when the catalog cannot be read.
pub async fn table_info<'a, A>(conn: A, name: &str) -> Result<Vec<TableInfo>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    type Row = (i64, String, String, i64, Option<String>, i64, i64);
    let mut conn = conn.acquire().await?;
    let rows: Vec<Row> = sqlx::query_as(TABLE_INFO_SQL)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    let mut columns: Vec<TableInfo> = rows
        .into_iter()
        .map(
            |(cid, name, data_type, not_null, default_value, pk, hidden)| TableInfo {
                cid,
                name,
                data_type,
                not_null: not_null != 0,
                default_value,
                pk,
                hidden,
                constrained: false,
            },
        )
        .collect();
    if columns.is_empty() {
        return Ok(columns);
    }

    let mut pinned: Vec<String> = Vec::new();
    let indexed: Vec<(Option<String>,)> = sqlx::query_as(INDEXED_COLUMNS_SQL)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    // Expression index entries have no name; their SQL is scanned below.
    pinned.extend(indexed.into_iter().filter_map(|(column,)| column));
    let keys: Vec<(String,)> = sqlx::query_as(FOREIGN_KEY_COLUMNS_SQL)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    pinned.extend(keys.into_iter().map(|(column,)| column));

    let dependents: Vec<(String,)> = sqlx::query_as(DEPENDENT_SQL)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    let (table_sql,): (Option<String>,) = sqlx::query_as(TABLE_SQL)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or((None,));
    let table_sql = table_sql.unwrap_or_default();
    let has_expressions =
        mentions(&table_sql, "check") > 0 || columns.iter().any(TableInfo::is_generated);

    for column in &mut columns {
        column.constrained = pinned.iter().any(|p| p.eq_ignore_ascii_case(&column.name))
            || dependents
                .iter()
                .any(|(sql,)| mentions(sql, &column.name) > 0)
            // The definition names every column once; a second mention is
            // an expression or a table constraint.
            || (has_expressions && mentions(&table_sql, &column.name) > 1);
    }
    Ok(columns)
}

/// Counts case-insensitive occurrences of `word` in `sql` that are not part
/// of a longer identifier.
fn mentions(sql: &str, word: &str) -> usize {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$';
    if word.is_empty() {
        return 0;
    }
    let haystack = sql.to_ascii_lowercase();
    let needle = word.to_ascii_lowercase();
    haystack
        .match_indices(&needle)
        .filter(|(at, _)| {
            let before = haystack[..*at].chars().next_back();
            let after = haystack[at + needle.len()..].chars().next();
            !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
        })
        .count()
}

/// Number of rows in table `name`.
///
/// # Errors
///
/// Returns an error when the table does not exist.
pub async fn row_count<'c, E: SqliteExecutor<'c>>(executor: E, name: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_with('"', name));
    let (count,): (i64,) = sqlx::query_as(&sql)
        .fetch_one(executor)
        .await
        .map_err(|source| StorageError::Statement {
            sql: sql.clone(),
            source,
        })?;
    Ok(count)
}

/// A row whose foreign key points at a missing parent row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    /// Table holding the dangling reference.
    pub table: String,
    /// Rowid of the offending row, `None` for WITHOUT ROWID tables.
    pub rowid: Option<i64>,
    /// Table the reference points to.
    pub parent: String,
}

/// Returns whether foreign key enforcement is on for this connection.
///
/// # Errors
///
/// Returns an error when the pragma cannot be read.
pub async fn foreign_keys_enabled<'c, E: SqliteExecutor<'c>>(executor: E) -> Result<bool> {
    let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
        .fetch_one(executor)
        .await?;
    Ok(enabled != 0)
}

/// Every foreign key violation in the database, as `PRAGMA foreign_key_check`
/// reports them.
///
/// # Errors
///
/// Returns an error when the check cannot run.
pub async fn foreign_key_violations<'c, E: SqliteExecutor<'c>>(
    executor: E,
) -> Result<Vec<ForeignKeyViolation>> {
    let rows: Vec<(String, Option<i64>, String, i64)> =
        sqlx::query_as("PRAGMA foreign_key_check")
            .fetch_all(executor)
            .await?;
    Ok(rows
        .into_iter()
        .map(|(table, rowid, parent, _)| ForeignKeyViolation {
            table,
            rowid,
            parent,
        })
        .collect())
}

/// Version of the SQLite library behind the connection.
///
/// # Errors
///
/// Returns an error when the query fails or the version text is not
/// recognized.
pub async fn sqlite_version<'c, E: SqliteExecutor<'c>>(executor: E) -> Result<SqliteVersion> {
    let (text,): (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(executor)
        .await?;
    SqliteVersion::parse(&text).ok_or_else(|| {
        StorageError::Database(sqlx::Error::Protocol(format!(
            "unrecognized SQLite version `{text}`"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    #[tokio::test]
    async fn test_list_and_exists() {
        let pool = create_test_pool().await;
        sqlx::query("CREATE TABLE b (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE a (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(list_tables(&pool).await.unwrap(), ["a", "b"]);
        assert!(table_exists(&pool, "a").await.unwrap());
        assert!(!table_exists(&pool, "c").await.unwrap());
    }

    #[tokio::test]
    async fn test_table_info_reports_catalog_shape() {
        let pool = create_test_pool().await;
        sqlx::query(
            "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, \
             age integer DEFAULT 0, twice INTEGER GENERATED ALWAYS AS (age * 2) VIRTUAL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let info = table_info(&pool, "users").await.unwrap();
        assert_eq!(info.len(), 4);
        assert_eq!(info[0].name, "id");
        assert_eq!(info[0].pk, 1);
        assert!(info[1].not_null);
        assert_eq!(info[1].pk, 0);
        assert_eq!(info[2].data_type, "integer");
        assert_eq!(info[2].default_value.as_deref(), Some("0"));
        assert!(info[3].is_generated());
        assert!(table_info(&pool, "missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_row_count_and_version() {
        let pool = create_test_pool().await;
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t VALUES (1), (2)")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(row_count(&pool, "t").await.unwrap(), 2);
        assert!(row_count(&pool, "nope").await.is_err());
        assert!(sqlite_version(&pool).await.unwrap() >= SqliteVersion::new(3, 0, 0));
    }

    #[tokio::test]
    async fn test_dependent_columns_are_constrained() {
        let pool = create_test_pool().await;
        for sql in [
            "CREATE TABLE teams (id INTEGER PRIMARY KEY, code TEXT UNIQUE)",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT, \
             team_id INTEGER REFERENCES teams, age INTEGER CHECK (age >= 0), \
             nick TEXT, city TEXT, zip TEXT, note TEXT)",
            "CREATE INDEX users_city ON users (city)",
            "CREATE INDEX users_zip ON users (lower(zip))",
            "CREATE VIEW nicks AS SELECT nick FROM users",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        let info = table_info(&pool, "users").await.unwrap();
        let constrained: Vec<&str> = info
            .iter()
            .filter(|c| c.constrained)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(constrained, ["team_id", "age", "nick", "city", "zip"]);

        let teams = table_info(&pool, "teams").await.unwrap();
        assert!(!teams[0].constrained);
        assert!(teams[1].constrained);
    }

    #[tokio::test]
    async fn test_trigger_pins_the_columns_it_names() {
        let pool = create_test_pool().await;
        for sql in [
            "CREATE TABLE events (id INTEGER PRIMARY KEY, kind TEXT, payload TEXT)",
            "CREATE TABLE audit (kind TEXT)",
            "CREATE TRIGGER events_audit AFTER INSERT ON events \
             BEGIN INSERT INTO audit VALUES (new.kind); END",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        let info = table_info(&pool, "events").await.unwrap();
        assert!(info[1].constrained);
        assert!(!info[2].constrained);
    }

    #[test]
    fn test_mentions_matches_whole_identifiers() {
        assert_eq!(mentions("SELECT nick FROM users", "nick"), 1);
        assert_eq!(mentions("SELECT nickname, user_nick FROM users", "nick"), 0);
        assert_eq!(mentions("CHECK (Age >= 0 AND \"age\" < 200)", "age"), 2);
        assert_eq!(mentions("anything", ""), 0);
    }

    #[tokio::test]
    async fn test_foreign_key_pragmas() {
        let pool = create_test_pool().await;
        assert!(foreign_keys_enabled(&pool).await.unwrap());
        for sql in [
            "PRAGMA foreign_keys = OFF",
            "CREATE TABLE parents (id INTEGER PRIMARY KEY)",
            "CREATE TABLE children (id INTEGER PRIMARY KEY, \
             parent_id INTEGER REFERENCES parents(id))",
            "INSERT INTO children VALUES (7, 1)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        assert!(!foreign_keys_enabled(&pool).await.unwrap());
        assert_eq!(
            foreign_key_violations(&pool).await.unwrap(),
            [ForeignKeyViolation {
                table: String::from("children"),
                rowid: Some(7),
                parent: String::from("parents"),
            }]
        );
    }
}
