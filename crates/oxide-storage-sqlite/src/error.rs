//! Error types for the SQLite storage layer.

use thiserror::Error;

/// Errors raised while talking to a SQLite database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Resolution, serialization or binding failed before reaching the driver.
    #[error(transparent)]
    Core(#[from] oxide_storage_core::Error),

    /// The driver rejected a statement.
    #[error("statement failed: {source} (sql: {sql})")]
    Statement {
        /// Statement text as sent to the driver.
        sql: String,
        /// Driver error.
        source: sqlx::Error,
    },

    /// Connection-level database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row type is not registered with this storage.
    #[error("type `{0}` is not registered with this storage")]
    UnmappedTable(String),

    /// Synchronizing a table left rows pointing at missing parent rows.
    #[error(
        "synchronizing `{table}` would leave {rows} row(s) of `{child}` \
         referencing missing rows of `{parent}`"
    )]
    ForeignKeyCheck {
        /// Table being synchronized.
        table: String,
        /// Table holding the first dangling reference.
        child: String,
        /// Table that reference points to.
        parent: String,
        /// Number of violations found.
        rows: usize,
    },

    /// A fetched row does not have the shape of the table definition.
    #[error("row has {actual} columns, table `{table}` declares {expected}")]
    RowShape {
        /// Table name.
        table: String,
        /// Declared column count.
        expected: usize,
        /// Fetched column count.
        actual: usize,
    },
}

impl StorageError {
    /// Native driver error code, when the engine reported one.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        match self {
            Self::Statement { source, .. } | Self::Database(source) => source
                .as_database_error()
                .and_then(|e| e.code())
                .map(std::borrow::Cow::into_owned),
            _ => None,
        }
    }

    /// Statement text of a failed statement.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
