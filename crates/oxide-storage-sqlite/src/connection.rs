//! Connection options.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::Result;

/// How to open a database.
///
/// # Example
///
/// ```ignore
/// let pool = ConnectOptions::new("sqlite:app.db")
///     .create_if_missing(true)
///     .connect()
///     .await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    url: String,
    create_if_missing: bool,
    foreign_keys: bool,
    max_connections: u32,
    drop_column: Option<bool>,
}

impl ConnectOptions {
    /// Options for the database at `url` (`sqlite:path`, `sqlite::memory:`).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            create_if_missing: false,
            foreign_keys: true,
            max_connections: 5,
            drop_column: None,
        }
    }

    /// A private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    /// Creates the database file when it does not exist.
    #[must_use]
    pub const fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Enforces foreign key constraints.
    #[must_use]
    pub const fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Maximum pool size. In-memory databases always use one connection.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Overrides whether `ALTER TABLE ... DROP COLUMN` is used, regardless
    /// of the library version.
    #[must_use]
    pub const fn drop_column(mut self, supported: bool) -> Self {
        self.drop_column = Some(supported);
        self
    }

    /// Database URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// DROP COLUMN override, if any.
    #[must_use]
    pub const fn drop_column_override(&self) -> Option<bool> {
        self.drop_column
    }

    /// Returns whether the URL names an in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Driver-level options.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL cannot be parsed.
    pub fn sqlx_options(&self) -> Result<SqliteConnectOptions> {
        Ok(SqliteConnectOptions::from_str(&self.url)?
            .create_if_missing(self.create_if_missing)
            .foreign_keys(self.foreign_keys))
    }

    /// Opens a pool.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid or the database cannot be opened.
    pub async fn connect(&self) -> Result<SqlitePool> {
        let options = self.sqlx_options()?;
        let pool = if self.is_memory() {
            // Every connection would otherwise see its own empty database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(self.max_connections)
        };
        Ok(pool.connect_with(options).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_detection() {
        assert!(ConnectOptions::in_memory().is_memory());
        assert!(ConnectOptions::new("sqlite:file:db?mode=memory").is_memory());
        assert!(!ConnectOptions::new("sqlite:app.db").is_memory());
    }

    #[test]
    fn test_builder() {
        let options = ConnectOptions::new("sqlite:app.db")
            .create_if_missing(true)
            .drop_column(false);
        assert_eq!(options.url(), "sqlite:app.db");
        assert_eq!(options.drop_column_override(), Some(false));
        assert!(options.sqlx_options().is_ok());
    }
}
