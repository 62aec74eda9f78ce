//! SQLite dialect.

use std::fmt;

use oxide_storage_core::dialect::Dialect;

/// Version of the SQLite library a connection runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SqliteVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl SqliteVersion {
    /// First release with `ALTER TABLE ... DROP COLUMN`.
    pub const DROP_COLUMN: Self = Self::new(3, 35, 0);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses the text returned by `sqlite_version()`, e.g. `3.45.1`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.').map(str::parse::<u32>);
        let major = parts.next()?.ok()?;
        let minor = parts.next().unwrap_or(Ok(0)).ok()?;
        let patch = parts.next().unwrap_or(Ok(0)).ok()?;
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for SqliteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// SQLite dialect with capabilities derived from the library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteDialect {
    drop_column: bool,
}

impl SqliteDialect {
    /// Dialect for a current SQLite, with native DROP COLUMN.
    #[must_use]
    pub const fn new() -> Self {
        Self { drop_column: true }
    }

    /// Dialect matching the capabilities of `version`.
    #[must_use]
    pub fn for_version(version: SqliteVersion) -> Self {
        Self {
            drop_column: version >= SqliteVersion::DROP_COLUMN,
        }
    }

    /// Overrides DROP COLUMN support.
    #[must_use]
    pub const fn with_drop_column(mut self, supported: bool) -> Self {
        self.drop_column = supported;
        self
    }
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_drop_column(&self) -> bool {
        self.drop_column
    }
}
