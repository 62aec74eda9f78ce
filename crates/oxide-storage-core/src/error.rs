//! Error types for query serialization, binding and schema planning.

use crate::value::ValueKind;

/// Errors raised while resolving, serializing or binding a statement.
///
/// Every variant names the reference or the counts involved so a failure can
/// be diagnosed without re-running with verbose logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A row type was used as a table but no definition is registered for it.
    #[error("type `{0}` is not mapped to any registered table")]
    UnmappedTable(String),

    /// A field's owner type has no registered table definition.
    #[error("field `{field}` of `{owner}` does not belong to any registered table")]
    UnmappedField {
        /// Row type that owns the field.
        owner: String,
        /// Field (column) name.
        field: String,
    },

    /// The owner is registered but the table has no column for this field.
    #[error("table `{table}` has no column for field `{field}`")]
    UnknownField {
        /// Table name.
        table: String,
        /// Field (column) name.
        field: String,
    },

    /// A back-reference to an alias that is not declared in scope.
    #[error("alias `{0}` is not in scope")]
    UnknownAlias(String),

    /// A reference to a common table expression that is not declared.
    #[error("common table expression `{0}` is not in scope")]
    UnknownCte(String),

    /// A CTE column that the CTE does not expose.
    #[error("common table expression `{cte}` has no column `{column}`")]
    UnknownCteColumn {
        /// CTE name.
        cte: String,
        /// Column name.
        column: String,
    },

    /// A column qualified with a table alias that is not in scope.
    #[error("table alias `{0}` is not in scope")]
    UnknownTableAlias(String),

    /// A column used against a table it does not belong to.
    #[error("column `{column}` does not belong to table `{table}`")]
    ColumnOutsideTable {
        /// Target table (or alias).
        table: String,
        /// Offending column.
        column: String,
    },

    /// A statement whose shape cannot be rendered.
    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    /// A rebind supplied the wrong number of values.
    #[error("expected {expected} bind values, got {actual}")]
    BindCount {
        /// Number of placeholders fixed at prepare time.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// A rebind supplied a value whose storage class differs from the prepared one.
    #[error("bind value {index} must be {expected}, got {actual}")]
    BindType {
        /// Zero-based placeholder index.
        index: usize,
        /// Kind fixed at prepare time.
        expected: ValueKind,
        /// Kind supplied.
        actual: ValueKind,
    },

    /// A positional bind outside the tuple.
    #[error("bind index {index} is out of range for {len} values")]
    BindIndex {
        /// Requested index.
        index: usize,
        /// Tuple length.
        len: usize,
    },

    /// A stored value could not be converted to the requested Rust type.
    #[error("cannot convert {actual} value to {expected}")]
    Conversion {
        /// Target Rust type.
        expected: &'static str,
        /// Kind of the stored value.
        actual: ValueKind,
    },

    /// A by-key operation on a table without a primary key.
    #[error("table `{0}` has no primary key")]
    NoPrimaryKey(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
