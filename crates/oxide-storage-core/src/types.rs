//! Declared column types and the mapping from Rust types to them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a column.
///
/// Serialized as its SQL spelling (`"INTEGER"`, `"VARCHAR(20)"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    /// INTEGER.
    Integer,
    /// REAL.
    Real,
    /// TEXT.
    Text,
    /// BLOB.
    Blob,
    /// NUMERIC.
    Numeric,
    /// Any other declared type, kept verbatim (upper-cased).
    Custom(String),
}

impl DataType {
    /// Parses a declared type as reported by the catalog.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    #[must_use]
    pub fn parse(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        match upper.as_str() {
            "INTEGER" => Self::Integer,
            "REAL" => Self::Real,
            "TEXT" => Self::Text,
            "BLOB" => Self::Blob,
            "NUMERIC" => Self::Numeric,
            _ => Self::Custom(upper),
        }
    }

    /// Returns the SQL spelling of this type.
    #[must_use]
    pub fn as_sql(&self) -> &str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Numeric => "NUMERIC",
            Self::Custom(name) => name,
        }
    }

    /// Returns whether a catalog-reported type denotes this type.
    #[must_use]
    pub fn matches(&self, declared: &str) -> bool {
        match (self, Self::parse(declared)) {
            (Self::Custom(a), Self::Custom(b)) => a.eq_ignore_ascii_case(&b),
            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.as_sql().to_string()
    }
}

/// Rust types that can back a mapped column.
///
/// `Option<T>` maps to the same type as `T` but makes the column nullable.
pub trait ColumnType {
    /// Nullability implied by the Rust type.
    const NULLABLE: bool = false;

    /// Declared SQL type for this Rust type.
    fn data_type() -> DataType;
}

macro_rules! column_type {
    ($variant:ident => $($ty:ty),*) => {
        $(
            impl ColumnType for $ty {
                fn data_type() -> DataType {
                    DataType::$variant
                }
            }
        )*
    };
}

column_type!(Integer => i64, i32, i16, i8, u32, u16, u8, bool);
column_type!(Real => f64, f32);
column_type!(Text => String);
column_type!(Blob => Vec<u8>);

impl<T: ColumnType> ColumnType for Option<T> {
    const NULLABLE: bool = true;

    fn data_type() -> DataType {
        T::data_type()
    }
}
