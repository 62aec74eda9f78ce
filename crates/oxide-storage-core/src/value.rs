//! SQL values and conversions to and from Rust types.
//!
//! Literal nodes own a [`SqlValue`]. Values are either rendered inline
//! (escaped) or bound to positional placeholders.

use std::fmt;

use crate::error::{Error, Result};

/// A SQL value that can be rendered inline or bound to a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value, stored as an integer.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            // SQLite reads `-9223372036854775808` as a REAL.
            Self::Int(i64::MIN) => String::from("(-9223372036854775807 - 1)"),
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format_float(*f),
            Self::Text(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Returns the parameter placeholder.
    #[must_use]
    pub const fn placeholder() -> &'static str {
        "?"
    }

    /// Returns the storage class of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) | Self::Int(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Real,
            Self::Text(_) => ValueKind::Text,
            Self::Blob(_) => ValueKind::Blob,
        }
    }

    /// Returns `true` for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

// Keeps a decimal point so the literal reads back as REAL, and uses the
// engine's own overflow spelling for infinities.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        String::from("NULL")
    } else if f.is_infinite() {
        if f > 0.0 {
            String::from("1e999")
        } else {
            String::from("-1e999")
        }
    } else {
        format!("{f:?}")
    }
}

/// Storage class of a [`SqlValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// NULL.
    Null,
    /// INTEGER (booleans included).
    Integer,
    /// REAL.
    Real,
    /// TEXT.
    Text,
    /// BLOB.
    Blob,
}

impl ValueKind {
    /// Returns whether a value of kind `other` may be bound where `self` was prepared.
    ///
    /// NULL is compatible with every kind in both directions.
    #[must_use]
    pub fn accepts(self, other: Self) -> bool {
        self == other || self == Self::Null || other == Self::Null
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        };
        f.write_str(name)
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Int(self)
    }
}

macro_rules! int_to_sql {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )*
    };
}

int_to_sql!(i32, i16, i8, u32, u16, u8);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// Trait for types that can be read back from SQL values.
pub trait FromSqlValue: Sized {
    /// Converts a stored value into `Self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] when the storage class does not fit.
    fn from_sql_value(value: SqlValue) -> Result<Self>;
}

fn conversion<T>(expected: &'static str, value: &SqlValue) -> Result<T> {
    Err(Error::Conversion {
        expected,
        actual: value.kind(),
    })
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        Ok(value)
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int(n) => Ok(n),
            SqlValue::Bool(b) => Ok(Self::from(b)),
            other => conversion("i64", &other),
        }
    }
}

macro_rules! int_from_sql {
    ($($ty:ty),*) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self> {
                    let n = i64::from_sql_value(value)?;
                    <$ty>::try_from(n).map_err(|_| Error::Conversion {
                        expected: stringify!($ty),
                        actual: ValueKind::Integer,
                    })
                }
            }
        )*
    };
}

int_from_sql!(i32, i16, i8, u32, u16, u8);

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(n) => Ok(n != 0),
            other => conversion("bool", &other),
        }
    }
}

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(n) => Ok(n as Self),
            other => conversion("f64", &other),
        }
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        f64::from_sql_value(value).map(|f| f as Self)
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => conversion("String", &other),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => conversion("Vec<u8>", &other),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}
