//! Field accessors.
//!
//! A [`Field`] reads and writes one column value on a row object. It is
//! built either from a direct field projection or from a getter/setter pair;
//! callers use the same `get`/`set` either way. The owning row type and the
//! value type are both carried in the accessor's type, so a comparison
//! between an `i64` column and a string does not compile.

use std::any::{type_name, TypeId};
use std::fmt;

use crate::error::Result;
use crate::value::{FromSqlValue, SqlValue, ToSqlValue};

/// Identity of a field: the owning row type plus the column name.
///
/// This is what expression nodes store; it does not borrow the table.
#[derive(Clone, Copy)]
pub struct FieldKey {
    owner: TypeId,
    owner_name: &'static str,
    name: &'static str,
}

impl FieldKey {
    /// Creates the key for field `name` of row type `O`.
    #[must_use]
    pub fn of<O: 'static>(name: &'static str) -> Self {
        Self {
            owner: TypeId::of::<O>(),
            owner_name: type_name::<O>(),
            name,
        }
    }

    /// Row type that owns the field.
    #[must_use]
    pub const fn owner(&self) -> TypeId {
        self.owner
    }

    /// Rust name of the owning row type, for diagnostics.
    #[must_use]
    pub const fn owner_name(&self) -> &'static str {
        self.owner_name
    }

    /// Column name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for FieldKey {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for FieldKey {}

impl std::hash::Hash for FieldKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner_name, self.name)
    }
}

enum Access<O, T> {
    Direct {
        get: fn(&O) -> &T,
        get_mut: fn(&mut O) -> &mut T,
    },
    Property {
        get: fn(&O) -> T,
        set: fn(&mut O, T),
    },
}

/// Typed accessor for column `name` of row type `O`, holding values of type `T`.
pub struct Field<O, T> {
    name: &'static str,
    access: Access<O, T>,
}

impl<O, T> Field<O, T> {
    /// Accessor reaching the value through a direct field projection.
    #[must_use]
    pub const fn direct(
        name: &'static str,
        get: fn(&O) -> &T,
        get_mut: fn(&mut O) -> &mut T,
    ) -> Self {
        Self {
            name,
            access: Access::Direct { get, get_mut },
        }
    }

    /// Accessor reaching the value through a getter/setter pair.
    #[must_use]
    pub const fn property(name: &'static str, get: fn(&O) -> T, set: fn(&mut O, T)) -> Self {
        Self {
            name,
            access: Access::Property { get, set },
        }
    }

    /// Column name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Reads the value from `row`.
    #[must_use]
    pub fn get(&self, row: &O) -> T
    where
        T: Clone,
    {
        match &self.access {
            Access::Direct { get, .. } => get(row).clone(),
            Access::Property { get, .. } => get(row),
        }
    }

    /// Writes `value` into `row`.
    pub fn set(&self, row: &mut O, value: T) {
        match &self.access {
            Access::Direct { get_mut, .. } => *get_mut(row) = value,
            Access::Property { set, .. } => set(row, value),
        }
    }
}

impl<O: 'static, T> Field<O, T> {
    /// Identity of this field.
    #[must_use]
    pub fn key(&self) -> FieldKey {
        FieldKey::of::<O>(self.name)
    }
}

impl<O, T> Clone for Field<O, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, T> Copy for Field<O, T> {}

impl<O, T> Clone for Access<O, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, T> Copy for Access<O, T> {}

impl<O, T> fmt::Debug for Field<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = match self.access {
            Access::Direct { .. } => "direct",
            Access::Property { .. } => "property",
        };
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("access", &form)
            .finish()
    }
}

/// Type-erased column access over row type `O`.
///
/// Table definitions keep one of these per column so rows can be turned into
/// bind values and rebuilt from fetched values.
pub trait ColumnAccess<O>: Send + Sync {
    /// Identity of the underlying field.
    fn key(&self) -> FieldKey;

    /// Reads the column value from `row` as a [`SqlValue`].
    fn read(&self, row: &O) -> SqlValue;

    /// Converts `value` and writes it into `row`.
    ///
    /// # Errors
    ///
    /// Returns a conversion error when `value` does not fit the field type.
    fn write(&self, row: &mut O, value: SqlValue) -> Result<()>;
}

impl<O, T> ColumnAccess<O> for Field<O, T>
where
    O: 'static,
    T: Clone + ToSqlValue + FromSqlValue + 'static,
{
    fn key(&self) -> FieldKey {
        Field::key(self)
    }

    fn read(&self, row: &O) -> SqlValue {
        self.get(row).to_sql_value()
    }

    fn write(&self, row: &mut O, value: SqlValue) -> Result<()> {
        self.set(row, T::from_sql_value(value)?);
        Ok(())
    }
}
