//! Registry of the table definitions known to a session.

use std::any::{Any, TypeId};

use crate::error::{Error, Result};
use crate::field::FieldKey;
use crate::schema::column::{ColumnSchema, TableSchema};
use crate::schema::table::TableDef;

/// Object-safe view of a [`TableDef`] used for name resolution.
pub trait MappedTable: Send + Sync {
    /// Declared shape.
    fn schema(&self) -> &TableSchema;

    /// Row type mapped by this table.
    fn owner(&self) -> TypeId;

    /// Column declared for a field of the row type.
    fn column(&self, key: &FieldKey) -> Option<&ColumnSchema>;

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;
}

impl<O: 'static> MappedTable for TableDef<O> {
    fn schema(&self) -> &TableSchema {
        TableDef::schema(self)
    }

    fn owner(&self) -> TypeId {
        TypeId::of::<O>()
    }

    fn column(&self, key: &FieldKey) -> Option<&ColumnSchema> {
        self.column_for(key).map(|c| c.schema())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The table definitions known to a session, one per row type.
#[derive(Default)]
pub struct Registry {
    tables: Vec<Box<dyn MappedTable>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, replacing any earlier definition for the same row type.
    pub fn register<O: 'static>(&mut self, table: TableDef<O>) {
        let owner = TypeId::of::<O>();
        self.tables.retain(|t| t.owner() != owner);
        self.tables.push(Box::new(table));
    }

    /// Builder form of [`Registry::register`].
    #[must_use]
    pub fn with<O: 'static>(mut self, table: TableDef<O>) -> Self {
        self.register(table);
        self
    }

    /// Typed table definition for row type `O`.
    #[must_use]
    pub fn table<O: 'static>(&self) -> Option<&TableDef<O>> {
        self.table_of(TypeId::of::<O>())
            .and_then(|t| t.as_any().downcast_ref::<TableDef<O>>())
    }

    /// Table mapped to a row type.
    #[must_use]
    pub fn table_of(&self, owner: TypeId) -> Option<&dyn MappedTable> {
        self.tables
            .iter()
            .find(|t| t.owner() == owner)
            .map(|t| &**t)
    }

    /// Resolves a row type to its table, naming the type on failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedTable`] when no table is registered for it.
    pub fn resolve_table(&self, owner: TypeId, owner_name: &str) -> Result<&TableSchema> {
        self.table_of(owner)
            .map(MappedTable::schema)
            .ok_or_else(|| Error::UnmappedTable(owner_name.to_string()))
    }

    /// Resolves a field to exactly one table and its column.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnmappedField`] when the owner is not registered and
    /// with [`Error::UnknownField`] when its table has no such column.
    pub fn resolve(&self, key: &FieldKey) -> Result<(&TableSchema, &ColumnSchema)> {
        let table = self
            .table_of(key.owner())
            .ok_or_else(|| Error::UnmappedField {
                owner: key.owner_name().to_string(),
                field: key.name().to_string(),
            })?;
        let column = table.column(key).ok_or_else(|| Error::UnknownField {
            table: table.schema().name.clone(),
            field: key.name().to_string(),
        })?;
        Ok((table.schema(), column))
    }

    /// All registered table shapes, in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter().map(|t| t.schema())
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tables.iter().map(|t| &t.schema().name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::schema::table::ColumnDef;

    struct Account {
        id: i64,
    }

    struct Ghost;

    const ACCOUNT_ID: Field<Account, i64> = Field::direct("id", |a| &a.id, |a| &mut a.id);

    fn registry() -> Registry {
        Registry::new().with(TableDef::new("accounts").column(ColumnDef::new(ACCOUNT_ID)))
    }

    #[test]
    fn test_resolve_field() {
        let registry = registry();
        let (table, column) = registry.resolve(&ACCOUNT_ID.key()).unwrap();
        assert_eq!(table.name, "accounts");
        assert_eq!(column.name, "id");
    }

    #[test]
    fn test_resolve_unknown_owner_names_the_field() {
        let err = registry()
            .resolve(&FieldKey::of::<Ghost>("id"))
            .unwrap_err();
        assert!(matches!(err, Error::UnmappedField { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_resolve_unknown_column() {
        let err = registry()
            .resolve(&FieldKey::of::<Account>("email"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnknownField {
                table: String::from("accounts"),
                field: String::from("email"),
            }
        );
    }

    #[test]
    fn test_register_replaces_same_type() {
        let mut registry = registry();
        registry.register(TableDef::<Account>::new("accounts_v2").column(ColumnDef::new(ACCOUNT_ID)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.table::<Account>().unwrap().name(), "accounts_v2");
        assert!(registry.table::<Ghost>().is_none());
    }
}
