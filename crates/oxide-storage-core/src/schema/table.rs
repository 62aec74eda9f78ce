//! Typed table definitions binding a row type to its columns.

use std::fmt;

use crate::field::{ColumnAccess, Field, FieldKey};
use crate::schema::column::{ColumnSchema, DefaultValue, ForeignKeyAction, TableSchema};
use crate::types::ColumnType;
use crate::value::{FromSqlValue, SqlValue, ToSqlValue};

/// A column of row type `O`: its declared shape plus its accessor.
pub struct ColumnDef<O> {
    schema: ColumnSchema,
    access: Box<dyn ColumnAccess<O>>,
}

impl<O: 'static> ColumnDef<O> {
    /// Creates a column from a field accessor.
    ///
    /// The declared type and NOT NULL flag follow from the field's Rust type.
    #[must_use]
    pub fn new<T>(field: Field<O, T>) -> Self
    where
        T: ColumnType + Clone + ToSqlValue + FromSqlValue + 'static,
    {
        let mut schema = ColumnSchema::new(field.name(), T::data_type());
        schema.not_null = !T::NULLABLE;
        Self {
            schema,
            access: Box::new(field),
        }
    }
}

impl<O> ColumnDef<O> {
    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.schema = self.schema.primary_key();
        self
    }

    /// Marks the column AUTOINCREMENT.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.schema = self.schema.autoincrement();
        self
    }

    /// Marks the column UNIQUE.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.schema = self.schema.unique();
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.schema = self.schema.default_value(value);
        self
    }

    /// Adds a foreign key reference.
    #[must_use]
    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.schema = self.schema.references(table, column);
        self
    }

    /// Sets the ON DELETE action of the foreign key.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.schema = self.schema.on_delete(action);
        self
    }

    /// Makes this a generated column.
    #[must_use]
    pub fn generated(mut self, expr: &str, stored: bool) -> Self {
        self.schema = self.schema.generated(expr, stored);
        self
    }

    /// Declared shape.
    #[must_use]
    pub const fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Field identity.
    #[must_use]
    pub fn key(&self) -> FieldKey {
        self.access.key()
    }

    /// Type-erased accessor.
    #[must_use]
    pub fn access(&self) -> &dyn ColumnAccess<O> {
        self.access.as_ref()
    }
}

impl<O> fmt::Debug for ColumnDef<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Table definition for row type `O`.
pub struct TableDef<O> {
    schema: TableSchema,
    columns: Vec<ColumnDef<O>>,
}

impl<O> TableDef<O> {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            schema: TableSchema::new(name),
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDef<O>) -> Self {
        self.schema.columns.push(column.schema.clone());
        self.columns.push(column);
        self
    }

    /// Declares a composite primary key.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.schema.primary_key = columns.iter().map(ToString::to_string).collect();
        self
    }

    /// Adds a table-level UNIQUE constraint.
    #[must_use]
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.schema
            .unique
            .push(columns.iter().map(ToString::to_string).collect());
        self
    }

    /// Declares a WITHOUT ROWID table.
    #[must_use]
    pub const fn without_rowid(mut self) -> Self {
        self.schema.without_rowid = true;
        self
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Declared shape of the table.
    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef<O>] {
        &self.columns
    }

    /// Finds the column for a field.
    #[must_use]
    pub fn column_for(&self, key: &FieldKey) -> Option<&ColumnDef<O>> {
        self.columns.iter().find(|c| c.key() == *key)
    }

    /// Finds a column by name.
    #[must_use]
    pub fn column_named(&self, name: &str) -> Option<&ColumnDef<O>> {
        self.columns.iter().find(|c| c.schema.name == name)
    }

    /// Primary key columns.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&ColumnDef<O>> {
        self.schema
            .primary_key_columns()
            .into_iter()
            .filter_map(|name| self.column_named(name))
            .collect()
    }

    /// Columns written by INSERT: everything except generated columns and
    /// an INTEGER primary key aliasing the rowid, which the engine assigns.
    #[must_use]
    pub fn insertable_columns(&self) -> Vec<&ColumnDef<O>> {
        self.columns
            .iter()
            .filter(|c| c.schema.generated.is_none() && !self.schema.is_rowid_alias(&c.schema))
            .collect()
    }

    /// Columns written by REPLACE: everything except generated columns.
    #[must_use]
    pub fn writable_columns(&self) -> Vec<&ColumnDef<O>> {
        self.columns
            .iter()
            .filter(|c| c.schema.generated.is_none())
            .collect()
    }

    /// Reads the values of `columns` from `row`.
    #[must_use]
    pub fn values(columns: &[&ColumnDef<O>], row: &O) -> Vec<SqlValue> {
        columns.iter().map(|c| c.access.read(row)).collect()
    }
}

impl<O> fmt::Debug for TableDef<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDef")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[derive(Default)]
    struct Item {
        id: i64,
        label: Option<String>,
        total: f64,
    }

    fn table() -> TableDef<Item> {
        TableDef::new("items")
            .column(ColumnDef::new(Field::direct("id", |i: &Item| &i.id, |i| &mut i.id)).primary_key())
            .column(ColumnDef::new(Field::direct(
                "label",
                |i: &Item| &i.label,
                |i| &mut i.label,
            )))
            .column(
                ColumnDef::new(Field::direct("total", |i: &Item| &i.total, |i| &mut i.total))
                    .generated("id * 2", false),
            )
    }

    #[test]
    fn test_column_shape_follows_rust_type() {
        let t = table();
        let id = &t.schema().columns[0];
        assert_eq!(id.data_type, DataType::Integer);
        assert!(id.not_null);
        assert!(id.primary_key);
        let label = &t.schema().columns[1];
        assert_eq!(label.data_type, DataType::Text);
        assert!(!label.not_null);
    }

    #[test]
    fn test_insertable_columns_skip_rowid_and_generated() {
        let t = table();
        let names: Vec<&str> = t
            .insertable_columns()
            .iter()
            .map(|c| c.schema().name.as_str())
            .collect();
        assert_eq!(names, ["label"]);
        let writable: Vec<&str> = t
            .writable_columns()
            .iter()
            .map(|c| c.schema().name.as_str())
            .collect();
        assert_eq!(writable, ["id", "label"]);
    }

    #[test]
    fn test_values_reads_row() {
        let t = table();
        let row = Item {
            id: 4,
            label: None,
            total: 0.0,
        };
        let values = TableDef::values(&t.writable_columns(), &row);
        assert_eq!(values, vec![SqlValue::Int(4), SqlValue::Null]);
        assert_eq!(t.primary_key_columns().len(), 1);
    }
}
