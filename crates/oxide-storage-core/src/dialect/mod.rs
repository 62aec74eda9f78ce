//! SQL dialect support.
//!
//! The dialect decides identifier quoting, renders schema DDL and reports
//! which in-place schema changes the target engine can perform. The
//! synchronization planner consults it to choose between `ALTER TABLE` and a
//! table rebuild.

mod generic;

pub use generic::GenericDialect;

use crate::schema::{ColumnSchema, TableSchema};

/// Trait for SQL dialect-specific behavior.
pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        quote_with(self.identifier_quote(), name)
    }

    /// Returns whether `ALTER TABLE ... ADD COLUMN` is available.
    fn supports_add_column(&self) -> bool {
        true
    }

    /// Returns whether `ALTER TABLE ... DROP COLUMN` is available.
    fn supports_drop_column(&self) -> bool;

    /// Generates SQL for CREATE TABLE.
    fn create_table(&self, table: &TableSchema) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        if !table.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(&table.primary_key)));
        }
        for unique in &table.unique {
            parts.push(format!("UNIQUE ({})", self.column_list(unique)));
        }
        let mut sql = format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        );
        if table.without_rowid {
            sql.push_str(" WITHOUT ROWID");
        }
        sql
    }

    /// Generates SQL for a column definition.
    fn column_definition(&self, column: &ColumnSchema) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            column.data_type.as_sql()
        );
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
            if column.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        if let Some(fk) = &column.references {
            sql.push_str(&format!(
                " REFERENCES {}({})",
                self.quote_identifier(&fk.table),
                self.quote_identifier(&fk.column)
            ));
            if fk.on_delete != crate::schema::ForeignKeyAction::NoAction {
                sql.push_str(" ON DELETE ");
                sql.push_str(fk.on_delete.as_sql());
            }
            if fk.on_update != crate::schema::ForeignKeyAction::NoAction {
                sql.push_str(" ON UPDATE ");
                sql.push_str(fk.on_update.as_sql());
            }
        }
        if let Some(generated) = &column.generated {
            sql.push_str(&format!(
                " GENERATED ALWAYS AS ({}) {}",
                generated.expr,
                if generated.stored { "STORED" } else { "VIRTUAL" }
            ));
        }
        sql
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Generates SQL for ADD COLUMN.
    fn add_column(&self, table: &str, column: &ColumnSchema) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL copying `columns` of `source` into a new table `target`.
    fn create_table_as(&self, target: &str, source: &str, columns: &[String]) -> String {
        format!(
            "CREATE TABLE {} AS SELECT {} FROM {}",
            self.quote_identifier(target),
            self.column_list(columns),
            self.quote_identifier(source)
        )
    }

    /// Generates SQL copying `columns` from `source` into existing `target`.
    fn insert_select(&self, target: &str, source: &str, columns: &[String]) -> String {
        let list = self.column_list(columns);
        format!(
            "INSERT INTO {} ({list}) SELECT {list} FROM {}",
            self.quote_identifier(target),
            self.quote_identifier(source)
        )
    }

    /// Quotes and joins column names.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Quotes `name` with `quote`, doubling any embedded quote character.
#[must_use]
pub fn quote_with(quote: char, name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}
