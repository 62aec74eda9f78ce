//! Serializable schema descriptions.
//!
//! These are the plain-data shapes shared by declared table definitions, the
//! DDL renderer, the synchronization planner and schema files.

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Integer default (booleans are stored as 0/1).
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    Text(String),
    /// SQL expression (e.g. `CURRENT_TIMESTAMP` or `1 + 2`).
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL used after the `DEFAULT` keyword.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => {
                if is_keyword_default(expr) {
                    expr.clone()
                } else {
                    format!("({expr})")
                }
            }
        }
    }

    /// Returns whether the default is a constant the engine accepts on `ADD COLUMN`.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        !matches!(self, Self::Expression(_))
    }

    /// Returns whether this default is a non-NULL value.
    #[must_use]
    pub const fn is_non_null(&self) -> bool {
        !matches!(self, Self::Null)
    }
}

fn is_keyword_default(expr: &str) -> bool {
    matches!(
        expr.trim().to_ascii_uppercase().as_str(),
        "CURRENT_TIME" | "CURRENT_DATE" | "CURRENT_TIMESTAMP"
    )
}

/// Normalizes a default clause for comparison with the catalog's text.
///
/// The catalog reports `DEFAULT (1 + 2)` as `1 + 2`, so one level of
/// enclosing parentheses is dropped on both sides.
#[must_use]
pub fn normalize_default(sql: &str) -> String {
    let mut s = sql.trim();
    while s.starts_with('(') && s.ends_with(')') && encloses(s) {
        s = s[1..s.len() - 1].trim();
    }
    s.to_string()
}

// Whether the first '(' is closed by the final ')'.
fn encloses(s: &str) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != s.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as `NoAction` but checked immediately).
    Restrict,
    /// Cascade the change.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Foreign key reference of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

/// Generated column expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generated {
    /// SQL expression computing the value.
    pub expr: String,
    /// `STORED` when true, `VIRTUAL` otherwise.
    #[serde(default)]
    pub stored: bool,
}

/// Declared shape of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// NOT NULL constraint.
    #[serde(default)]
    pub not_null: bool,
    /// Inline PRIMARY KEY.
    #[serde(default)]
    pub primary_key: bool,
    /// AUTOINCREMENT (only meaningful on an INTEGER primary key).
    #[serde(default)]
    pub autoincrement: bool,
    /// Inline UNIQUE.
    #[serde(default)]
    pub unique: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Foreign key reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKey>,
    /// Generated column expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
}

impl ColumnSchema {
    /// Creates a nullable column with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            primary_key: false,
            autoincrement: false,
            unique: false,
            default: None,
            references: None,
            generated: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column AUTOINCREMENT.
    #[must_use]
    pub const fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Marks the column UNIQUE.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Adds a foreign key reference.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        self
    }

    /// Sets the ON DELETE action of the foreign key, if any.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_delete = action;
        }
        self
    }

    /// Sets the ON UPDATE action of the foreign key, if any.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        if let Some(fk) = self.references.as_mut() {
            fk.on_update = action;
        }
        self
    }

    /// Makes this a generated column.
    #[must_use]
    pub fn generated(mut self, expr: impl Into<String>, stored: bool) -> Self {
        self.generated = Some(Generated {
            expr: expr.into(),
            stored,
        });
        self
    }

    /// Returns whether `ALTER TABLE ... ADD COLUMN` can create this column
    /// on a table that already holds rows.
    ///
    /// The engine rejects PRIMARY KEY, UNIQUE and STORED generated columns,
    /// non-constant defaults, NOT NULL without a non-NULL default, and a
    /// foreign key whose default is not NULL.
    #[must_use]
    pub fn is_addable(&self) -> bool {
        if self.primary_key || self.unique {
            return false;
        }
        if self.generated.as_ref().is_some_and(|g| g.stored) {
            return false;
        }
        if let Some(default) = &self.default {
            if !default.is_constant() {
                return false;
            }
            if self.references.is_some() && default.is_non_null() {
                return false;
            }
        }
        if self.generated.is_some() {
            return true;
        }
        !self.not_null || self.default.as_ref().is_some_and(DefaultValue::is_non_null)
    }
}

/// Declared shape of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSchema>,
    /// Composite primary key (table-level constraint).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Table-level UNIQUE constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<Vec<String>>,
    /// WITHOUT ROWID table.
    #[serde(default)]
    pub without_rowid: bool,
}

impl TableSchema {
    /// Creates an empty table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            without_rowid: false,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    /// Looks a column up by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns whether `name` participates in the primary key.
    #[must_use]
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == name)
            || self.get_column(name).is_some_and(|c| c.primary_key)
    }

    /// Primary key column names, composite key first, then inline ones.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&str> {
        if self.primary_key.is_empty() {
            self.columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.name.as_str())
                .collect()
        } else {
            self.primary_key.iter().map(String::as_str).collect()
        }
    }

    /// Returns whether the column is an alias of the rowid: the single
    /// INTEGER primary key of a rowid table.
    #[must_use]
    pub fn is_rowid_alias(&self, column: &ColumnSchema) -> bool {
        !self.without_rowid
            && column.data_type == DataType::Integer
            && self.primary_key_columns() == [column.name.as_str()]
    }
}

/// One column as reported by the database catalog.
///
/// Shape of `pragma_table_xinfo`, plus whether other schema objects depend
/// on the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Column position.
    pub cid: i64,
    /// Column name.
    pub name: String,
    /// Declared type text (may be empty).
    pub data_type: String,
    /// NOT NULL flag.
    pub not_null: bool,
    /// Default clause text.
    pub default_value: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it.
    pub pk: i64,
    /// 0 for ordinary columns, 2 for virtual and 3 for stored generated columns.
    #[serde(default)]
    pub hidden: i64,
    /// The column is covered by an index or a UNIQUE constraint, belongs to
    /// a foreign key, or is named by a CHECK constraint, generated column,
    /// trigger or view. SQLite refuses to drop such a column in place.
    #[serde(default)]
    pub constrained: bool,
}

impl TableInfo {
    /// Returns whether this is a generated column.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.hidden == 2 || self.hidden == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_to_sql() {
        assert_eq!(DefaultValue::Integer(0).to_sql(), "0");
        assert_eq!(DefaultValue::Text(String::from("it's")).to_sql(), "'it''s'");
        assert_eq!(
            DefaultValue::Expression(String::from("CURRENT_TIMESTAMP")).to_sql(),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            DefaultValue::Expression(String::from("1 + 2")).to_sql(),
            "(1 + 2)"
        );
    }

    #[test]
    fn test_normalize_default() {
        assert_eq!(normalize_default("(1 + 2)"), "1 + 2");
        assert_eq!(normalize_default(" 'x' "), "'x'");
        assert_eq!(normalize_default("(1) + (2)"), "(1) + (2)");
        assert_eq!(normalize_default("((0))"), "0");
    }

    #[test]
    fn test_is_addable() {
        let nullable = ColumnSchema::new("a", DataType::Text);
        assert!(nullable.is_addable());

        let required = ColumnSchema::new("b", DataType::Text).not_null();
        assert!(!required.is_addable());

        let defaulted = ColumnSchema::new("c", DataType::Integer)
            .not_null()
            .default_value(DefaultValue::Integer(0));
        assert!(defaulted.is_addable());

        let null_default = ColumnSchema::new("d", DataType::Integer)
            .not_null()
            .default_value(DefaultValue::Null);
        assert!(!null_default.is_addable());

        let unique = ColumnSchema::new("e", DataType::Text).unique();
        assert!(!unique.is_addable());

        let stored = ColumnSchema::new("f", DataType::Integer).generated("a + 1", true);
        assert!(!stored.is_addable());

        let virtual_col = ColumnSchema::new("g", DataType::Integer).generated("a + 1", false);
        assert!(virtual_col.is_addable());

        let expr_default = ColumnSchema::new("h", DataType::Text)
            .default_value(DefaultValue::Expression(String::from("CURRENT_TIMESTAMP")));
        assert!(!expr_default.is_addable());
    }

    #[test]
    fn test_primary_key_columns() {
        let table = TableSchema::new("pairs")
            .column(ColumnSchema::new("a", DataType::Integer))
            .column(ColumnSchema::new("b", DataType::Integer));
        let mut composite = table.clone();
        composite.primary_key = vec![String::from("a"), String::from("b")];
        assert!(table.primary_key_columns().is_empty());
        assert_eq!(composite.primary_key_columns(), ["a", "b"]);
        assert!(composite.is_primary_key("b"));
        assert!(!composite.is_rowid_alias(&composite.columns[0]));
    }

    #[test]
    fn test_table_schema_from_json() {
        let json = r#"{
            "name": "users",
            "columns": [
                {"name": "id", "data_type": "INTEGER", "primary_key": true, "not_null": true},
                {"name": "name", "data_type": "TEXT", "default": {"text": "anon"}}
            ]
        }"#;
        let table: TableSchema = serde_json::from_str(json).unwrap();
        assert_eq!(table.name, "users");
        assert!(table.is_rowid_alias(&table.columns[0]));
        assert_eq!(
            table.columns[1].default,
            Some(DefaultValue::Text(String::from("anon")))
        );
        assert!(!table.without_rowid);
    }
}
