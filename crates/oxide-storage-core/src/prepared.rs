//! Prepared statements and bind tuples.
//!
//! A [`PreparedStatement`] is serialized once with placeholders. Its bind
//! tuple can then be replaced any number of times without touching the SQL
//! text, as long as the number of values and their storage classes stay the
//! same as at prepare time.

use crate::ast::{Expr, Insert};
use crate::error::{Error, Result};
use crate::schema::{ColumnDef, Registry, TableDef};
use crate::serializer::{serialize, Context, ToSql};
use crate::traverse::{bind_values, Traverse};
use crate::value::{SqlValue, ToSqlValue, ValueKind};

/// SQL text with placeholders plus its current bind tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    sql: String,
    binds: Vec<SqlValue>,
    kinds: Vec<ValueKind>,
}

impl PreparedStatement {
    /// Serializes `statement` with placeholders and captures its bind tuple.
    ///
    /// # Errors
    ///
    /// Returns any serialization error.
    pub fn prepare<S>(statement: &S, registry: &Registry) -> Result<Self>
    where
        S: ToSql + Traverse + ?Sized,
    {
        let sql = serialize(statement, &Context::new(registry).placeholders(true))?;
        let binds = bind_values(statement);
        let kinds = binds.iter().map(SqlValue::kind).collect();
        Ok(Self { sql, binds, kinds })
    }

    /// SQL text with `?` placeholders.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Current bind tuple, in placeholder order.
    #[must_use]
    pub fn binds(&self) -> &[SqlValue] {
        &self.binds
    }

    /// Number of placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns whether the statement has no placeholders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Replaces the whole bind tuple.
    ///
    /// # Errors
    ///
    /// [`Error::BindCount`] if the number of values differs from the prepared
    /// one, [`Error::BindType`] if a value's storage class differs. The tuple
    /// is left untouched on error.
    pub fn rebind(&mut self, values: Vec<SqlValue>) -> Result<()> {
        if values.len() != self.kinds.len() {
            return Err(Error::BindCount {
                expected: self.kinds.len(),
                actual: values.len(),
            });
        }
        for (index, (value, expected)) in values.iter().zip(&self.kinds).enumerate() {
            check_kind(index, *expected, value)?;
        }
        self.binds = values;
        Ok(())
    }

    /// Replaces the value at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::BindIndex`] for an out-of-range index, [`Error::BindType`] for
    /// a storage class mismatch.
    pub fn set(&mut self, index: usize, value: impl ToSqlValue) -> Result<()> {
        let value = value.to_sql_value();
        let expected = *self.kinds.get(index).ok_or(Error::BindIndex {
            index,
            len: self.kinds.len(),
        })?;
        check_kind(index, expected, &value)?;
        self.binds[index] = value;
        Ok(())
    }
}

fn check_kind(index: usize, expected: ValueKind, value: &SqlValue) -> Result<()> {
    if expected.accepts(value.kind()) {
        Ok(())
    } else {
        Err(Error::BindType {
            index,
            expected,
            actual: value.kind(),
        })
    }
}

/// Bulk INSERT or REPLACE over a range of rows.
///
/// The column set is fixed when the range is created; only the rows can be
/// rebound.
pub struct PreparedRange<'t, O> {
    replace: bool,
    columns: Vec<&'t ColumnDef<O>>,
    rows: Vec<Vec<SqlValue>>,
}

impl<'t, O: 'static> PreparedRange<'t, O> {
    /// `INSERT` of every insertable column.
    #[must_use]
    pub fn insert(table: &'t TableDef<O>) -> Self {
        Self {
            replace: false,
            columns: table.insertable_columns(),
            rows: Vec::new(),
        }
    }

    /// `REPLACE` of every writable column, primary key included.
    #[must_use]
    pub fn replace(table: &'t TableDef<O>) -> Self {
        Self {
            replace: true,
            columns: table.writable_columns(),
            rows: Vec::new(),
        }
    }

    /// Rebinds the range to `rows`.
    pub fn bind<'a, I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = &'a O>,
        O: 'a,
    {
        self.rows = rows
            .into_iter()
            .map(|row| TableDef::values(&self.columns, row))
            .collect();
    }

    /// Number of bound rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether no rows are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Statement for the bound rows.
    #[must_use]
    pub fn statement(&self) -> Insert {
        let insert = if self.replace {
            Insert::replace::<O>()
        } else {
            Insert::into_table::<O>()
        };
        self.rows
            .iter()
            .fold(
                insert.column_keys(self.columns.iter().map(|c| c.key())),
                |insert, row| insert.values(row.iter().cloned().map(Expr::Literal)),
            )
    }

    /// Prepares the statement for the bound rows; `None` when the range is empty.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidStatement`] when the table has no writable column, or
    /// any serialization error.
    pub fn prepare(&self, registry: &Registry) -> Result<Option<PreparedStatement>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        if self.columns.is_empty() {
            return Err(Error::InvalidStatement(String::from(
                "bulk insert without writable columns",
            )));
        }
        PreparedStatement::prepare(&self.statement(), registry).map(Some)
    }
}

impl<O> std::fmt::Debug for PreparedRange<'_, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedRange")
            .field("replace", &self.replace)
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Select;
    use crate::field::Field;

    struct Note {
        id: i64,
        body: String,
        rank: Option<f64>,
    }

    const ID: Field<Note, i64> = Field::direct("id", |n| &n.id, |n| &mut n.id);
    const BODY: Field<Note, String> = Field::direct("body", |n| &n.body, |n| &mut n.body);
    const RANK: Field<Note, Option<f64>> = Field::direct("rank", |n| &n.rank, |n| &mut n.rank);

    fn table() -> TableDef<Note> {
        TableDef::new("notes")
            .column(ColumnDef::new(ID).primary_key())
            .column(ColumnDef::new(BODY))
            .column(ColumnDef::new(RANK))
    }

    fn note(id: i64, body: &str) -> Note {
        Note {
            id,
            body: body.to_string(),
            rank: None,
        }
    }

    #[test]
    fn test_prepare_captures_binds_in_placeholder_order() {
        let registry = Registry::new().with(table());
        let query = Select::new()
            .column(BODY)
            .where_clause(ID.between(3, 9))
            .limit(2);
        let stmt = PreparedStatement::prepare(&query, &registry).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT body FROM \"notes\" WHERE id BETWEEN ? AND ? LIMIT ?"
        );
        assert_eq!(
            stmt.binds(),
            &[SqlValue::Int(3), SqlValue::Int(9), SqlValue::Int(2)]
        );
    }

    #[test]
    fn test_rebind_checks_count_and_kind() {
        let registry = Registry::new().with(table());
        let query = Select::new().column(BODY).where_clause(ID.eq(1));
        let mut stmt = PreparedStatement::prepare(&query, &registry).unwrap();

        assert_eq!(
            stmt.rebind(vec![SqlValue::Int(1), SqlValue::Int(2)]),
            Err(Error::BindCount {
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(
            stmt.rebind(vec![SqlValue::Text(String::from("1"))]),
            Err(Error::BindType {
                index: 0,
                expected: ValueKind::Integer,
                actual: ValueKind::Text,
            })
        );
        assert_eq!(stmt.binds(), &[SqlValue::Int(1)]);

        stmt.rebind(vec![SqlValue::Int(42)]).unwrap();
        assert_eq!(stmt.binds(), &[SqlValue::Int(42)]);
        stmt.rebind(vec![SqlValue::Null]).unwrap();
        assert_eq!(stmt.sql(), "SELECT body FROM \"notes\" WHERE (id = ?)");
    }

    #[test]
    fn test_set_single_value() {
        let registry = Registry::new().with(table());
        let query = Select::new().column(BODY).where_clause(ID.eq(1));
        let mut stmt = PreparedStatement::prepare(&query, &registry).unwrap();
        stmt.set(0, 7_i64).unwrap();
        assert_eq!(stmt.binds(), &[SqlValue::Int(7)]);
        assert_eq!(
            stmt.set(3, 7_i64),
            Err(Error::BindIndex { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_range_columns_fixed_rows_rebound() {
        let def = table();
        let registry = Registry::new().with(table());
        let mut range = PreparedRange::insert(&def);
        assert!(range.prepare(&registry).unwrap().is_none());

        let first = [note(1, "a"), note(2, "b")];
        range.bind(&first);
        let stmt = range.prepare(&registry).unwrap().unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO \"notes\" (body, rank) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(stmt.len(), 4);

        range.bind(&[note(3, "c")]);
        let stmt = range.prepare(&registry).unwrap().unwrap();
        assert_eq!(stmt.sql(), "INSERT INTO \"notes\" (body, rank) VALUES (?, ?)");
        assert_eq!(
            stmt.binds(),
            &[SqlValue::Text(String::from("c")), SqlValue::Null]
        );
    }

    #[test]
    fn test_replace_range_includes_primary_key() {
        let def = table();
        let registry = Registry::new().with(table());
        let mut range = PreparedRange::replace(&def);
        range.bind(&[note(5, "e")]);
        let stmt = range.prepare(&registry).unwrap().unwrap();
        assert_eq!(
            stmt.sql(),
            "REPLACE INTO \"notes\" (id, body, rank) VALUES (?, ?, ?)"
        );
    }
}
