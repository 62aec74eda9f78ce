//! Statement nodes and their builders.
//!
//! Builders may be called in any order; clause order is fixed when the
//! statement is serialized.

use std::any::{type_name, TypeId};

use crate::ast::expression::{Expr, OrderBy};
use crate::field::{Field, FieldKey};

/// Compound select operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    /// UNION.
    Union,
    /// UNION ALL.
    UnionAll,
    /// INTERSECT.
    Intersect,
    /// EXCEPT.
    Except,
}

impl CompoundOp {
    /// Returns the SQL keyword(s).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        }
    }
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// INNER JOIN.
    Inner,
    /// LEFT JOIN.
    Left,
    /// CROSS JOIN.
    Cross,
}

impl JoinKind {
    /// Returns the SQL keyword(s).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// A mapped row type used as a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTarget {
    /// Row type.
    pub owner: TypeId,
    /// Rust name of the row type.
    pub owner_name: &'static str,
}

impl TableTarget {
    /// Target for row type `O`.
    #[must_use]
    pub fn of<O: 'static>() -> Self {
        Self {
            owner: TypeId::of::<O>(),
            owner_name: type_name::<O>(),
        }
    }
}

/// A table source in FROM or JOIN.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A mapped table, optionally aliased.
    Mapped {
        /// Row type.
        target: TableTarget,
        /// Alias.
        alias: Option<String>,
    },
    /// A common table expression declared by an enclosing WITH.
    Cte {
        /// CTE name.
        name: String,
        /// Alias.
        alias: Option<String>,
    },
    /// A derived table.
    Subquery {
        /// Inner query.
        query: Box<Select>,
        /// Alias (required by the engine to reference its columns).
        alias: String,
    },
}

impl TableRef {
    /// Mapped table for row type `O`.
    #[must_use]
    pub fn mapped<O: 'static>() -> Self {
        Self::Mapped {
            target: TableTarget::of::<O>(),
            alias: None,
        }
    }

    /// Mapped table for row type `O` under `alias`.
    #[must_use]
    pub fn mapped_as<O: 'static>(alias: &str) -> Self {
        Self::Mapped {
            target: TableTarget::of::<O>(),
            alias: Some(alias.to_string()),
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join type.
    pub kind: JoinKind,
    /// Joined table.
    pub table: TableRef,
    /// ON condition (absent for CROSS JOIN).
    pub on: Option<Expr>,
}

/// A common table expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    /// Name.
    pub name: String,
    /// Explicit column names.
    pub columns: Vec<String>,
    /// Defining query.
    pub query: Select,
}

impl Cte {
    /// Creates a CTE without an explicit column list.
    #[must_use]
    pub fn new(name: &str, query: Select) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            query,
        }
    }

    /// Creates a CTE with an explicit column list.
    #[must_use]
    pub fn with_columns(name: &str, columns: &[&str], query: Select) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(ToString::to_string).collect(),
            query,
        }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// WITH clause.
    pub ctes: Vec<Cte>,
    /// WITH RECURSIVE.
    pub recursive: bool,
    /// SELECT DISTINCT.
    pub distinct: bool,
    /// Projection.
    pub columns: Vec<Expr>,
    /// FROM tables; inferred from the projection's columns when empty.
    pub from: Vec<TableRef>,
    /// JOIN clauses.
    pub joins: Vec<Join>,
    /// WHERE clause.
    pub where_clause: Option<Expr>,
    /// GROUP BY terms.
    pub group_by: Vec<Expr>,
    /// HAVING clause.
    pub having: Option<Expr>,
    /// Compound members, applied left to right.
    pub compound: Vec<(CompoundOp, Select)>,
    /// ORDER BY terms.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<Expr>,
    /// OFFSET.
    pub offset: Option<Expr>,
}

impl Select {
    /// Creates an empty SELECT.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a common table expression.
    #[must_use]
    pub fn with(mut self, cte: Cte) -> Self {
        self.ctes.push(cte);
        self
    }

    /// Marks the WITH clause RECURSIVE.
    #[must_use]
    pub const fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// SELECT DISTINCT.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Adds one projection term.
    #[must_use]
    pub fn column(mut self, expr: impl Into<Expr>) -> Self {
        self.columns.push(expr.into());
        self
    }

    /// Adds projection terms.
    #[must_use]
    pub fn columns<I, E>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.columns.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Adds a mapped table to FROM.
    #[must_use]
    pub fn from<O: 'static>(mut self) -> Self {
        self.from.push(TableRef::mapped::<O>());
        self
    }

    /// Adds an aliased mapped table to FROM.
    #[must_use]
    pub fn from_as<O: 'static>(mut self, alias: &str) -> Self {
        self.from.push(TableRef::mapped_as::<O>(alias));
        self
    }

    /// Adds a CTE to FROM.
    #[must_use]
    pub fn from_cte(mut self, name: &str) -> Self {
        self.from.push(TableRef::Cte {
            name: name.to_string(),
            alias: None,
        });
        self
    }

    /// Adds a derived table to FROM.
    #[must_use]
    pub fn from_subquery(mut self, query: Self, alias: &str) -> Self {
        self.from.push(TableRef::Subquery {
            query: Box::new(query),
            alias: alias.to_string(),
        });
        self
    }

    /// Adds a JOIN of any kind.
    #[must_use]
    pub fn join_table(mut self, kind: JoinKind, table: TableRef, on: Option<Expr>) -> Self {
        self.joins.push(Join { kind, table, on });
        self
    }

    /// INNER JOIN of row type `O`.
    #[must_use]
    pub fn join<O: 'static>(self, on: impl Into<Expr>) -> Self {
        self.join_table(JoinKind::Inner, TableRef::mapped::<O>(), Some(on.into()))
    }

    /// INNER JOIN of row type `O` under `alias`.
    #[must_use]
    pub fn join_as<O: 'static>(self, alias: &str, on: impl Into<Expr>) -> Self {
        self.join_table(JoinKind::Inner, TableRef::mapped_as::<O>(alias), Some(on.into()))
    }

    /// LEFT JOIN of row type `O`.
    #[must_use]
    pub fn left_join<O: 'static>(self, on: impl Into<Expr>) -> Self {
        self.join_table(JoinKind::Left, TableRef::mapped::<O>(), Some(on.into()))
    }

    /// CROSS JOIN of row type `O`.
    #[must_use]
    pub fn cross_join<O: 'static>(self) -> Self {
        self.join_table(JoinKind::Cross, TableRef::mapped::<O>(), None)
    }

    /// Adds a WHERE condition, AND-ed with any existing one.
    #[must_use]
    pub fn where_clause(mut self, condition: impl Into<Expr>) -> Self {
        self.where_clause = Some(and_with(self.where_clause.take(), condition.into()));
        self
    }

    /// Adds a GROUP BY term.
    #[must_use]
    pub fn group_by(mut self, expr: impl Into<Expr>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    /// Adds a HAVING condition, AND-ed with any existing one.
    #[must_use]
    pub fn having(mut self, condition: impl Into<Expr>) -> Self {
        self.having = Some(and_with(self.having.take(), condition.into()));
        self
    }

    fn compound_with(mut self, op: CompoundOp, other: Self) -> Self {
        self.compound.push((op, other));
        self
    }

    /// `self UNION other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.compound_with(CompoundOp::Union, other)
    }

    /// `self UNION ALL other`.
    #[must_use]
    pub fn union_all(self, other: Self) -> Self {
        self.compound_with(CompoundOp::UnionAll, other)
    }

    /// `self INTERSECT other`.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        self.compound_with(CompoundOp::Intersect, other)
    }

    /// `self EXCEPT other`.
    #[must_use]
    pub fn except(self, other: Self) -> Self {
        self.compound_with(CompoundOp::Except, other)
    }

    /// Adds an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, term: impl Into<OrderBy>) -> Self {
        self.order_by.push(term.into());
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub fn limit(mut self, limit: impl Into<Expr>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub fn offset(mut self, offset: impl Into<Expr>) -> Self {
        self.offset = Some(offset.into());
        self
    }
}

fn and_with(existing: Option<Expr>, condition: Expr) -> Expr {
    match existing {
        Some(prev) => prev.and(condition),
        None => condition,
    }
}

/// Conflict resolution of `INSERT OR ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// OR ABORT.
    Abort,
    /// OR FAIL.
    Fail,
    /// OR IGNORE.
    Ignore,
    /// OR REPLACE.
    Replace,
    /// OR ROLLBACK.
    Rollback,
}

impl Conflict {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
            Self::Fail => "FAIL",
            Self::Ignore => "IGNORE",
            Self::Replace => "REPLACE",
            Self::Rollback => "ROLLBACK",
        }
    }
}

/// Leading verb of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertVerb {
    /// INSERT.
    Insert,
    /// REPLACE.
    Replace,
    /// INSERT OR ...
    InsertOr(Conflict),
}

/// Row source of an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// VALUES rows.
    Values(Vec<Vec<Expr>>),
    /// INSERT ... SELECT.
    Select(Box<Select>),
    /// DEFAULT VALUES.
    DefaultValues,
}

/// An INSERT or REPLACE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// Verb.
    pub verb: InsertVerb,
    /// Target table.
    pub table: TableTarget,
    /// Column list.
    pub columns: Vec<FieldKey>,
    /// Row source.
    pub source: InsertSource,
}

impl Insert {
    /// `INSERT INTO` the table mapped to `O`.
    #[must_use]
    pub fn into_table<O: 'static>() -> Self {
        Self {
            verb: InsertVerb::Insert,
            table: TableTarget::of::<O>(),
            columns: Vec::new(),
            source: InsertSource::Values(Vec::new()),
        }
    }

    /// `REPLACE INTO` the table mapped to `O`.
    #[must_use]
    pub fn replace<O: 'static>() -> Self {
        Self {
            verb: InsertVerb::Replace,
            ..Self::into_table::<O>()
        }
    }

    /// Switches to `INSERT OR <conflict>`.
    #[must_use]
    pub const fn or(mut self, conflict: Conflict) -> Self {
        self.verb = InsertVerb::InsertOr(conflict);
        self
    }

    /// Adds a target column.
    #[must_use]
    pub fn column<O: 'static, T>(mut self, field: Field<O, T>) -> Self {
        self.columns.push(field.key());
        self
    }

    /// Adds target columns by key.
    #[must_use]
    pub fn column_keys(mut self, keys: impl IntoIterator<Item = FieldKey>) -> Self {
        self.columns.extend(keys);
        self
    }

    /// Appends a VALUES row.
    #[must_use]
    pub fn values<I, E>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        let row: Vec<Expr> = row.into_iter().map(Into::into).collect();
        match &mut self.source {
            InsertSource::Values(rows) => rows.push(row),
            other => *other = InsertSource::Values(vec![row]),
        }
        self
    }

    /// Uses a SELECT as the row source.
    #[must_use]
    pub fn select(mut self, query: Select) -> Self {
        self.source = InsertSource::Select(Box::new(query));
        self
    }

    /// Inserts a single row of defaults.
    #[must_use]
    pub fn default_values(mut self) -> Self {
        self.source = InsertSource::DefaultValues;
        self
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Target table.
    pub table: TableTarget,
    /// Assignments.
    pub set: Vec<(FieldKey, Expr)>,
    /// WHERE clause.
    pub where_clause: Option<Expr>,
}

impl Update {
    /// `UPDATE` the table mapped to `O`.
    #[must_use]
    pub fn table<O: 'static>() -> Self {
        Self {
            table: TableTarget::of::<O>(),
            set: Vec::new(),
            where_clause: None,
        }
    }

    /// `SET field = value`, type-checked against the field.
    #[must_use]
    pub fn set<O: 'static, T>(
        mut self,
        field: Field<O, T>,
        value: impl crate::ast::typed::Operand<T>,
    ) -> Self {
        self.set.push((field.key(), value.into_expr()));
        self
    }

    /// `SET column = expr` by key.
    #[must_use]
    pub fn set_key(mut self, key: FieldKey, value: impl Into<Expr>) -> Self {
        self.set.push((key, value.into()));
        self
    }

    /// Adds a WHERE condition, AND-ed with any existing one.
    #[must_use]
    pub fn where_clause(mut self, condition: impl Into<Expr>) -> Self {
        self.where_clause = Some(and_with(self.where_clause.take(), condition.into()));
        self
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// Target table.
    pub table: TableTarget,
    /// WHERE clause.
    pub where_clause: Option<Expr>,
}

impl Delete {
    /// `DELETE FROM` the table mapped to `O`.
    #[must_use]
    pub fn from_table<O: 'static>() -> Self {
        Self {
            table: TableTarget::of::<O>(),
            where_clause: None,
        }
    }

    /// Adds a WHERE condition, AND-ed with any existing one.
    #[must_use]
    pub fn where_clause(mut self, condition: impl Into<Expr>) -> Self {
        self.where_clause = Some(and_with(self.where_clause.take(), condition.into()));
        self
    }
}

/// Any statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// SELECT.
    Select(Select),
    /// INSERT / REPLACE.
    Insert(Insert),
    /// UPDATE.
    Update(Update),
    /// DELETE.
    Delete(Delete),
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Self::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(s: Insert) -> Self {
        Self::Insert(s)
    }
}

impl From<Update> for Statement {
    fn from(s: Update) -> Self {
        Self::Update(s)
    }
}

impl From<Delete> for Statement {
    fn from(s: Delete) -> Self {
        Self::Delete(s)
    }
}
