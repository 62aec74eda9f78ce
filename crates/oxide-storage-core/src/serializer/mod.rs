//! SQL serialization.
//!
//! [`serialize`] renders a node under a [`Context`]: the registry used to
//! resolve fields to tables, plus three formatting flags.
//!
//! - `parenthesize` (default on) wraps every binary expression in
//!   parentheses; when off, only the parentheses precedence requires are
//!   emitted.
//! - `qualify` (default off) renders columns as `"table"."column"`. A select
//!   reading from more than one table qualifies its columns regardless.
//! - `placeholders` (default off) renders every literal as `?`, in the order
//!   [`Traverse`](crate::traverse::Traverse) yields them.
//!
//! Table names are always quoted. Column names and aliases are emitted bare
//! when they are plain identifiers and quoted otherwise; qualified names are
//! always quoted. Quotes inside identifiers are doubled.
//!
//! Statements are rendered in fixed clause order. Names introduced by a
//! statement (CTEs, table aliases, projection aliases) are collected into a
//! scope frame before its body is written, so back-references resolve
//! regardless of where they appear.

mod expr;
mod keywords;
mod statement;

use std::any::TypeId;

use crate::dialect::quote_with;
use crate::error::{Error, Result};
use crate::schema::Registry;
use crate::value::SqlValue;

pub use keywords::{is_bare_identifier, is_keyword};

/// Formatting context for one serialization call.
#[derive(Debug, Clone, Copy)]
pub struct Context<'r> {
    registry: &'r Registry,
    parenthesize: bool,
    qualify: bool,
    placeholders: bool,
}

impl<'r> Context<'r> {
    /// Context with default flags: parenthesized, unqualified, inline literals.
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            parenthesize: true,
            qualify: false,
            placeholders: false,
        }
    }

    /// Sets whether every binary expression is wrapped in parentheses.
    #[must_use]
    pub const fn parenthesize(mut self, on: bool) -> Self {
        self.parenthesize = on;
        self
    }

    /// Sets whether columns are qualified with their table name.
    #[must_use]
    pub const fn qualify(mut self, on: bool) -> Self {
        self.qualify = on;
        self
    }

    /// Sets whether literals render as positional placeholders.
    #[must_use]
    pub const fn placeholders(mut self, on: bool) -> Self {
        self.placeholders = on;
        self
    }

    /// Registry used for resolution.
    #[must_use]
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }
}

/// Nodes that can be written as SQL.
pub trait ToSql {
    /// Appends this node's SQL to the serializer.
    ///
    /// # Errors
    ///
    /// Fails on unresolvable references and ill-formed statements.
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()>;
}

/// Serializes `node` under `ctx`.
///
/// # Errors
///
/// Returns a resolution error naming the offending reference when a column,
/// alias, CTE or table cannot be matched, and [`Error::InvalidStatement`] for
/// trees the engine could not execute.
pub fn serialize<N: ToSql + ?Sized>(node: &N, ctx: &Context<'_>) -> Result<String> {
    let mut s = Serializer::new(*ctx);
    node.to_sql(&mut s)?;
    Ok(s.out)
}

#[derive(Debug, Default)]
struct Scope {
    tables: Vec<ScopeTable>,
    aliases: Vec<String>,
    ctes: Vec<CteScope>,
    qualify: bool,
}

#[derive(Debug)]
struct ScopeTable {
    owner: Option<TypeId>,
    name: String,
    alias: Option<String>,
}

impl ScopeTable {
    fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug)]
struct CteScope {
    name: String,
    // None when the projection cannot be named statically.
    columns: Option<Vec<String>>,
}

/// Output buffer plus the stack of statement scopes.
#[derive(Debug)]
pub struct Serializer<'r> {
    ctx: Context<'r>,
    out: String,
    scopes: Vec<Scope>,
}

impl<'r> Serializer<'r> {
    fn new(ctx: Context<'r>) -> Self {
        Self {
            ctx,
            out: String::new(),
            scopes: Vec::new(),
        }
    }

    /// Context in effect.
    #[must_use]
    pub const fn context(&self) -> &Context<'r> {
        &self.ctx
    }

    /// Appends raw SQL text.
    pub fn push(&mut self, sql: &str) {
        self.out.push_str(sql);
    }

    /// Appends a column name or alias: bare when possible, quoted otherwise.
    pub fn identifier(&mut self, name: &str) {
        if is_bare_identifier(name) {
            self.out.push_str(name);
        } else {
            self.quoted(name);
        }
    }

    /// Appends a quoted identifier.
    pub fn quoted(&mut self, name: &str) {
        self.out.push_str(&quote_with('"', name));
    }

    /// Appends `"qualifier"."name"`.
    pub fn qualified(&mut self, qualifier: &str, name: &str) {
        self.quoted(qualifier);
        self.out.push('.');
        self.quoted(name);
    }

    /// Appends a literal, inline or as a placeholder.
    pub fn literal(&mut self, value: &SqlValue) {
        if self.ctx.placeholders {
            self.out.push_str(SqlValue::placeholder());
        } else {
            self.out.push_str(&value.to_sql_inline());
        }
    }

    /// Appends `items` separated by `", "`.
    ///
    /// # Errors
    ///
    /// Propagates the first item's error.
    pub fn comma_separated<T: ToSql>(&mut self, items: &[T]) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            item.to_sql(self)?;
        }
        Ok(())
    }

    fn qualifying(&self) -> bool {
        self.ctx.qualify || self.scopes.last().is_some_and(|s| s.qualify)
    }

    fn find_table_alias(&self, alias: &str) -> Option<&ScopeTable> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.tables.iter())
            .find(|t| t.alias.as_deref() == Some(alias))
    }

    fn find_table_owner(&self, owner: TypeId) -> Option<&ScopeTable> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.tables.iter())
            .find(|t| t.owner == Some(owner))
    }

    fn find_cte(&self, name: &str) -> Option<&CteScope> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.ctes.iter())
            .find(|c| c.name == name)
    }

    fn has_alias(&self, alias: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .any(|s| s.aliases.iter().any(|a| a == alias))
    }

    fn unknown_cte(name: &str) -> Error {
        Error::UnknownCte(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{alias, cte_column, Expr};
    use crate::field::Field;
    use crate::schema::{ColumnDef, TableDef};

    struct User {
        id: i64,
    }

    const ID: Field<User, i64> = Field::direct("id", |u| &u.id, |u| &mut u.id);

    fn registry() -> Registry {
        Registry::new().with(TableDef::new("users").column(ColumnDef::new(ID).primary_key()))
    }

    #[test]
    fn test_greater_than_default_and_qualified() {
        let registry = registry();
        let ctx = Context::new(&registry);
        let e = ID.gt(10);
        assert_eq!(serialize(&e, &ctx).unwrap(), "(id > 10)");
        assert_eq!(
            serialize(&e, &ctx.qualify(true)).unwrap(),
            "(\"users\".\"id\" > 10)"
        );
        assert_eq!(serialize(&e, &ctx.parenthesize(false)).unwrap(), "id > 10");
    }

    #[test]
    fn test_in_list_with_placeholders() {
        let registry = registry();
        let ctx = Context::new(&registry).placeholders(true);
        let e = ID.in_list([1, 2, 3]);
        assert_eq!(serialize(&e, &ctx).unwrap(), "id IN (?, ?, ?)");
    }

    #[test]
    fn test_dangling_references_fail() {
        let registry = registry();
        let ctx = Context::new(&registry);
        assert_eq!(
            serialize(&alias("total"), &ctx),
            Err(Error::UnknownAlias(String::from("total")))
        );
        assert_eq!(
            serialize(&cte_column("recent", "id"), &ctx),
            Err(Error::UnknownCte(String::from("recent")))
        );
        assert_eq!(
            serialize(&ID.of("u"), &ctx),
            Err(Error::UnknownTableAlias(String::from("u")))
        );
    }

    #[test]
    fn test_unregistered_field_fails() {
        let empty = Registry::new();
        let err = serialize(&Expr::from(ID), &Context::new(&empty)).unwrap_err();
        assert!(matches!(err, Error::UnmappedField { .. }));
    }
}
