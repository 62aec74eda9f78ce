//! Type-checked predicates on fields.
//!
//! Comparisons built from a [`Field`] only accept operands of the field's
//! value type: another field holding the same type, a plain value, or an
//! untyped [`Expr`] as an explicit escape hatch.
//!
//! ```rust
//! use oxide_storage_core::Field;
//!
//! struct User { id: i64, name: String }
//!
//! const ID: Field<User, i64> = Field::direct("id", |u| &u.id, |u| &mut u.id);
//! const NAME: Field<User, String> = Field::direct("name", |u| &u.name, |u| &mut u.name);
//!
//! let _ok = ID.gt(10);
//! let _ok = NAME.eq("bob");
//! // Does not compile: an i64 column compared with text.
//! // let _bad = ID.eq("bob");
//! ```

use crate::ast::expression::{Expr, OrderBy};
use crate::ast::statement::Select;
use crate::field::Field;
use crate::value::ToSqlValue;

/// An operand that may be compared with a field holding `T`.
pub trait Operand<T> {
    /// Converts the operand into an expression node.
    fn into_expr(self) -> Expr;
}

impl<T: ToSqlValue> Operand<T> for T {
    fn into_expr(self) -> Expr {
        Expr::Literal(self.to_sql_value())
    }
}

impl<T: ToSqlValue> Operand<Option<T>> for T {
    fn into_expr(self) -> Expr {
        Expr::Literal(self.to_sql_value())
    }
}

impl Operand<String> for &str {
    fn into_expr(self) -> Expr {
        Expr::from(self)
    }
}

impl Operand<Option<String>> for &str {
    fn into_expr(self) -> Expr {
        Expr::from(self)
    }
}

impl<O: 'static, T> Operand<T> for Field<O, T> {
    fn into_expr(self) -> Expr {
        Expr::column(self)
    }
}

impl<T> Operand<T> for Expr {
    fn into_expr(self) -> Self {
        self
    }
}

impl<O: 'static, T> Field<O, T> {
    /// Column node for this field.
    #[must_use]
    pub fn expr(self) -> Expr {
        Expr::column(self)
    }

    /// Column node pinned to a table alias.
    #[must_use]
    pub fn of(self, table_alias: &str) -> Expr {
        Expr::column_of(table_alias, self)
    }

    /// `field = value`.
    #[must_use]
    pub fn eq(self, value: impl Operand<T>) -> Expr {
        self.expr().eq(value.into_expr())
    }

    /// `field != value`.
    #[must_use]
    pub fn not_eq(self, value: impl Operand<T>) -> Expr {
        self.expr().not_eq(value.into_expr())
    }

    /// `field < value`.
    #[must_use]
    pub fn lt(self, value: impl Operand<T>) -> Expr {
        self.expr().lt(value.into_expr())
    }

    /// `field <= value`.
    #[must_use]
    pub fn lt_eq(self, value: impl Operand<T>) -> Expr {
        self.expr().lt_eq(value.into_expr())
    }

    /// `field > value`.
    #[must_use]
    pub fn gt(self, value: impl Operand<T>) -> Expr {
        self.expr().gt(value.into_expr())
    }

    /// `field >= value`.
    #[must_use]
    pub fn gt_eq(self, value: impl Operand<T>) -> Expr {
        self.expr().gt_eq(value.into_expr())
    }

    /// `field IN (values...)`.
    #[must_use]
    pub fn in_list<V: Operand<T>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        self.expr()
            .in_list(values.into_iter().map(Operand::into_expr))
    }

    /// `field NOT IN (values...)`.
    #[must_use]
    pub fn not_in_list<V: Operand<T>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        self.expr()
            .not_in_list(values.into_iter().map(Operand::into_expr))
    }

    /// `field IN (SELECT ...)`.
    #[must_use]
    pub fn in_subquery(self, query: Select) -> Expr {
        self.expr().in_subquery(query)
    }

    /// `field BETWEEN low AND high`.
    #[must_use]
    pub fn between(self, low: impl Operand<T>, high: impl Operand<T>) -> Expr {
        self.expr().between(low.into_expr(), high.into_expr())
    }

    /// `field NOT BETWEEN low AND high`.
    #[must_use]
    pub fn not_between(self, low: impl Operand<T>, high: impl Operand<T>) -> Expr {
        self.expr().not_between(low.into_expr(), high.into_expr())
    }

    /// `field IS NULL`.
    #[must_use]
    pub fn is_null(self) -> Expr {
        self.expr().is_null()
    }

    /// `field IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(self) -> Expr {
        self.expr().is_not_null()
    }

    /// `field LIKE pattern`.
    #[must_use]
    pub fn like(self, pattern: &str) -> Expr {
        self.expr().like(pattern)
    }

    /// `field NOT LIKE pattern`.
    #[must_use]
    pub fn not_like(self, pattern: &str) -> Expr {
        self.expr().not_like(pattern)
    }

    /// `field LIKE pattern ESCAPE escape`.
    #[must_use]
    pub fn like_escape(self, pattern: &str, escape: char) -> Expr {
        self.expr().like_escape(pattern, escape.to_string())
    }

    /// `field GLOB pattern`.
    #[must_use]
    pub fn glob(self, pattern: &str) -> Expr {
        self.expr().glob(pattern)
    }

    /// `field AS alias`.
    #[must_use]
    pub fn alias(self, alias: &str) -> Expr {
        self.expr().alias(alias)
    }

    /// Ascending ordering term.
    #[must_use]
    pub fn asc(self) -> OrderBy {
        self.expr().asc()
    }

    /// Descending ordering term.
    #[must_use]
    pub fn desc(self) -> OrderBy {
        self.expr().desc()
    }
}
