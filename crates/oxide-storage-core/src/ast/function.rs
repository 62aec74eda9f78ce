//! Constructors for function calls, CASE, EXISTS and other composite nodes.

use crate::ast::expression::{Expr, FunctionCall};
use crate::ast::statement::Select;
use crate::value::ToSqlValue;

/// A literal node.
#[must_use]
pub fn lit<V: ToSqlValue>(value: V) -> Expr {
    Expr::value(value)
}

/// Back-reference to a projection alias.
#[must_use]
pub fn alias(name: &str) -> Expr {
    Expr::Alias(name.to_string())
}

/// Column of a common table expression.
#[must_use]
pub fn cte_column(cte: &str, column: &str) -> Expr {
    Expr::CteColumn {
        cte: cte.to_string(),
        column: column.to_string(),
    }
}

/// Parenthesized row value.
#[must_use]
pub fn row<I, E>(items: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    Expr::Row(items.into_iter().map(Into::into).collect())
}

/// Calls function `name` with `args`.
#[must_use]
pub fn func<I, E>(name: &str, args: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    Expr::Function(FunctionCall {
        name: name.to_ascii_uppercase(),
        args: args.into_iter().map(Into::into).collect(),
        distinct: false,
    })
}

fn call1(name: &str, arg: impl Into<Expr>, distinct: bool) -> Expr {
    Expr::Function(FunctionCall {
        name: name.to_string(),
        args: vec![arg.into()],
        distinct,
    })
}

/// `COUNT(*)`.
#[must_use]
pub fn count_all() -> Expr {
    call1("COUNT", Expr::Wildcard, false)
}

/// `COUNT(expr)`.
#[must_use]
pub fn count(expr: impl Into<Expr>) -> Expr {
    call1("COUNT", expr, false)
}

/// `COUNT(DISTINCT expr)`.
#[must_use]
pub fn count_distinct(expr: impl Into<Expr>) -> Expr {
    call1("COUNT", expr, true)
}

/// `SUM(expr)`.
#[must_use]
pub fn sum(expr: impl Into<Expr>) -> Expr {
    call1("SUM", expr, false)
}

/// `TOTAL(expr)`.
#[must_use]
pub fn total(expr: impl Into<Expr>) -> Expr {
    call1("TOTAL", expr, false)
}

/// `AVG(expr)`.
#[must_use]
pub fn avg(expr: impl Into<Expr>) -> Expr {
    call1("AVG", expr, false)
}

/// `MIN(expr)`.
#[must_use]
pub fn min(expr: impl Into<Expr>) -> Expr {
    call1("MIN", expr, false)
}

/// `MAX(expr)`.
#[must_use]
pub fn max(expr: impl Into<Expr>) -> Expr {
    call1("MAX", expr, false)
}

/// `GROUP_CONCAT(expr, separator)`.
#[must_use]
pub fn group_concat(expr: impl Into<Expr>, separator: &str) -> Expr {
    func("GROUP_CONCAT", [expr.into(), Expr::from(separator)])
}

/// `LOWER(expr)`.
#[must_use]
pub fn lower(expr: impl Into<Expr>) -> Expr {
    call1("LOWER", expr, false)
}

/// `UPPER(expr)`.
#[must_use]
pub fn upper(expr: impl Into<Expr>) -> Expr {
    call1("UPPER", expr, false)
}

/// `LENGTH(expr)`.
#[must_use]
pub fn length(expr: impl Into<Expr>) -> Expr {
    call1("LENGTH", expr, false)
}

/// `ABS(expr)`.
#[must_use]
pub fn abs(expr: impl Into<Expr>) -> Expr {
    call1("ABS", expr, false)
}

/// `COALESCE(args...)`.
#[must_use]
pub fn coalesce<I, E>(args: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: Into<Expr>,
{
    func("COALESCE", args)
}

/// `IFNULL(expr, fallback)`.
#[must_use]
pub fn ifnull(expr: impl Into<Expr>, fallback: impl Into<Expr>) -> Expr {
    let args: [Expr; 2] = [expr.into(), fallback.into()];
    func("IFNULL", args)
}

/// `NULLIF(a, b)`.
#[must_use]
pub fn nullif(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    let args: [Expr; 2] = [a.into(), b.into()];
    func("NULLIF", args)
}

/// `EXISTS (query)`.
#[must_use]
pub fn exists(query: Select) -> Expr {
    Expr::Exists {
        query: Box::new(query),
        negated: false,
    }
}

/// `NOT EXISTS (query)`.
#[must_use]
pub fn not_exists(query: Select) -> Expr {
    Expr::Exists {
        query: Box::new(query),
        negated: true,
    }
}

/// `NOT expr`.
#[must_use]
pub fn not(expr: impl Into<Expr>) -> Expr {
    let expr: Expr = expr.into();
    !expr
}

/// Builder for a CASE expression.
#[derive(Debug, Clone, Default)]
pub struct Case {
    operand: Option<Expr>,
    when_then: Vec<(Expr, Expr)>,
}

impl Case {
    /// Searched CASE: `CASE WHEN cond THEN ...`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simple CASE: `CASE operand WHEN value THEN ...`.
    #[must_use]
    pub fn on(operand: impl Into<Expr>) -> Self {
        Self {
            operand: Some(operand.into()),
            when_then: Vec::new(),
        }
    }

    /// Adds a WHEN/THEN branch.
    #[must_use]
    pub fn when(mut self, condition: impl Into<Expr>, result: impl Into<Expr>) -> Self {
        self.when_then.push((condition.into(), result.into()));
        self
    }

    /// Finishes with an ELSE branch.
    #[must_use]
    pub fn otherwise(self, result: impl Into<Expr>) -> Expr {
        self.finish(Some(result.into()))
    }

    /// Finishes without an ELSE branch.
    #[must_use]
    pub fn end(self) -> Expr {
        self.finish(None)
    }

    fn finish(self, else_result: Option<Expr>) -> Expr {
        Expr::Case {
            operand: self.operand.map(Box::new),
            when_then: self.when_then,
            else_result: else_result.map(Box::new),
        }
    }
}
