//! Expression nodes.
//!
//! Every node owns its children. Literals own a copy of their value and column
//! references own only the [`FieldKey`] of their accessor.

use std::any::{type_name, TypeId};
use std::ops;

use crate::ast::statement::Select;
use crate::field::{Field, FieldKey};
use crate::types::DataType;
use crate::value::{SqlValue, ToSqlValue};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Is,
    IsNot,

    // Logical
    And,
    Or,

    // String
    Concat,

    // Bitwise
    BitAnd,
    BitOr,
    LeftShift,
    RightShift,
}

/// Precedence of `NOT`.
pub const NOT_PRECEDENCE: u8 = 3;
/// Precedence of `=`, `IS`, `IN`, `LIKE`, `GLOB` and `BETWEEN`.
pub const EQUALITY_PRECEDENCE: u8 = 4;
/// Precedence of prefix `-`, `+` and `~`.
pub const PREFIX_PRECEDENCE: u8 = 10;
/// Precedence of atoms (literals, columns, calls, parenthesized forms).
pub const ATOM_PRECEDENCE: u8 = u8::MAX;

impl BinaryOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Concat => "||",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
        }
    }

    /// Returns the precedence of the operator (higher = binds tighter).
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Is | Self::IsNot => EQUALITY_PRECEDENCE,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 5,
            Self::BitAnd | Self::BitOr | Self::LeftShift | Self::RightShift => 6,
            Self::Add | Self::Sub => 7,
            Self::Mul | Self::Div | Self::Mod => 8,
            Self::Concat => 9,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Logical NOT
    Not,
    /// Bitwise NOT (~)
    BitNot,
}

impl UnaryOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "NOT",
            Self::BitNot => "~",
        }
    }

    /// Returns the precedence of the operator.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Not => NOT_PRECEDENCE,
            Self::Neg | Self::BitNot => PREFIX_PRECEDENCE,
        }
    }
}

/// Pattern-matching operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternOp {
    /// LIKE (case-insensitive for ASCII).
    Like,
    /// GLOB (Unix wildcards, case-sensitive).
    Glob,
}

impl PatternOp {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Glob => "GLOB",
        }
    }
}

/// A column reference, optionally pinned to a table alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Field identity.
    pub key: FieldKey,
    /// Table alias declared in FROM or JOIN.
    pub table_alias: Option<String>,
}

/// Right-hand side of `IN`.
#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    /// `IN (a, b, c)`.
    Values(Vec<Expr>),
    /// `IN (SELECT ...)`.
    Subquery(Box<Select>),
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// The function name.
    pub name: String,
    /// The arguments.
    pub args: Vec<Expr>,
    /// Whether DISTINCT was specified.
    pub distinct: bool,
}

/// An SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value; the only bindable leaf.
    Literal(SqlValue),

    /// A mapped column.
    Column(ColumnRef),

    /// A column of a common table expression.
    CteColumn {
        /// CTE name.
        cte: String,
        /// Column name.
        column: String,
    },

    /// Back-reference to an alias declared in the projection.
    Alias(String),

    /// `<expr> AS <alias>`.
    Aliased {
        /// Aliased expression.
        expr: Box<Expr>,
        /// Alias name.
        alias: String,
    },

    /// `*`.
    Wildcard,

    /// `"table".*` for a mapped row type.
    TableWildcard {
        /// Row type.
        owner: TypeId,
        /// Rust name of the row type.
        owner_name: &'static str,
    },

    /// Parenthesized row value, `(a, b, c)`.
    Row(Vec<Expr>),

    /// A unary expression.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },

    /// A binary expression.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// A function call.
    Function(FunctionCall),

    /// IS NULL expression.
    IsNull {
        /// The expression to check.
        expr: Box<Expr>,
        /// Whether this is IS NOT NULL.
        negated: bool,
    },

    /// IN expression.
    In {
        /// The expression to check.
        expr: Box<Expr>,
        /// The list of values or subquery.
        list: InList,
        /// Whether this is NOT IN.
        negated: bool,
    },

    /// BETWEEN expression.
    Between {
        /// The expression to check.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// Whether this is NOT BETWEEN.
        negated: bool,
    },

    /// LIKE / GLOB expression.
    Pattern {
        /// The expression to match.
        expr: Box<Expr>,
        /// Operator.
        op: PatternOp,
        /// Pattern.
        pattern: Box<Expr>,
        /// ESCAPE character (LIKE only).
        escape: Option<Box<Expr>>,
        /// Whether this is NOT LIKE / NOT GLOB.
        negated: bool,
    },

    /// CASE expression.
    Case {
        /// Operand of a simple CASE.
        operand: Option<Box<Expr>>,
        /// WHEN/THEN pairs.
        when_then: Vec<(Expr, Expr)>,
        /// ELSE branch.
        else_result: Option<Box<Expr>>,
    },

    /// CAST expression.
    Cast {
        /// Expression to cast.
        expr: Box<Expr>,
        /// Target type.
        data_type: DataType,
    },

    /// Scalar subquery.
    Subquery(Box<Select>),

    /// EXISTS (subquery).
    Exists {
        /// The subquery.
        query: Box<Select>,
        /// Whether this is NOT EXISTS.
        negated: bool,
    },
}

impl Expr {
    /// Creates a literal node.
    #[must_use]
    pub fn value<V: ToSqlValue>(value: V) -> Self {
        Self::Literal(value.to_sql_value())
    }

    /// Creates a column node for a field.
    #[must_use]
    pub fn column<O: 'static, T>(field: Field<O, T>) -> Self {
        Self::Column(ColumnRef {
            key: field.key(),
            table_alias: None,
        })
    }

    /// Creates a column node pinned to a table alias.
    #[must_use]
    pub fn column_of<O: 'static, T>(table_alias: &str, field: Field<O, T>) -> Self {
        Self::Column(ColumnRef {
            key: field.key(),
            table_alias: Some(table_alias.to_string()),
        })
    }

    /// `"table".*` for row type `O`.
    #[must_use]
    pub fn all_of<O: 'static>() -> Self {
        Self::TableWildcard {
            owner: TypeId::of::<O>(),
            owner_name: type_name::<O>(),
        }
    }

    /// Creates a binary node.
    #[must_use]
    pub fn binary(left: impl Into<Self>, op: BinaryOp, right: impl Into<Self>) -> Self {
        Self::Binary {
            left: Box::new(left.into()),
            op,
            right: Box::new(right.into()),
        }
    }

    /// Creates a unary node.
    #[must_use]
    pub fn unary(op: UnaryOp, operand: impl Into<Self>) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand.into()),
        }
    }

    /// `self = other`.
    #[must_use]
    pub fn eq(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::Eq, other)
    }

    /// `self != other`.
    #[must_use]
    pub fn not_eq(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::NotEq, other)
    }

    /// `self < other`.
    #[must_use]
    pub fn lt(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::Lt, other)
    }

    /// `self <= other`.
    #[must_use]
    pub fn lt_eq(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::LtEq, other)
    }

    /// `self > other`.
    #[must_use]
    pub fn gt(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::Gt, other)
    }

    /// `self >= other`.
    #[must_use]
    pub fn gt_eq(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::GtEq, other)
    }

    /// `self IS other`.
    #[must_use]
    pub fn is(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::Is, other)
    }

    /// `self IS NOT other`.
    #[must_use]
    pub fn is_not(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::IsNot, other)
    }

    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::And, other)
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::Or, other)
    }

    /// `self || other`.
    #[must_use]
    pub fn concat(self, other: impl Into<Self>) -> Self {
        Self::binary(self, BinaryOp::Concat, other)
    }

    /// `self IS NULL`.
    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// `self IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// `self IN (values...)`.
    #[must_use]
    pub fn in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Self>,
    {
        Self::In {
            expr: Box::new(self),
            list: InList::Values(values.into_iter().map(Into::into).collect()),
            negated: false,
        }
    }

    /// `self NOT IN (values...)`.
    #[must_use]
    pub fn not_in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Self>,
    {
        Self::In {
            expr: Box::new(self),
            list: InList::Values(values.into_iter().map(Into::into).collect()),
            negated: true,
        }
    }

    /// `self IN (SELECT ...)`.
    #[must_use]
    pub fn in_subquery(self, query: Select) -> Self {
        Self::In {
            expr: Box::new(self),
            list: InList::Subquery(Box::new(query)),
            negated: false,
        }
    }

    /// `self NOT IN (SELECT ...)`.
    #[must_use]
    pub fn not_in_subquery(self, query: Select) -> Self {
        Self::In {
            expr: Box::new(self),
            list: InList::Subquery(Box::new(query)),
            negated: true,
        }
    }

    /// `self BETWEEN low AND high`.
    #[must_use]
    pub fn between(self, low: impl Into<Self>, high: impl Into<Self>) -> Self {
        Self::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    /// `self NOT BETWEEN low AND high`.
    #[must_use]
    pub fn not_between(self, low: impl Into<Self>, high: impl Into<Self>) -> Self {
        Self::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: true,
        }
    }

    fn pattern(self, op: PatternOp, pattern: impl Into<Self>, negated: bool) -> Self {
        Self::Pattern {
            expr: Box::new(self),
            op,
            pattern: Box::new(pattern.into()),
            escape: None,
            negated,
        }
    }

    /// `self LIKE pattern`.
    #[must_use]
    pub fn like(self, pattern: impl Into<Self>) -> Self {
        self.pattern(PatternOp::Like, pattern, false)
    }

    /// `self NOT LIKE pattern`.
    #[must_use]
    pub fn not_like(self, pattern: impl Into<Self>) -> Self {
        self.pattern(PatternOp::Like, pattern, true)
    }

    /// `self LIKE pattern ESCAPE escape`. GLOB has no ESCAPE clause.
    #[must_use]
    pub fn like_escape(self, pattern: impl Into<Self>, escape: impl Into<Self>) -> Self {
        self.like_with(pattern, escape, false)
    }

    /// `self NOT LIKE pattern ESCAPE escape`.
    #[must_use]
    pub fn not_like_escape(self, pattern: impl Into<Self>, escape: impl Into<Self>) -> Self {
        self.like_with(pattern, escape, true)
    }

    fn like_with(self, pattern: impl Into<Self>, escape: impl Into<Self>, negated: bool) -> Self {
        Self::Pattern {
            expr: Box::new(self),
            op: PatternOp::Like,
            pattern: Box::new(pattern.into()),
            escape: Some(Box::new(escape.into())),
            negated,
        }
    }

    /// `self GLOB pattern`.
    #[must_use]
    pub fn glob(self, pattern: impl Into<Self>) -> Self {
        self.pattern(PatternOp::Glob, pattern, false)
    }

    /// `self NOT GLOB pattern`.
    #[must_use]
    pub fn not_glob(self, pattern: impl Into<Self>) -> Self {
        self.pattern(PatternOp::Glob, pattern, true)
    }

    /// `CAST(self AS data_type)`.
    #[must_use]
    pub fn cast(self, data_type: DataType) -> Self {
        Self::Cast {
            expr: Box::new(self),
            data_type,
        }
    }

    /// `self AS alias`.
    #[must_use]
    pub fn alias(self, alias: &str) -> Self {
        Self::Aliased {
            expr: Box::new(self),
            alias: alias.to_string(),
        }
    }

    /// Ascending ordering term.
    #[must_use]
    pub fn asc(self) -> OrderBy {
        OrderBy::new(self, Direction::Asc)
    }

    /// Descending ordering term.
    #[must_use]
    pub fn desc(self) -> OrderBy {
        OrderBy::new(self, Direction::Desc)
    }
}

macro_rules! expr_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Self::Literal(value.to_sql_value())
                }
            }
        )*
    };
}

expr_from_value!(SqlValue, bool, i64, i32, i16, i8, u32, u16, u8, f64, f32, String, &str, Vec<u8>);

impl<T: ToSqlValue> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Self::Literal(value.to_sql_value())
    }
}

impl<O: 'static, T> From<Field<O, T>> for Expr {
    fn from(field: Field<O, T>) -> Self {
        Self::column(field)
    }
}

impl From<Select> for Expr {
    fn from(query: Select) -> Self {
        Self::Subquery(Box::new(query))
    }
}

macro_rules! expr_binary_ops {
    ($($trait:ident :: $method:ident => $op:ident),*) => {
        $(
            impl<R: Into<Expr>> ops::$trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    Expr::binary(self, BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

expr_binary_ops!(
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Mod,
    BitAnd::bitand => BitAnd,
    BitOr::bitor => BitOr,
    Shl::shl => LeftShift,
    Shr::shr => RightShift
);

impl ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self {
        Self::unary(UnaryOp::Neg, self)
    }
}

impl ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        Self::unary(UnaryOp::Not, self)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// ASC.
    Asc,
    /// DESC.
    Desc,
}

/// Placement of NULLs in an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nulls {
    /// NULLS FIRST.
    First,
    /// NULLS LAST.
    Last,
}

/// An ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Sort key.
    pub expr: Expr,
    /// Direction.
    pub direction: Direction,
    /// NULL placement, engine default when unset.
    pub nulls: Option<Nulls>,
}

impl OrderBy {
    /// Creates an ordering term.
    #[must_use]
    pub const fn new(expr: Expr, direction: Direction) -> Self {
        Self {
            expr,
            direction,
            nulls: None,
        }
    }

    /// NULLS FIRST.
    #[must_use]
    pub const fn nulls_first(mut self) -> Self {
        self.nulls = Some(Nulls::First);
        self
    }

    /// NULLS LAST.
    #[must_use]
    pub const fn nulls_last(mut self) -> Self {
        self.nulls = Some(Nulls::Last);
        self
    }
}

impl From<Expr> for OrderBy {
    fn from(expr: Expr) -> Self {
        Self::new(expr, Direction::Asc)
    }
}

impl<O: 'static, T> From<Field<O, T>> for OrderBy {
    fn from(field: Field<O, T>) -> Self {
        Self::new(Expr::column(field), Direction::Asc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        n: i64,
    }

    const N: Field<Row, i64> = Field::direct("n", |r| &r.n, |r| &mut r.n);

    #[test]
    fn test_operator_overloads_build_binary_nodes() {
        let e = Expr::from(N) + 1;
        assert!(matches!(e, Expr::Binary { op: BinaryOp::Add, .. }));
        let e = !Expr::from(N).eq(1);
        assert!(matches!(e, Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn test_escape_is_built_with_like() {
        let e = Expr::from(N).like_escape("a!%", "!");
        assert!(matches!(
            e,
            Expr::Pattern {
                op: PatternOp::Like,
                escape: Some(_),
                negated: false,
                ..
            }
        ));
        let e = Expr::from(N).not_like_escape("a!%", "!");
        assert!(matches!(e, Expr::Pattern { negated: true, escape: Some(_), .. }));
        let e = Expr::from(N).glob("a*");
        assert!(matches!(e, Expr::Pattern { op: PatternOp::Glob, escape: None, .. }));
    }

    #[test]
    fn test_precedence_ladder() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < NOT_PRECEDENCE + 1);
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Lt.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
        assert!(BinaryOp::Mul.precedence() < BinaryOp::Concat.precedence());
        assert!(BinaryOp::Concat.precedence() < PREFIX_PRECEDENCE);
    }
}
