//! Expression-tree model.
//!
//! Queries are plain trees of [`Expr`] and [`Statement`] nodes. Nothing here
//! knows about table names: columns carry only their field identity and are
//! resolved against a [`Registry`](crate::schema::Registry) at serialization.

mod expression;
mod function;
mod statement;
mod typed;

pub use expression::{
    BinaryOp, ColumnRef, Direction, Expr, FunctionCall, InList, Nulls, OrderBy, PatternOp,
    UnaryOp, ATOM_PRECEDENCE, EQUALITY_PRECEDENCE, NOT_PRECEDENCE, PREFIX_PRECEDENCE,
};
pub use function::{
    abs, alias, avg, coalesce, count, count_all, count_distinct, cte_column, exists, func,
    group_concat, ifnull, length, lit, lower, max, min, not, not_exists, nullif, row, sum, total,
    upper, Case,
};
pub use statement::{
    CompoundOp, Conflict, Cte, Delete, Insert, InsertSource, InsertVerb, Join, JoinKind, Select,
    Statement, TableRef, TableTarget, Update,
};
pub use typed::Operand;
