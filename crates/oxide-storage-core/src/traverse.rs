//! Bind-value traversal.
//!
//! [`Traverse`] visits every literal of a tree depth-first, left to right, in
//! the exact order the serializer emits them. Column references are not
//! visited: they render as identifiers, never as bound values. Any new node
//! kind must walk its children here in the same order the serializer renders
//! them, or placeholders and binds drift apart.

use crate::ast::{
    Cte, Delete, Expr, InList, Insert, InsertSource, Join, OrderBy, Select, Statement, TableRef,
    Update,
};
use crate::value::SqlValue;

/// Depth-first walk over the bindable leaves of a node.
pub trait Traverse {
    /// Calls `visit` once per literal, in rendering order.
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue));
}

/// Collects the bind tuple of a node.
#[must_use]
pub fn bind_values<N: Traverse + ?Sized>(node: &N) -> Vec<SqlValue> {
    let mut values = Vec::new();
    node.traverse(&mut |v| values.push(v.clone()));
    values
}

impl<T: Traverse> Traverse for [T] {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        for item in self {
            item.traverse(visit);
        }
    }
}

impl<T: Traverse> Traverse for Option<T> {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        if let Some(item) = self {
            item.traverse(visit);
        }
    }
}

impl<T: Traverse + ?Sized> Traverse for Box<T> {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        (**self).traverse(visit);
    }
}

impl Traverse for Expr {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        match self {
            Self::Literal(value) => visit(value),
            Self::Column(_)
            | Self::CteColumn { .. }
            | Self::Alias(_)
            | Self::Wildcard
            | Self::TableWildcard { .. } => {}
            Self::Aliased { expr, .. } | Self::Cast { expr, .. } | Self::IsNull { expr, .. } => {
                expr.traverse(visit);
            }
            Self::Unary { operand, .. } => operand.traverse(visit),
            Self::Row(items) => items.traverse(visit),
            Self::Binary { left, right, .. } => {
                left.traverse(visit);
                right.traverse(visit);
            }
            Self::Function(call) => call.args.traverse(visit),
            Self::In { expr, list, .. } => {
                expr.traverse(visit);
                match list {
                    InList::Values(values) => values.traverse(visit),
                    InList::Subquery(query) => query.traverse(visit),
                }
            }
            Self::Between { expr, low, high, .. } => {
                expr.traverse(visit);
                low.traverse(visit);
                high.traverse(visit);
            }
            Self::Pattern {
                expr,
                pattern,
                escape,
                ..
            } => {
                expr.traverse(visit);
                pattern.traverse(visit);
                escape.traverse(visit);
            }
            Self::Case {
                operand,
                when_then,
                else_result,
            } => {
                operand.traverse(visit);
                for (condition, result) in when_then {
                    condition.traverse(visit);
                    result.traverse(visit);
                }
                else_result.traverse(visit);
            }
            Self::Subquery(query) | Self::Exists { query, .. } => query.traverse(visit),
        }
    }
}

impl Traverse for OrderBy {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        self.expr.traverse(visit);
    }
}

impl Traverse for Cte {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        self.query.traverse(visit);
    }
}

impl Traverse for TableRef {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        if let Self::Subquery { query, .. } = self {
            query.traverse(visit);
        }
    }
}

impl Traverse for Join {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        self.table.traverse(visit);
        self.on.traverse(visit);
    }
}

impl Traverse for Select {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        self.ctes.traverse(visit);
        self.columns.traverse(visit);
        self.from.traverse(visit);
        self.joins.traverse(visit);
        self.where_clause.traverse(visit);
        self.group_by.traverse(visit);
        self.having.traverse(visit);
        for (_, member) in &self.compound {
            member.traverse(visit);
        }
        self.order_by.traverse(visit);
        self.limit.traverse(visit);
        self.offset.traverse(visit);
    }
}

impl Traverse for Insert {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        match &self.source {
            InsertSource::Values(rows) => {
                for row in rows {
                    row.traverse(visit);
                }
            }
            InsertSource::Select(query) => query.traverse(visit),
            InsertSource::DefaultValues => {}
        }
    }
}

impl Traverse for Update {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        for (_, value) in &self.set {
            value.traverse(visit);
        }
        self.where_clause.traverse(visit);
    }
}

impl Traverse for Delete {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        self.where_clause.traverse(visit);
    }
}

impl Traverse for Statement {
    fn traverse<'a>(&'a self, visit: &mut dyn FnMut(&'a SqlValue)) {
        match self {
            Self::Select(s) => s.traverse(visit),
            Self::Insert(s) => s.traverse(visit),
            Self::Update(s) => s.traverse(visit),
            Self::Delete(s) => s.traverse(visit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{count_all, Case};
    use crate::field::Field;

    struct User {
        id: i64,
        name: String,
    }

    const ID: Field<User, i64> = Field::direct("id", |u| &u.id, |u| &mut u.id);
    const NAME: Field<User, String> = Field::direct("name", |u| &u.name, |u| &mut u.name);

    #[test]
    fn test_field_references_are_not_leaves() {
        assert!(bind_values(&ID.eq(NAME.expr().cast(crate::types::DataType::Integer))).is_empty());
    }

    #[test]
    fn test_in_list_expands_each_element() {
        let values = bind_values(&ID.in_list([1, 2, 3]));
        assert_eq!(
            values,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );
    }

    #[test]
    fn test_select_follows_clause_order_not_build_order() {
        let query = Select::new()
            .limit(5)
            .having(count_all().gt(2))
            .where_clause(ID.gt(1))
            .column(Case::new().when(ID.eq(0), "zero").otherwise("other"))
            .from::<User>()
            .offset(7);
        let values = bind_values(&query);
        assert_eq!(
            values,
            vec![
                SqlValue::Int(0),
                SqlValue::Text(String::from("zero")),
                SqlValue::Text(String::from("other")),
                SqlValue::Int(1),
                SqlValue::Int(2),
                SqlValue::Int(5),
                SqlValue::Int(7),
            ]
        );
    }

    #[test]
    fn test_update_visits_assignments_before_where() {
        let update = Update::table::<User>()
            .where_clause(ID.eq(9))
            .set(NAME, "neo");
        assert_eq!(
            bind_values(&update),
            vec![SqlValue::Text(String::from("neo")), SqlValue::Int(9)]
        );
    }
}
