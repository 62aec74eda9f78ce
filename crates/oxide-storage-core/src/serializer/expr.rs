//! Expression rendering.

use super::{Serializer, ToSql};
use crate::ast::{
    ColumnRef, Direction, Expr, InList, Nulls, OrderBy, UnaryOp, ATOM_PRECEDENCE,
    EQUALITY_PRECEDENCE,
};
use crate::error::{Error, Result};

/// Binding strength of an expression as an operand.
const fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { op, .. } => op.precedence(),
        Expr::IsNull { .. } | Expr::In { .. } | Expr::Between { .. } | Expr::Pattern { .. } => {
            EQUALITY_PRECEDENCE
        }
        _ => ATOM_PRECEDENCE,
    }
}

impl Serializer<'_> {
    /// Writes `child` as an operand of an operator binding at `parent`.
    ///
    /// Right-hand operands are also wrapped at equal precedence since every
    /// binary operator associates to the left.
    fn operand(&mut self, child: &Expr, parent: u8, right: bool) -> Result<()> {
        let self_wrapped = self.ctx.parenthesize && matches!(child, Expr::Binary { .. });
        let child_prec = precedence(child);
        let wrap = !self_wrapped && (child_prec < parent || (right && child_prec == parent));
        if wrap {
            self.out.push('(');
            child.to_sql(self)?;
            self.out.push(')');
        } else {
            child.to_sql(self)?;
        }
        Ok(())
    }

    fn column(&mut self, column: &ColumnRef) -> Result<()> {
        let registry = self.ctx.registry;
        let (table, schema) = registry.resolve(&column.key)?;
        let name = schema.name.clone();
        let qualifier = if let Some(alias) = &column.table_alias {
            let entry = self
                .find_table_alias(alias)
                .ok_or_else(|| Error::UnknownTableAlias(alias.clone()))?;
            if entry.owner != Some(column.key.owner()) {
                return Err(Error::ColumnOutsideTable {
                    table: alias.clone(),
                    column: name,
                });
            }
            Some(alias.clone())
        } else if self.qualifying() {
            let reference = self
                .find_table_owner(column.key.owner())
                .map_or_else(|| table.name.clone(), |t| t.reference().to_string());
            Some(reference)
        } else {
            None
        };
        match qualifier {
            Some(q) => self.qualified(&q, &name),
            None => self.identifier(&name),
        }
        Ok(())
    }

    fn cte_column(&mut self, cte: &str, column: &str) -> Result<()> {
        let scope = self.find_cte(cte).ok_or_else(|| Self::unknown_cte(cte))?;
        if let Some(columns) = &scope.columns {
            if !columns.iter().any(|c| c == column) {
                return Err(Error::UnknownCteColumn {
                    cte: cte.to_string(),
                    column: column.to_string(),
                });
            }
        }
        if self.qualifying() {
            let qualifier = self
                .scopes
                .iter()
                .rev()
                .flat_map(|s| s.tables.iter())
                .find(|t| t.owner.is_none() && t.name == cte)
                .map_or(cte, |t| t.reference())
                .to_string();
            self.qualified(&qualifier, column);
        } else {
            self.identifier(column);
        }
        Ok(())
    }

    fn table_wildcard(&mut self, owner: std::any::TypeId, owner_name: &str) -> Result<()> {
        let registry = self.ctx.registry;
        let name = registry.resolve_table(owner, owner_name)?.name.clone();
        let reference = self
            .find_table_owner(owner)
            .map_or(name, |t| t.reference().to_string());
        self.quoted(&reference);
        self.out.push_str(".*");
        Ok(())
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<()> {
        match op {
            UnaryOp::Not => self.out.push_str("NOT "),
            UnaryOp::Neg | UnaryOp::BitNot => self.out.push_str(op.as_str()),
        }
        let mark = self.out.len();
        self.operand(operand, op.precedence(), true)?;
        // "--" would open a comment.
        if op == UnaryOp::Neg && self.out[mark..].starts_with('-') {
            self.out.insert(mark, ' ');
        }
        Ok(())
    }

    fn list(&mut self, items: &[Expr]) -> Result<()> {
        self.out.push('(');
        self.comma_separated(items)?;
        self.out.push(')');
        Ok(())
    }
}

impl ToSql for Expr {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        match self {
            Self::Literal(value) => s.literal(value),
            Self::Column(column) => s.column(column)?,
            Self::CteColumn { cte, column } => s.cte_column(cte, column)?,
            Self::Alias(name) => {
                if !s.has_alias(name) {
                    return Err(Error::UnknownAlias(name.clone()));
                }
                s.identifier(name);
            }
            Self::Aliased { expr, alias } => {
                expr.to_sql(s)?;
                s.push(" AS ");
                s.identifier(alias);
            }
            Self::Wildcard => s.push("*"),
            Self::TableWildcard { owner, owner_name } => s.table_wildcard(*owner, owner_name)?,
            Self::Row(items) => s.list(items)?,
            Self::Unary { op, operand } => s.unary(*op, operand)?,
            Self::Binary { left, op, right } => {
                let wrap = s.ctx.parenthesize;
                if wrap {
                    s.push("(");
                }
                s.operand(left, op.precedence(), false)?;
                s.push(" ");
                s.push(op.as_str());
                s.push(" ");
                s.operand(right, op.precedence(), true)?;
                if wrap {
                    s.push(")");
                }
            }
            Self::Function(call) => {
                s.push(&call.name);
                s.push("(");
                if call.distinct {
                    s.push("DISTINCT ");
                }
                s.comma_separated(&call.args)?;
                s.push(")");
            }
            Self::IsNull { expr, negated } => {
                s.operand(expr, EQUALITY_PRECEDENCE, true)?;
                s.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Self::In {
                expr,
                list,
                negated,
            } => {
                s.operand(expr, EQUALITY_PRECEDENCE, true)?;
                s.push(if *negated { " NOT IN " } else { " IN " });
                match list {
                    InList::Values(values) => s.list(values)?,
                    InList::Subquery(query) => {
                        s.push("(");
                        query.to_sql(s)?;
                        s.push(")");
                    }
                }
            }
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => {
                s.operand(expr, EQUALITY_PRECEDENCE, true)?;
                s.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                s.operand(low, EQUALITY_PRECEDENCE, true)?;
                s.push(" AND ");
                s.operand(high, EQUALITY_PRECEDENCE, true)?;
            }
            Self::Pattern {
                expr,
                op,
                pattern,
                escape,
                negated,
            } => {
                s.operand(expr, EQUALITY_PRECEDENCE, true)?;
                s.push(if *negated { " NOT " } else { " " });
                s.push(op.as_str());
                s.push(" ");
                s.operand(pattern, EQUALITY_PRECEDENCE, true)?;
                if let Some(escape) = escape {
                    s.push(" ESCAPE ");
                    s.operand(escape, EQUALITY_PRECEDENCE, true)?;
                }
            }
            Self::Case {
                operand,
                when_then,
                else_result,
            } => {
                if when_then.is_empty() {
                    return Err(Error::InvalidStatement(String::from(
                        "CASE expression without WHEN branch",
                    )));
                }
                s.push("CASE");
                if let Some(operand) = operand {
                    s.push(" ");
                    operand.to_sql(s)?;
                }
                for (condition, result) in when_then {
                    s.push(" WHEN ");
                    condition.to_sql(s)?;
                    s.push(" THEN ");
                    result.to_sql(s)?;
                }
                if let Some(else_result) = else_result {
                    s.push(" ELSE ");
                    else_result.to_sql(s)?;
                }
                s.push(" END");
            }
            Self::Cast { expr, data_type } => {
                s.push("CAST(");
                expr.to_sql(s)?;
                s.push(" AS ");
                s.push(data_type.as_sql());
                s.push(")");
            }
            Self::Subquery(query) => {
                s.push("(");
                query.to_sql(s)?;
                s.push(")");
            }
            Self::Exists { query, negated } => {
                s.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                query.to_sql(s)?;
                s.push(")");
            }
        }
        Ok(())
    }
}

impl ToSql for OrderBy {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        self.expr.to_sql(s)?;
        if self.direction == Direction::Desc {
            s.push(" DESC");
        }
        match self.nulls {
            Some(Nulls::First) => s.push(" NULLS FIRST"),
            Some(Nulls::Last) => s.push(" NULLS LAST"),
            None => {}
        }
        Ok(())
    }
}
