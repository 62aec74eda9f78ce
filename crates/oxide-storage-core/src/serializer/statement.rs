//! Statement rendering and scope management.

use super::{CteScope, Scope, ScopeTable, Serializer, ToSql};
use crate::ast::{
    Cte, Delete, Expr, InList, Insert, InsertSource, InsertVerb, Join, OrderBy, Select,
    Statement, TableRef, TableTarget, Update,
};
use crate::error::{Error, Result};
use crate::field::FieldKey;
use crate::schema::TableSchema;

impl<'r> Serializer<'r> {
    fn mapped_table(&self, target: &TableTarget) -> Result<&'r TableSchema> {
        let registry = self.ctx.registry;
        registry.resolve_table(target.owner, target.owner_name)
    }

    fn scope_table(&self, table: &TableRef) -> Result<ScopeTable> {
        match table {
            TableRef::Mapped { target, alias } => Ok(ScopeTable {
                owner: Some(target.owner),
                name: self.mapped_table(target)?.name.clone(),
                alias: alias.clone(),
            }),
            TableRef::Cte { name, alias } => {
                if self.find_cte(name).is_none() {
                    return Err(Self::unknown_cte(name));
                }
                Ok(ScopeTable {
                    owner: None,
                    name: name.clone(),
                    alias: alias.clone(),
                })
            }
            TableRef::Subquery { alias, .. } => Ok(ScopeTable {
                owner: None,
                name: alias.clone(),
                alias: None,
            }),
        }
    }

    /// Column names a CTE exposes, when they can be known before rendering.
    fn cte_columns(&self, cte: &Cte) -> Option<Vec<String>> {
        if !cte.columns.is_empty() {
            return Some(cte.columns.clone());
        }
        let registry = self.ctx.registry;
        cte.query
            .columns
            .iter()
            .map(|column| match column {
                Expr::Aliased { alias, .. } => Some(alias.clone()),
                Expr::Column(c) => registry.resolve(&c.key).ok().map(|(_, s)| s.name.clone()),
                Expr::CteColumn { column, .. } => Some(column.clone()),
                _ => None,
            })
            .collect()
    }

    fn with_clause(&mut self, select: &Select) -> Result<()> {
        let ctes = select
            .ctes
            .iter()
            .map(|cte| CteScope {
                name: cte.name.clone(),
                columns: self.cte_columns(cte),
            })
            .collect();
        self.scopes.push(Scope {
            ctes,
            ..Scope::default()
        });
        if select.ctes.is_empty() {
            return Ok(());
        }
        self.push(if select.recursive {
            "WITH RECURSIVE "
        } else {
            "WITH "
        });
        for (i, cte) in select.ctes.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.quoted(&cte.name);
            if !cte.columns.is_empty() {
                self.push("(");
                for (j, column) in cte.columns.iter().enumerate() {
                    if j > 0 {
                        self.push(", ");
                    }
                    self.identifier(column);
                }
                self.push(")");
            }
            self.push(" AS (");
            cte.query.to_sql(self)?;
            self.push(")");
        }
        self.push(" ");
        Ok(())
    }

    /// Writes `SELECT ... HAVING ...`, leaving its scope frame pushed.
    fn select_core(&mut self, select: &Select) -> Result<()> {
        let from = if select.from.is_empty() {
            inferred_from(select)
        } else {
            select.from.clone()
        };
        let mut tables = Vec::with_capacity(from.len() + select.joins.len());
        for table in from.iter().chain(select.joins.iter().map(|j| &j.table)) {
            tables.push(self.scope_table(table)?);
        }
        let aliases = select
            .columns
            .iter()
            .filter_map(|c| match c {
                Expr::Aliased { alias, .. } => Some(alias.clone()),
                _ => None,
            })
            .collect();
        self.scopes.push(Scope {
            qualify: tables.len() > 1,
            tables,
            aliases,
            ctes: Vec::new(),
        });

        self.push("SELECT ");
        if select.distinct {
            self.push("DISTINCT ");
        }
        if select.columns.is_empty() {
            self.push("*");
        } else {
            self.comma_separated(&select.columns)?;
        }
        if !from.is_empty() {
            self.push(" FROM ");
            self.comma_separated(&from)?;
        }
        for join in &select.joins {
            self.push(" ");
            join.to_sql(self)?;
        }
        if let Some(condition) = &select.where_clause {
            self.push(" WHERE ");
            condition.to_sql(self)?;
        }
        if !select.group_by.is_empty() {
            self.push(" GROUP BY ");
            self.comma_separated(&select.group_by)?;
        }
        if let Some(condition) = &select.having {
            self.push(" HAVING ");
            condition.to_sql(self)?;
        }
        Ok(())
    }

    fn target_table(&mut self, target: &TableTarget) -> Result<&'r TableSchema> {
        let table = self.mapped_table(target)?;
        self.scopes.push(Scope {
            tables: vec![ScopeTable {
                owner: Some(target.owner),
                name: table.name.clone(),
                alias: None,
            }],
            ..Scope::default()
        });
        Ok(table)
    }

    fn target_column(&self, target: &TableTarget, table: &TableSchema, key: &FieldKey) -> Result<String> {
        let registry = self.ctx.registry;
        let (_, column) = registry.resolve(key)?;
        if key.owner() != target.owner {
            return Err(Error::ColumnOutsideTable {
                table: table.name.clone(),
                column: column.name.clone(),
            });
        }
        Ok(column.name.clone())
    }
}

/// Mapped tables referenced by unpinned columns, in first-seen order.
fn inferred_from(select: &Select) -> Vec<TableRef> {
    let mut owners: Vec<TableTarget> = Vec::new();
    let mut visit = |expr: &Expr| collect_owners(expr, &mut owners);
    select.columns.iter().for_each(&mut visit);
    select.where_clause.iter().for_each(&mut visit);
    select.group_by.iter().for_each(&mut visit);
    select.having.iter().for_each(&mut visit);
    select.order_by.iter().map(|o| &o.expr).for_each(&mut visit);
    owners
        .into_iter()
        .filter(|target| {
            !select.joins.iter().any(
                |j| matches!(&j.table, TableRef::Mapped { target: t, .. } if t.owner == target.owner),
            )
        })
        .map(|target| TableRef::Mapped {
            target,
            alias: None,
        })
        .collect()
}

// Subqueries resolve their own tables and are not descended into.
fn collect_owners(expr: &Expr, out: &mut Vec<TableTarget>) {
    match expr {
        Expr::Column(column) if column.table_alias.is_none() => add_owner(
            out,
            TableTarget {
                owner: column.key.owner(),
                owner_name: column.key.owner_name(),
            },
        ),
        Expr::TableWildcard { owner, owner_name } => add_owner(
            out,
            TableTarget {
                owner: *owner,
                owner_name: *owner_name,
            },
        ),
        Expr::Aliased { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::IsNull { expr, .. }
        | Expr::Unary { operand: expr, .. } => collect_owners(expr, out),
        Expr::Row(items) => items.iter().for_each(|e| collect_owners(e, out)),
        Expr::Function(call) => call.args.iter().for_each(|e| collect_owners(e, out)),
        Expr::Binary { left, right, .. } => {
            collect_owners(left, out);
            collect_owners(right, out);
        }
        Expr::In { expr, list, .. } => {
            collect_owners(expr, out);
            if let InList::Values(values) = list {
                values.iter().for_each(|e| collect_owners(e, out));
            }
        }
        Expr::Between { expr, low, high, .. } => {
            collect_owners(expr, out);
            collect_owners(low, out);
            collect_owners(high, out);
        }
        Expr::Pattern {
            expr,
            pattern,
            escape,
            ..
        } => {
            collect_owners(expr, out);
            collect_owners(pattern, out);
            if let Some(escape) = escape {
                collect_owners(escape, out);
            }
        }
        Expr::Case {
            operand,
            when_then,
            else_result,
        } => {
            if let Some(operand) = operand {
                collect_owners(operand, out);
            }
            for (condition, result) in when_then {
                collect_owners(condition, out);
                collect_owners(result, out);
            }
            if let Some(else_result) = else_result {
                collect_owners(else_result, out);
            }
        }
        _ => {}
    }
}

fn add_owner(out: &mut Vec<TableTarget>, target: TableTarget) {
    if !out.iter().any(|t| t.owner == target.owner) {
        out.push(target);
    }
}

fn check_compound_member(member: &Select) -> Result<()> {
    let clause = if !member.ctes.is_empty() {
        "WITH"
    } else if !member.order_by.is_empty() {
        "ORDER BY"
    } else if member.limit.is_some() || member.offset.is_some() {
        "LIMIT"
    } else if !member.compound.is_empty() {
        "a nested compound"
    } else {
        return Ok(());
    };
    Err(Error::InvalidStatement(format!(
        "compound member cannot carry {clause}"
    )))
}

impl ToSql for Select {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        s.with_clause(self)?;
        s.select_core(self)?;
        for (op, member) in &self.compound {
            check_compound_member(member)?;
            s.push(" ");
            s.push(op.as_str());
            s.push(" ");
            s.select_core(member)?;
            s.scopes.pop();
        }
        if !self.order_by.is_empty() {
            s.push(" ORDER BY ");
            s.comma_separated::<OrderBy>(&self.order_by)?;
        }
        match (&self.limit, &self.offset) {
            (Some(limit), offset) => {
                s.push(" LIMIT ");
                limit.to_sql(s)?;
                if let Some(offset) = offset {
                    s.push(" OFFSET ");
                    offset.to_sql(s)?;
                }
            }
            (None, Some(offset)) => {
                s.push(" LIMIT -1 OFFSET ");
                offset.to_sql(s)?;
            }
            (None, None) => {}
        }
        s.scopes.pop();
        s.scopes.pop();
        Ok(())
    }
}

impl ToSql for TableRef {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        match self {
            Self::Mapped { target, alias } => {
                let name = s.mapped_table(target)?.name.as_str();
                s.quoted(name);
                if let Some(alias) = alias {
                    s.push(" AS ");
                    s.identifier(alias);
                }
            }
            Self::Cte { name, alias } => {
                s.quoted(name);
                if let Some(alias) = alias {
                    s.push(" AS ");
                    s.identifier(alias);
                }
            }
            Self::Subquery { query, alias } => {
                s.push("(");
                query.to_sql(s)?;
                s.push(") AS ");
                s.identifier(alias);
            }
        }
        Ok(())
    }
}

impl ToSql for Join {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        s.push(self.kind.as_str());
        s.push(" ");
        self.table.to_sql(s)?;
        if let Some(on) = &self.on {
            s.push(" ON ");
            on.to_sql(s)?;
        }
        Ok(())
    }
}

impl ToSql for Insert {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        let table = s.target_table(&self.table)?;
        match self.verb {
            InsertVerb::Insert => s.push("INSERT INTO "),
            InsertVerb::Replace => s.push("REPLACE INTO "),
            InsertVerb::InsertOr(conflict) => {
                s.push("INSERT OR ");
                s.push(conflict.as_str());
                s.push(" INTO ");
            }
        }
        s.quoted(&table.name);
        if !self.columns.is_empty() {
            s.push(" (");
            for (i, key) in self.columns.iter().enumerate() {
                if i > 0 {
                    s.push(", ");
                }
                let name = s.target_column(&self.table, table, key)?;
                s.identifier(&name);
            }
            s.push(")");
        }
        match &self.source {
            InsertSource::Values(rows) => {
                if rows.is_empty() {
                    return Err(Error::InvalidStatement(String::from(
                        "INSERT without rows",
                    )));
                }
                s.push(" VALUES ");
                for (i, row) in rows.iter().enumerate() {
                    if !self.columns.is_empty() && row.len() != self.columns.len() {
                        return Err(Error::InvalidStatement(format!(
                            "row {i} has {} values for {} columns",
                            row.len(),
                            self.columns.len()
                        )));
                    }
                    if i > 0 {
                        s.push(", ");
                    }
                    s.push("(");
                    s.comma_separated(row)?;
                    s.push(")");
                }
            }
            InsertSource::Select(query) => {
                s.push(" ");
                query.to_sql(s)?;
            }
            InsertSource::DefaultValues => {
                if !self.columns.is_empty() {
                    return Err(Error::InvalidStatement(String::from(
                        "DEFAULT VALUES with a column list",
                    )));
                }
                s.push(" DEFAULT VALUES");
            }
        }
        s.scopes.pop();
        Ok(())
    }
}

impl ToSql for Update {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        if self.set.is_empty() {
            return Err(Error::InvalidStatement(String::from(
                "UPDATE without assignments",
            )));
        }
        let table = s.target_table(&self.table)?;
        s.push("UPDATE ");
        s.quoted(&table.name);
        s.push(" SET ");
        for (i, (key, value)) in self.set.iter().enumerate() {
            if i > 0 {
                s.push(", ");
            }
            let name = s.target_column(&self.table, table, key)?;
            s.identifier(&name);
            s.push(" = ");
            value.to_sql(s)?;
        }
        if let Some(condition) = &self.where_clause {
            s.push(" WHERE ");
            condition.to_sql(s)?;
        }
        s.scopes.pop();
        Ok(())
    }
}

impl ToSql for Delete {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        let table = s.target_table(&self.table)?;
        s.push("DELETE FROM ");
        s.quoted(&table.name);
        if let Some(condition) = &self.where_clause {
            s.push(" WHERE ");
            condition.to_sql(s)?;
        }
        s.scopes.pop();
        Ok(())
    }
}

impl ToSql for Statement {
    fn to_sql(&self, s: &mut Serializer<'_>) -> Result<()> {
        match self {
            Self::Select(stmt) => stmt.to_sql(s),
            Self::Insert(stmt) => stmt.to_sql(s),
            Self::Update(stmt) => stmt.to_sql(s),
            Self::Delete(stmt) => stmt.to_sql(s),
        }
    }
}
