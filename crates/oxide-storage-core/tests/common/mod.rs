#![allow(dead_code)]

use oxide_storage_core::serializer::{serialize, Context, ToSql};
use oxide_storage_core::traverse::{bind_values, Traverse};
use oxide_storage_core::{Registry, SqlValue};
use oxide_storage_derive::Table;

#[derive(Debug, Default, Clone, PartialEq, Table)]
#[table(name = "users")]
pub struct User {
    #[column(primary_key)]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Table)]
#[table(name = "posts")]
pub struct Post {
    #[column(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub score: f64,
}

pub fn registry() -> Registry {
    Registry::new().with(User::table()).with(Post::table())
}

/// SQL with every literal inline.
pub fn inline<N: ToSql + ?Sized>(node: &N) -> String {
    let registry = registry();
    serialize(node, &Context::new(&registry))
        .unwrap_or_else(|e| panic!("Failed to serialize: {e}"))
}

/// SQL with placeholders plus its bind tuple.
pub fn placeholders<N: ToSql + Traverse + ?Sized>(node: &N) -> (String, Vec<SqlValue>) {
    let registry = registry();
    let sql = serialize(node, &Context::new(&registry).placeholders(true))
        .unwrap_or_else(|e| panic!("Failed to serialize: {e}"));
    (sql, bind_values(node))
}

/// Replaces each `?` in turn with the inline rendering of the next bind.
pub fn substitute(sql: &str, binds: &[SqlValue]) -> String {
    let mut values = binds.iter();
    let mut out = String::with_capacity(sql.len());
    for c in sql.chars() {
        if c == '?' {
            let value = values
                .next()
                .unwrap_or_else(|| panic!("More placeholders than binds in: {sql}"));
            out.push_str(&value.to_sql_inline());
        } else {
            out.push(c);
        }
    }
    assert!(values.next().is_none(), "More binds than placeholders in: {sql}");
    out
}
