//! # oxide-storage-core
//!
//! Typed SQL expression trees over mapped row types, with a serializer, bind
//! extraction and schema synchronization planning for SQLite.
//!
//! This crate provides:
//! - Field accessors that tie a column to a row type and value type, so
//!   ill-typed comparisons fail to compile
//! - An expression/statement tree rendered in fixed clause order
//! - A traversal that yields bind values in exactly the order placeholders
//!   are emitted
//! - Schema definitions, DDL rendering and a synchronization planner
//!
//! It performs no I/O; `oxide-storage-sqlite` executes what this crate
//! produces.
//!
//! ## Example
//!
//! ```rust
//! use oxide_storage_core::schema::{ColumnDef, Registry, TableDef};
//! use oxide_storage_core::serializer::{serialize, Context};
//! use oxide_storage_core::{Field, Select};
//!
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! const ID: Field<User, i64> = Field::direct("id", |u| &u.id, |u| &mut u.id);
//! const NAME: Field<User, String> = Field::direct("name", |u| &u.name, |u| &mut u.name);
//!
//! let registry = Registry::new().with(
//!     TableDef::new("users")
//!         .column(ColumnDef::new(ID).primary_key())
//!         .column(ColumnDef::new(NAME)),
//! );
//!
//! let query = Select::new().column(NAME).where_clause(ID.gt(10));
//! let sql = serialize(&query, &Context::new(&registry)).unwrap();
//! assert_eq!(sql, "SELECT name FROM \"users\" WHERE (id > 10)");
//! ```

pub mod ast;
pub mod dialect;
pub mod error;
pub mod field;
pub mod prepared;
pub mod schema;
pub mod serializer;
pub mod sync;
pub mod traverse;
pub mod types;
pub mod value;

pub use ast::{Delete, Expr, Insert, Select, Statement, Update};
pub use error::{Error, Result};
pub use field::{ColumnAccess, Field, FieldKey};
pub use prepared::{PreparedRange, PreparedStatement};
pub use schema::{ColumnDef, Registry, TableDef};
pub use sync::{SyncPlan, SyncResult};
pub use types::{ColumnType, DataType};
pub use value::{FromSqlValue, SqlValue, ToSqlValue, ValueKind};
