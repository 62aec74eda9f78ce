//! # oxide-storage-sqlite
//!
//! SQLite backend for `oxide-storage`.
//!
//! This crate provides:
//! - [`Storage`], a session holding a connection pool and the registry of
//!   mapped tables, with prepared statements and typed CRUD
//! - Introspection of the live schema through `pragma_table_xinfo`
//! - [`SchemaSync`], which plans and applies schema synchronization, or
//!   only reports it in dry-run mode
//! - [`SqliteDialect`], whose DROP COLUMN support follows the library version
//!
//! Statements are executed through `sqlx`; failures carry the statement text
//! and the engine's error code.

pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod introspect;
pub mod storage;
pub mod sync;

pub use connection::ConnectOptions;
pub use dialect::{SqliteDialect, SqliteVersion};
pub use error::{Result, StorageError};
pub use storage::Storage;
pub use sync::SchemaSync;
