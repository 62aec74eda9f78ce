//! Table and column definitions.
//!
//! [`TableSchema`] and [`ColumnSchema`] are the plain, serializable shapes.
//! [`TableDef`] binds a shape to a row type through field accessors, and the
//! [`Registry`] resolves fields to the tables that own them.

mod column;
mod registry;
mod table;

pub use column::{
    normalize_default, ColumnSchema, DefaultValue, ForeignKey, ForeignKeyAction, Generated,
    TableInfo, TableSchema,
};
pub use registry::{MappedTable, Registry};
pub use table::{ColumnDef, TableDef};
