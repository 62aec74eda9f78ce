//! The storage session.
//!
//! A [`Storage`] owns a connection pool and the [`Registry`] of mapped
//! tables. Every statement is serialized against that registry, so each
//! session is independent of any other.

use std::any::type_name;
use std::collections::BTreeMap;

use sqlx::sqlite::SqlitePool;

use oxide_storage_core::ast::{count_all, ColumnRef, Delete, Expr, Insert, Select, Update};
use oxide_storage_core::schema::{ColumnDef, Registry, TableDef, TableSchema};
use oxide_storage_core::serializer::ToSql;
use oxide_storage_core::sync::{SyncPlan, SyncResult};
use oxide_storage_core::traverse::Traverse;
use oxide_storage_core::{Error, PreparedRange, PreparedStatement, SqlValue, ToSqlValue};

use crate::connection::ConnectOptions;
use crate::dialect::SqliteDialect;
use crate::driver;
use crate::error::{Result, StorageError};
use crate::introspect;
use crate::sync::SchemaSync;

/// A database session over mapped row types.
///
/// # Example
///
/// ```ignore
/// let storage = Storage::connect(
///     &ConnectOptions::new("sqlite:app.db").create_if_missing(true),
///     Registry::new().with(User::table()),
/// )
/// .await?;
/// storage.sync_schema(true).await?;
/// let id = storage.insert(&User { id: 0, name: "alice".into() }).await?;
/// let user: Option<User> = storage.get(id).await?;
/// ```
#[derive(Debug)]
pub struct Storage {
    pool: SqlitePool,
    registry: Registry,
    dialect: SqliteDialect,
}

impl Storage {
    /// Opens the database described by `options`.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened.
    pub async fn connect(options: &ConnectOptions, registry: Registry) -> Result<Self> {
        let pool = options.connect().await?;
        let mut storage = Self::from_pool(pool, registry).await?;
        if let Some(supported) = options.drop_column_override() {
            storage.dialect = storage.dialect.with_drop_column(supported);
        }
        Ok(storage)
    }

    /// Wraps an existing pool, probing the library version for the dialect.
    ///
    /// # Errors
    ///
    /// Returns an error when the version query fails.
    pub async fn from_pool(pool: SqlitePool, registry: Registry) -> Result<Self> {
        let version = introspect::sqlite_version(&pool).await?;
        Ok(Self {
            pool,
            registry,
            dialect: SqliteDialect::for_version(version),
        })
    }

    /// Connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Registered tables.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dialect in use.
    #[must_use]
    pub const fn dialect(&self) -> &SqliteDialect {
        &self.dialect
    }

    fn table<O: 'static>(&self) -> Result<&TableDef<O>> {
        self.registry
            .table::<O>()
            .ok_or_else(|| StorageError::UnmappedTable(type_name::<O>().to_string()))
    }

    // ====================================================================
    // Statements
    // ====================================================================

    /// Serializes `statement` with placeholders.
    ///
    /// # Errors
    ///
    /// Returns any resolution or serialization error.
    pub fn prepare<S>(&self, statement: &S) -> Result<PreparedStatement>
    where
        S: ToSql + Traverse + ?Sized,
    {
        Ok(PreparedStatement::prepare(statement, &self.registry)?)
    }

    /// Runs a prepared statement with its current bind tuple and returns the
    /// number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Statement`] when the driver rejects it.
    pub async fn execute(&self, statement: &PreparedStatement) -> Result<u64> {
        let result = driver::execute(&self.pool, statement.sql(), statement.binds()).await?;
        Ok(result.rows_affected())
    }

    /// Runs a prepared query and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Statement`] when the driver rejects it.
    pub async fn fetch(&self, statement: &PreparedStatement) -> Result<Vec<Vec<SqlValue>>> {
        driver::fetch_all(&self.pool, statement.sql(), statement.binds()).await
    }

    /// Prepares and runs `statement` once.
    ///
    /// # Errors
    ///
    /// Returns any serialization or driver error.
    pub async fn run<S>(&self, statement: &S) -> Result<u64>
    where
        S: ToSql + Traverse + ?Sized,
    {
        let prepared = self.prepare(statement)?;
        self.execute(&prepared).await
    }

    /// Prepares and runs a query once, returning raw values.
    ///
    /// # Errors
    ///
    /// Returns any serialization or driver error.
    pub async fn select(&self, query: &Select) -> Result<Vec<Vec<SqlValue>>> {
        let prepared = self.prepare(query)?;
        self.fetch(&prepared).await
    }

    // ====================================================================
    // Typed CRUD
    // ====================================================================

    /// Inserts `row`, letting the engine assign a rowid primary key, and
    /// returns the new rowid.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or the insert fails.
    pub async fn insert<O: 'static>(&self, row: &O) -> Result<i64> {
        let table = self.table::<O>()?;
        let columns = table.insertable_columns();
        let statement = if columns.is_empty() {
            Insert::into_table::<O>().default_values()
        } else {
            Insert::into_table::<O>()
                .column_keys(columns.iter().map(|c| c.key()))
                .values(TableDef::values(&columns, row).into_iter().map(Expr::Literal))
        };
        let prepared = self.prepare(&statement)?;
        let result = driver::execute(&self.pool, prepared.sql(), prepared.binds()).await?;
        Ok(result.last_insert_rowid())
    }

    /// Inserts or replaces `row`, primary key included.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or the statement fails.
    pub async fn replace<O: 'static>(&self, row: &O) -> Result<()> {
        let table = self.table::<O>()?;
        let columns = table.writable_columns();
        let statement = Insert::replace::<O>()
            .column_keys(columns.iter().map(|c| c.key()))
            .values(TableDef::values(&columns, row).into_iter().map(Expr::Literal));
        self.run(&statement).await?;
        Ok(())
    }

    /// Updates every non-key column of the row identified by `row`'s primary
    /// key. Returns the number of updated rows.
    ///
    /// # Errors
    ///
    /// [`Error::NoPrimaryKey`] when the table has no primary key.
    pub async fn update<O: 'static>(&self, row: &O) -> Result<u64> {
        let table = self.table::<O>()?;
        let keys = key_columns(table)?;
        let columns: Vec<&ColumnDef<O>> = table
            .writable_columns()
            .into_iter()
            .filter(|c| !table.schema().is_primary_key(&c.schema().name))
            .collect();
        if columns.is_empty() {
            return Ok(0);
        }
        let statement = columns
            .iter()
            .fold(Update::table::<O>(), |update, column| {
                update.set_key(column.key(), Expr::Literal(column.access().read(row)))
            })
            .where_clause(key_condition(&keys, row));
        self.run(&statement).await
    }

    /// Deletes the row identified by `row`'s primary key.
    ///
    /// # Errors
    ///
    /// [`Error::NoPrimaryKey`] when the table has no primary key.
    pub async fn remove<O: 'static>(&self, row: &O) -> Result<u64> {
        let table = self.table::<O>()?;
        let keys = key_columns(table)?;
        let statement = Delete::from_table::<O>().where_clause(key_condition(&keys, row));
        self.run(&statement).await
    }

    /// Deletes every row matching `condition`.
    ///
    /// # Errors
    ///
    /// Returns any serialization or driver error.
    pub async fn remove_where<O: 'static>(&self, condition: Expr) -> Result<u64> {
        self.table::<O>()?;
        self.run(&Delete::from_table::<O>().where_clause(condition))
            .await
    }

    /// Fetches the row whose single-column primary key equals `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NoPrimaryKey`] when the table has no primary key and
    /// [`Error::InvalidStatement`] when the key is composite.
    pub async fn get<O: Default + 'static>(&self, key: impl ToSqlValue) -> Result<Option<O>> {
        let table = self.table::<O>()?;
        let keys = key_columns(table)?;
        let [column] = keys.as_slice() else {
            return Err(Error::InvalidStatement(format!(
                "table `{}` has a composite primary key",
                table.name()
            ))
            .into());
        };
        let condition = column_expr(column).eq(Expr::Literal(key.to_sql_value()));
        let mut rows = self.fetch_rows(table, Some(condition)).await?;
        Ok(rows.pop())
    }

    /// Fetches every row.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or a row cannot be
    /// converted.
    pub async fn get_all<O: Default + 'static>(&self) -> Result<Vec<O>> {
        let table = self.table::<O>()?;
        self.fetch_rows(table, None).await
    }

    /// Fetches every row matching `condition`.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or a row cannot be
    /// converted.
    pub async fn get_all_where<O: Default + 'static>(&self, condition: Expr) -> Result<Vec<O>> {
        let table = self.table::<O>()?;
        self.fetch_rows(table, Some(condition)).await
    }

    /// Number of rows in the table mapped to `O`.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or the query fails.
    pub async fn count<O: 'static>(&self) -> Result<i64> {
        self.table::<O>()?;
        let rows = self
            .select(&Select::new().column(count_all()).from::<O>())
            .await?;
        match rows.first().and_then(|row| row.first()) {
            Some(SqlValue::Int(n)) => Ok(*n),
            _ => Err(StorageError::RowShape {
                table: type_name::<O>().to_string(),
                expected: 1,
                actual: rows.first().map_or(0, Vec::len),
            }),
        }
    }

    /// Inserts `rows` in one statement. Returns the number of inserted rows.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or the insert fails.
    pub async fn insert_range<O: 'static>(&self, rows: &[O]) -> Result<u64> {
        let mut range = PreparedRange::insert(self.table::<O>()?);
        range.bind(rows);
        self.run_range(&range).await
    }

    /// Inserts or replaces `rows` in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or the statement fails.
    pub async fn replace_range<O: 'static>(&self, rows: &[O]) -> Result<u64> {
        let mut range = PreparedRange::replace(self.table::<O>()?);
        range.bind(rows);
        self.run_range(&range).await
    }

    /// Runs a bound range; an empty range does nothing.
    ///
    /// # Errors
    ///
    /// Returns any serialization or driver error.
    pub async fn run_range<O: 'static>(&self, range: &PreparedRange<'_, O>) -> Result<u64> {
        match range.prepare(&self.registry)? {
            Some(prepared) => self.execute(&prepared).await,
            None => Ok(0),
        }
    }

    async fn fetch_rows<O: Default + 'static>(
        &self,
        table: &TableDef<O>,
        condition: Option<Expr>,
    ) -> Result<Vec<O>> {
        let mut query = Select::new()
            .columns(table.columns().iter().map(column_expr))
            .from::<O>();
        if let Some(condition) = condition {
            query = query.where_clause(condition);
        }
        self.select(&query)
            .await?
            .into_iter()
            .map(|values| read_row(table, values))
            .collect()
    }

    // ====================================================================
    // Schema synchronization
    // ====================================================================

    fn schemas(&self) -> Vec<TableSchema> {
        self.registry.schemas().cloned().collect()
    }

    fn schema_sync(&self, preserve: bool) -> SchemaSync {
        SchemaSync::new(self.pool.clone(), self.dialect).preserve(preserve)
    }

    /// Plans the synchronization of every registered table without running it.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog cannot be read.
    pub async fn plan_schema(&self, preserve: bool) -> Result<Vec<SyncPlan>> {
        self.schema_sync(preserve)
            .dry_run(true)
            .run(&self.schemas())
            .await
    }

    /// Brings every registered table in line with its definition.
    ///
    /// # Errors
    ///
    /// Returns an error when introspection or DDL fails.
    pub async fn sync_schema(&self, preserve: bool) -> Result<BTreeMap<String, SyncResult>> {
        let plans = self.schema_sync(preserve).run(&self.schemas()).await?;
        Ok(results(&plans))
    }

    /// Reports what [`Storage::sync_schema`] would do, without running DDL.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog cannot be read.
    pub async fn sync_schema_simulate(
        &self,
        preserve: bool,
    ) -> Result<BTreeMap<String, SyncResult>> {
        Ok(results(&self.plan_schema(preserve).await?))
    }
}

fn results(plans: &[SyncPlan]) -> BTreeMap<String, SyncResult> {
    plans
        .iter()
        .map(|plan| (plan.table_name().to_string(), plan.result()))
        .collect()
}

fn column_expr<O: 'static>(column: &ColumnDef<O>) -> Expr {
    Expr::Column(ColumnRef {
        key: column.key(),
        table_alias: None,
    })
}

fn key_columns<O: 'static>(table: &TableDef<O>) -> Result<Vec<&ColumnDef<O>>> {
    let keys = table.primary_key_columns();
    if keys.is_empty() {
        return Err(Error::NoPrimaryKey(table.name().to_string()).into());
    }
    Ok(keys)
}

fn key_condition<O: 'static>(keys: &[&ColumnDef<O>], row: &O) -> Expr {
    keys.iter()
        .map(|column| column_expr(column).eq(Expr::Literal(column.access().read(row))))
        .reduce(Expr::and)
        .unwrap_or(Expr::Literal(SqlValue::Bool(false)))
}

fn read_row<O: Default + 'static>(table: &TableDef<O>, values: Vec<SqlValue>) -> Result<O> {
    let columns = table.columns();
    if values.len() != columns.len() {
        return Err(StorageError::RowShape {
            table: table.name().to_string(),
            expected: columns.len(),
            actual: values.len(),
        });
    }
    let mut row = O::default();
    for (column, value) in columns.iter().zip(values) {
        column.access().write(&mut row, value)?;
    }
    Ok(row)
}
