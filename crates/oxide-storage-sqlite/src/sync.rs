//! Schema synchronization against a live database.
//!
//! Each table is planned from the catalog and, unless in dry-run mode, the
//! plan's statements run inside one transaction. A dry run reports exactly
//! what a real run would, because both go through the same planner.
//!
//! Foreign key enforcement is switched off on the connection around that
//! transaction, so dropping a referenced table during a rebuild neither
//! cascades into nor fails on its child rows. `PRAGMA foreign_key_check`
//! runs before commit and any violation rolls the table back.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Connection;
use tracing::{debug, info, warn};

use oxide_storage_core::schema::TableSchema;
use oxide_storage_core::sync::{plan_table, SyncPlan, SyncStep};

use crate::dialect::SqliteDialect;
use crate::driver;
use crate::error::{Result, StorageError};
use crate::introspect;

/// Synchronizes declared tables with a database.
#[derive(Debug, Clone)]
pub struct SchemaSync {
    pool: SqlitePool,
    dialect: SqliteDialect,
    preserve: bool,
    dry_run: bool,
}

impl SchemaSync {
    /// Creates a synchronizer that does not preserve rows on recreate.
    #[must_use]
    pub const fn new(pool: SqlitePool, dialect: SqliteDialect) -> Self {
        Self {
            pool,
            dialect,
            preserve: false,
            dry_run: false,
        }
    }

    /// Copies shared columns across a table rebuild instead of discarding rows.
    #[must_use]
    pub const fn preserve(mut self, enabled: bool) -> Self {
        self.preserve = enabled;
        self
    }

    /// Plans without executing any DDL.
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &SqliteDialect {
        &self.dialect
    }

    /// Plans one table against the current catalog.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog cannot be read.
    pub async fn plan(&self, table: &TableSchema) -> Result<SyncPlan> {
        let mut conn = self.pool.acquire().await?;
        self.plan_on(&mut conn, table).await
    }

    /// Synchronizes every table in order, returning one plan per table.
    ///
    /// # Errors
    ///
    /// Stops at the first table whose introspection or DDL fails; that
    /// table's transaction is rolled back.
    pub async fn run(&self, tables: &[TableSchema]) -> Result<Vec<SyncPlan>> {
        let mut plans = Vec::with_capacity(tables.len());
        for table in tables {
            plans.push(self.run_table(table).await?);
        }
        Ok(plans)
    }

    /// Synchronizes one table.
    ///
    /// # Errors
    ///
    /// Returns an error when introspection or any DDL statement fails, and
    /// [`StorageError::ForeignKeyCheck`] when the new table leaves child rows
    /// without a parent. The table is left as it was in both cases.
    pub async fn run_table(&self, table: &TableSchema) -> Result<SyncPlan> {
        if self.dry_run {
            let plan = self.plan(table).await?;
            info!(
                table = %plan.table_name(),
                result = %plan.result(),
                "Schema sync simulated"
            );
            return Ok(plan);
        }

        let mut conn = self.pool.acquire().await?;
        // The pragma is a no-op inside a transaction.
        let enforced = introspect::foreign_keys_enabled(&mut *conn).await?;
        if enforced {
            debug!(table = %table.name, "Pausing foreign key enforcement");
            driver::execute(&mut *conn, "PRAGMA foreign_keys = OFF", &[]).await?;
        }

        let outcome = self.apply(&mut *conn, table, enforced).await;

        if enforced {
            if let Err(err) = driver::execute(&mut *conn, "PRAGMA foreign_keys = ON", &[]).await {
                // Never hand a connection without enforcement back to the pool.
                conn.close_on_drop();
                return Err(outcome.err().unwrap_or(err));
            }
        }
        let plan = outcome?;

        info!(
            table = %plan.table_name(),
            result = %plan.result(),
            "Schema synchronized"
        );
        Ok(plan)
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        table: &TableSchema,
        check_keys: bool,
    ) -> Result<SyncPlan> {
        let mut tx = conn.begin().await?;
        match self.apply_in(&mut *tx, table, check_keys).await {
            Ok(plan) => {
                tx.commit().await?;
                Ok(plan)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(table = %table.name, error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn apply_in(
        &self,
        conn: &mut SqliteConnection,
        table: &TableSchema,
        check_keys: bool,
    ) -> Result<SyncPlan> {
        let plan = self.plan_on(&mut *conn, table).await?;

        if plan.loses_data() {
            let rows = introspect::row_count(&mut *conn, &table.name).await?;
            if rows > 0 {
                warn!(
                    table = %table.name,
                    rows,
                    "Dropping table discards existing rows"
                );
            }
        }
        for step in plan.steps() {
            if let SyncStep::Rebuild { backup, shared } = step {
                warn!(
                    table = %table.name,
                    backup = %backup,
                    columns = shared.len(),
                    "Rebuilding table through a backup copy"
                );
            }
        }

        for sql in plan.statements(&self.dialect) {
            driver::execute(&mut *conn, &sql, &[]).await?;
        }

        if check_keys && !plan.is_noop() {
            let violations = introspect::foreign_key_violations(&mut *conn).await?;
            if let Some(first) = violations.first() {
                return Err(StorageError::ForeignKeyCheck {
                    table: table.name.clone(),
                    child: first.table.clone(),
                    parent: first.parent.clone(),
                    rows: violations.len(),
                });
            }
        }
        Ok(plan)
    }

    async fn plan_on(&self, conn: &mut SqliteConnection, table: &TableSchema) -> Result<SyncPlan> {
        let tables = introspect::list_tables(&mut *conn).await?;
        let live = if tables.iter().any(|t| t.eq_ignore_ascii_case(&table.name)) {
            Some(introspect::table_info(&mut *conn, &table.name).await?)
        } else {
            None
        };
        debug!(
            table = %table.name,
            exists = live.is_some(),
            preserve = self.preserve,
            "Planning schema sync"
        );
        Ok(plan_table(
            table,
            live.as_deref(),
            &tables,
            self.preserve,
            &self.dialect,
        ))
    }
}
