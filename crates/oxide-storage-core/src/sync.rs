//! Schema synchronization planning.
//!
//! [`plan_table`] compares a declared table with the columns the catalog
//! reports for it and decides what DDL brings the live table in line. The
//! decision is pure: executing a plan and merely simulating it report the
//! same [`SyncResult`] because both come from the same [`SyncPlan`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::schema::{normalize_default, ColumnSchema, TableInfo, TableSchema};

/// Outcome of synchronizing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResult {
    /// The live table already matches.
    AlreadyInSync,
    /// The table did not exist and was created.
    NewTableCreated,
    /// Columns were added in place.
    NewColumnsAdded,
    /// Columns were removed, in place or by a preserving rebuild.
    OldColumnsRemoved,
    /// Columns were both added and removed in place.
    NewColumnsAddedAndOldColumnsRemoved,
    /// The table was dropped and created again.
    DroppedAndRecreated,
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AlreadyInSync => "already in sync",
            Self::NewTableCreated => "new table created",
            Self::NewColumnsAdded => "new columns added",
            Self::OldColumnsRemoved => "old columns removed",
            Self::NewColumnsAddedAndOldColumnsRemoved => "new columns added and old columns removed",
            Self::DroppedAndRecreated => "dropped and recreated",
        };
        f.write_str(text)
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SyncStep {
    /// Create the declared table.
    CreateTable,
    /// `ALTER TABLE ... ADD COLUMN`.
    AddColumn {
        /// Column to add.
        column: ColumnSchema,
    },
    /// `ALTER TABLE ... DROP COLUMN`.
    DropColumn {
        /// Column to drop.
        column: String,
    },
    /// Copy `shared` columns aside, recreate the table, copy them back.
    Rebuild {
        /// Name of the temporary copy.
        backup: String,
        /// Columns present in both shapes.
        shared: Vec<String>,
    },
    /// Drop the table and create it again without carrying rows over.
    DropAndCreate,
}

/// Decision for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncPlan {
    table: TableSchema,
    result: SyncResult,
    steps: Vec<SyncStep>,
    added: Vec<String>,
    removed: Vec<String>,
    mismatched: Vec<String>,
}

impl SyncPlan {
    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Result reported for this plan.
    #[must_use]
    pub const fn result(&self) -> SyncResult {
        self.result
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[SyncStep] {
        &self.steps
    }

    /// Declared columns missing from the live table.
    #[must_use]
    pub fn added(&self) -> &[String] {
        &self.added
    }

    /// Live columns no longer declared.
    #[must_use]
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Shared columns whose type or constraints differ.
    #[must_use]
    pub fn mismatched(&self) -> &[String] {
        &self.mismatched
    }

    /// Returns whether nothing needs to run.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns whether executing the plan discards the table's rows.
    #[must_use]
    pub fn loses_data(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, SyncStep::DropAndCreate))
    }

    /// Renders the plan as SQL statements, in order.
    #[must_use]
    pub fn statements(&self, dialect: &dyn Dialect) -> Vec<String> {
        let name = self.table.name.as_str();
        let mut out = Vec::new();
        for step in &self.steps {
            match step {
                SyncStep::CreateTable => out.push(dialect.create_table(&self.table)),
                SyncStep::AddColumn { column } => out.push(dialect.add_column(name, column)),
                SyncStep::DropColumn { column } => out.push(dialect.drop_column(name, column)),
                SyncStep::Rebuild { backup, shared } => {
                    if shared.is_empty() {
                        out.push(dialect.drop_table(name));
                        out.push(dialect.create_table(&self.table));
                    } else {
                        out.push(dialect.create_table_as(backup, name, shared));
                        out.push(dialect.drop_table(name));
                        out.push(dialect.create_table(&self.table));
                        out.push(dialect.insert_select(name, backup, shared));
                        out.push(dialect.drop_table(backup));
                    }
                }
                SyncStep::DropAndCreate => {
                    out.push(dialect.drop_table(name));
                    out.push(dialect.create_table(&self.table));
                }
            }
        }
        out
    }
}

/// Plans the synchronization of `declared`.
///
/// `live` is the catalog's view of the table, `None` when it does not exist.
/// `tables` lists every table in the database and is used to pick an unused
/// backup name.
#[must_use]
pub fn plan_table(
    declared: &TableSchema,
    live: Option<&[TableInfo]>,
    tables: &[String],
    preserve: bool,
    dialect: &dyn Dialect,
) -> SyncPlan {
    let mut plan = SyncPlan {
        table: declared.clone(),
        result: SyncResult::AlreadyInSync,
        steps: Vec::new(),
        added: Vec::new(),
        removed: Vec::new(),
        mismatched: Vec::new(),
    };
    let Some(live) = live else {
        plan.result = SyncResult::NewTableCreated;
        plan.steps.push(SyncStep::CreateTable);
        return plan;
    };

    let to_add: Vec<&ColumnSchema> = declared
        .columns
        .iter()
        .filter(|c| find_info(live, &c.name).is_none())
        .collect();
    let to_remove: Vec<&TableInfo> = live
        .iter()
        .filter(|info| find_column(declared, &info.name).is_none())
        .collect();
    plan.added = to_add.iter().map(|c| c.name.clone()).collect();
    plan.removed = to_remove.iter().map(|i| i.name.clone()).collect();
    plan.mismatched = declared
        .columns
        .iter()
        .filter(|c| find_info(live, &c.name).is_some_and(|info| column_differs(declared, c, info)))
        .map(|c| c.name.clone())
        .collect();

    if to_add.is_empty() && to_remove.is_empty() && plan.mismatched.is_empty() {
        return plan;
    }

    let add_in_place = to_add.is_empty()
        || (dialect.supports_add_column() && to_add.iter().all(|c| c.is_addable()));
    let drop_in_place = to_remove.is_empty()
        || (dialect.supports_drop_column()
            && to_remove.iter().all(|info| info.pk == 0 && !info.constrained));

    if plan.mismatched.is_empty() && add_in_place && drop_in_place {
        plan.steps.extend(to_remove.iter().map(|info| SyncStep::DropColumn {
            column: info.name.clone(),
        }));
        plan.steps.extend(to_add.iter().map(|c| SyncStep::AddColumn {
            column: (*c).clone(),
        }));
        plan.result = match (to_add.is_empty(), to_remove.is_empty()) {
            (false, true) => SyncResult::NewColumnsAdded,
            (true, false) => SyncResult::OldColumnsRemoved,
            _ => SyncResult::NewColumnsAddedAndOldColumnsRemoved,
        };
        return plan;
    }

    let only_removals = to_add.is_empty() && plan.mismatched.is_empty();
    if preserve && can_refill(declared, live) {
        let shared = declared
            .columns
            .iter()
            .filter(|c| c.generated.is_none())
            .filter(|c| find_info(live, &c.name).is_some_and(|info| !info.is_generated()))
            .map(|c| c.name.clone())
            .collect();
        plan.steps.push(SyncStep::Rebuild {
            backup: backup_name(&declared.name, tables),
            shared,
        });
        plan.result = if only_removals {
            SyncResult::OldColumnsRemoved
        } else {
            SyncResult::DroppedAndRecreated
        };
    } else {
        plan.steps.push(SyncStep::DropAndCreate);
        plan.result = SyncResult::DroppedAndRecreated;
    }
    plan
}

fn find_info<'a>(live: &'a [TableInfo], name: &str) -> Option<&'a TableInfo> {
    live.iter().find(|info| info.name.eq_ignore_ascii_case(name))
}

fn find_column<'a>(table: &'a TableSchema, name: &str) -> Option<&'a ColumnSchema> {
    table
        .columns
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Returns whether the declared column disagrees with the catalog.
fn column_differs(table: &TableSchema, column: &ColumnSchema, info: &TableInfo) -> bool {
    let declared_default = column
        .default
        .as_ref()
        .map(|d| normalize_default(&d.to_sql()));
    let live_default = info.default_value.as_deref().map(normalize_default);
    !column.data_type.matches(&info.data_type)
        || table.is_primary_key(&column.name) != (info.pk > 0)
        // NOT NULL is not compared on primary key columns.
        || (info.pk == 0 && column.not_null != info.not_null)
        || declared_default != live_default
        || column.generated.is_some() != info.is_generated()
}

// Every declared column missing from the live table must be fillable when
// the old rows are copied back.
fn can_refill(table: &TableSchema, live: &[TableInfo]) -> bool {
    table
        .columns
        .iter()
        .filter(|c| !find_info(live, &c.name).is_some_and(|info| !info.is_generated()))
        .all(|c| {
            !c.not_null
                || c.generated.is_some()
                || c.default.as_ref().is_some_and(|d| d.is_non_null())
                || table.is_rowid_alias(c)
        })
}

/// First unused `<table>_backup[N]` name.
#[must_use]
pub fn backup_name(table: &str, tables: &[String]) -> String {
    let taken = |name: &str| tables.iter().any(|t| t.eq_ignore_ascii_case(name));
    let base = format!("{table}_backup");
    if !taken(&base) {
        return base;
    }
    let mut n = 1_u32;
    loop {
        let name = format!("{base}{n}");
        if !taken(&name) {
            return name;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::GenericDialect;
    use crate::schema::DefaultValue;
    use crate::types::DataType;

    struct NoDropDialect;

    impl Dialect for NoDropDialect {
        fn name(&self) -> &'static str {
            "no-drop"
        }

        fn supports_drop_column(&self) -> bool {
            false
        }
    }

    fn info(cid: i64, name: &str, data_type: &str, not_null: bool, pk: i64) -> TableInfo {
        TableInfo {
            cid,
            name: name.to_string(),
            data_type: data_type.to_string(),
            not_null,
            default_value: None,
            pk,
            hidden: 0,
            constrained: false,
        }
    }

    fn users_live() -> Vec<TableInfo> {
        vec![
            info(0, "id", "INTEGER", true, 1),
            info(1, "name", "TEXT", false, 0),
            info(2, "surname", "TEXT", false, 0),
        ]
    }

    fn users(columns: &[&str]) -> TableSchema {
        let mut table = TableSchema::new("users").column(
            ColumnSchema::new("id", DataType::Integer)
                .not_null()
                .primary_key(),
        );
        for name in columns {
            table = table.column(ColumnSchema::new(*name, DataType::Text));
        }
        table
    }

    fn tables() -> Vec<String> {
        vec![String::from("users")]
    }

    #[test]
    fn test_missing_table_is_created() {
        let plan = plan_table(&users(&["name"]), None, &[], true, &GenericDialect);
        assert_eq!(plan.result(), SyncResult::NewTableCreated);
        assert_eq!(plan.steps(), &[SyncStep::CreateTable]);
        assert_eq!(
            plan.statements(&GenericDialect),
            vec![String::from(
                "CREATE TABLE \"users\" (\"id\" INTEGER NOT NULL PRIMARY KEY, \"name\" TEXT)"
            )]
        );
    }

    #[test]
    fn test_matching_table_is_in_sync() {
        let live = users_live();
        let plan = plan_table(
            &users(&["name", "surname"]),
            Some(&live),
            &tables(),
            false,
            &GenericDialect,
        );
        assert_eq!(plan.result(), SyncResult::AlreadyInSync);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_removal_uses_native_drop() {
        let live = users_live();
        let plan = plan_table(&users(&["name"]), Some(&live), &tables(), true, &GenericDialect);
        assert_eq!(plan.result(), SyncResult::OldColumnsRemoved);
        assert_eq!(
            plan.statements(&GenericDialect),
            vec![String::from("ALTER TABLE \"users\" DROP COLUMN \"surname\"")]
        );
    }

    #[test]
    fn test_removal_without_native_drop_rebuilds() {
        let live = users_live();
        let plan = plan_table(&users(&["name"]), Some(&live), &tables(), true, &NoDropDialect);
        assert_eq!(plan.result(), SyncResult::OldColumnsRemoved);
        assert_eq!(
            plan.steps(),
            &[SyncStep::Rebuild {
                backup: String::from("users_backup"),
                shared: vec![String::from("id"), String::from("name")],
            }]
        );
        assert_eq!(plan.statements(&NoDropDialect).len(), 5);

        let lossy = plan_table(&users(&["name"]), Some(&live), &tables(), false, &NoDropDialect);
        assert_eq!(lossy.result(), SyncResult::DroppedAndRecreated);
        assert!(lossy.loses_data());
    }

    #[test]
    fn test_constrained_removal_rebuilds() {
        let mut live = users_live();
        live[2].constrained = true;
        let plan = plan_table(&users(&["name"]), Some(&live), &tables(), true, &GenericDialect);
        assert_eq!(plan.result(), SyncResult::OldColumnsRemoved);
        assert_eq!(plan.removed(), ["surname"]);
        assert!(matches!(plan.steps(), [SyncStep::Rebuild { .. }]));
        assert!(!plan.loses_data());

        let lossy = plan_table(&users(&["name"]), Some(&live), &tables(), false, &GenericDialect);
        assert_eq!(lossy.steps(), &[SyncStep::DropAndCreate]);
        assert_eq!(lossy.result(), SyncResult::DroppedAndRecreated);
    }

    #[test]
    fn test_constrained_column_that_stays_is_ignored() {
        let mut live = users_live();
        live[1].constrained = true;
        let plan = plan_table(&users(&["name"]), Some(&live), &tables(), true, &GenericDialect);
        assert_eq!(
            plan.steps(),
            &[SyncStep::DropColumn {
                column: String::from("surname")
            }]
        );
    }

    #[test]
    fn test_nullable_and_defaulted_columns_are_added() {
        let live = users_live();
        let mut declared = users(&["name", "surname", "nickname"]);
        declared = declared.column(
            ColumnSchema::new("age", DataType::Integer)
                .not_null()
                .default_value(DefaultValue::Integer(0)),
        );
        let plan = plan_table(&declared, Some(&live), &tables(), false, &GenericDialect);
        assert_eq!(plan.result(), SyncResult::NewColumnsAdded);
        assert_eq!(plan.added(), ["nickname", "age"]);
    }

    #[test]
    fn test_required_column_forces_recreate() {
        let live = users_live();
        let declared = users(&["name", "surname"])
            .column(ColumnSchema::new("email", DataType::Text).not_null());
        for preserve in [true, false] {
            let plan = plan_table(&declared, Some(&live), &tables(), preserve, &GenericDialect);
            assert_eq!(plan.result(), SyncResult::DroppedAndRecreated);
            assert!(plan.loses_data());
        }
    }

    #[test]
    fn test_add_and_remove_together() {
        let live = users_live();
        let plan = plan_table(
            &users(&["name", "email"]),
            Some(&live),
            &tables(),
            true,
            &GenericDialect,
        );
        assert_eq!(plan.result(), SyncResult::NewColumnsAddedAndOldColumnsRemoved);
        assert_eq!(
            plan.steps(),
            &[
                SyncStep::DropColumn {
                    column: String::from("surname")
                },
                SyncStep::AddColumn {
                    column: ColumnSchema::new("email", DataType::Text)
                },
            ]
        );
    }

    #[test]
    fn test_type_mismatch_rebuilds_with_preserve() {
        let live = users_live();
        let mut declared = users(&["name"]);
        declared = declared.column(ColumnSchema::new("surname", DataType::Blob));
        let plan = plan_table(&declared, Some(&live), &tables(), true, &GenericDialect);
        assert_eq!(plan.mismatched(), ["surname"]);
        assert_eq!(plan.result(), SyncResult::DroppedAndRecreated);
        assert!(!plan.loses_data());
    }

    #[test]
    fn test_default_comparison_ignores_wrapping_parentheses() {
        let mut live = users_live();
        live[1].default_value = Some(String::from("('anon')"));
        let mut declared = users(&["surname"]);
        declared.columns.insert(
            1,
            ColumnSchema::new("name", DataType::Text)
                .default_value(DefaultValue::Text(String::from("anon"))),
        );
        let plan = plan_table(&declared, Some(&live), &tables(), true, &GenericDialect);
        assert_eq!(plan.result(), SyncResult::AlreadyInSync);
    }

    #[test]
    fn test_backup_name_avoids_existing_tables() {
        assert_eq!(backup_name("users", &tables()), "users_backup");
        let taken = vec![
            String::from("users"),
            String::from("users_backup"),
            String::from("users_backup1"),
        ];
        assert_eq!(backup_name("users", &taken), "users_backup2");
    }

    #[test]
    fn test_result_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncResult::OldColumnsRemoved).unwrap(),
            "\"old_columns_removed\""
        );
        assert_eq!(SyncResult::DroppedAndRecreated.to_string(), "dropped and recreated");
    }
}
