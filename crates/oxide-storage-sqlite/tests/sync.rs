//! Schema synchronization against live SQLite databases.

use oxide_storage_core::schema::TableSchema;
use oxide_storage_core::{Registry, SyncResult};
use oxide_storage_derive::Table;
use oxide_storage_sqlite::introspect::{
    foreign_key_violations, foreign_keys_enabled, list_tables, row_count, table_info,
};
use oxide_storage_sqlite::{ConnectOptions, SchemaSync, SqliteDialect, Storage, StorageError};

#[derive(Table, Debug, Default, Clone, PartialEq)]
#[table(name = "users")]
struct User {
    #[column(primary_key)]
    id: i64,
    name: String,
}

#[derive(Table, Debug, Default, Clone, PartialEq)]
#[table(name = "users")]
struct UserWithNickname {
    #[column(primary_key)]
    id: i64,
    name: String,
    nickname: Option<String>,
}

#[derive(Table, Debug, Default, Clone, PartialEq)]
#[table(name = "users")]
struct UserWithScore {
    #[column(primary_key)]
    id: i64,
    name: String,
    #[column(default = "0")]
    score: i64,
}

#[derive(Table, Debug, Default, Clone, PartialEq)]
#[table(name = "users")]
struct UserWithAge {
    #[column(primary_key)]
    id: i64,
    name: String,
    age: i64,
}

#[derive(Table, Debug, Default, Clone, PartialEq)]
#[table(name = "authors")]
struct Author {
    #[column(primary_key)]
    id: i64,
    name: String,
}

const USERS_WITH_SURNAME: &str =
    "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, surname TEXT)";
const USERS: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL)";
const SEED: &str = "INSERT INTO users (id, name) VALUES (1, 'ann'), (2, 'ben'), (3, 'cat')";

async fn open(options: &ConnectOptions, registry: Registry, live: &[&str]) -> Storage {
    let storage = Storage::connect(options, registry)
        .await
        .expect("Failed to open in-memory storage");
    for sql in live {
        sqlx::query(sql).execute(storage.pool()).await.unwrap();
    }
    storage
}

async fn names(storage: &Storage) -> Vec<String> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM users ORDER BY id")
        .fetch_all(storage.pool())
        .await
        .unwrap();
    rows.into_iter().map(|(name,)| name).collect()
}

async fn column_names(storage: &Storage) -> Vec<String> {
    table_info(storage.pool(), "users")
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect()
}

// ============================================================================
// Removing columns
// ============================================================================

#[tokio::test]
async fn test_removed_column_keeps_rows() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(User::table()),
        &[USERS_WITH_SURNAME, SEED],
    )
    .await;

    let results = storage.sync_schema(true).await.unwrap();
    assert_eq!(results["users"], SyncResult::OldColumnsRemoved);
    assert_eq!(column_names(&storage).await, ["id", "name"]);
    assert_eq!(names(&storage).await, ["ann", "ben", "cat"]);
}

#[tokio::test]
async fn test_drop_column_fallback_still_reports_removal() {
    let storage = open(
        &ConnectOptions::in_memory().drop_column(false),
        Registry::new().with(User::table()),
        &[USERS_WITH_SURNAME, SEED],
    )
    .await;

    let results = storage.sync_schema(true).await.unwrap();
    assert_eq!(results["users"], SyncResult::OldColumnsRemoved);
    assert_eq!(column_names(&storage).await, ["id", "name"]);
    assert_eq!(names(&storage).await, ["ann", "ben", "cat"]);
    assert_eq!(list_tables(storage.pool()).await.unwrap(), ["users"]);
}

#[tokio::test]
async fn test_drop_column_fallback_without_preserve_discards_rows() {
    let storage = open(
        &ConnectOptions::in_memory().drop_column(false),
        Registry::new().with(User::table()),
        &[USERS_WITH_SURNAME, SEED],
    )
    .await;

    let results = storage.sync_schema(false).await.unwrap();
    assert_eq!(results["users"], SyncResult::DroppedAndRecreated);
    assert_eq!(column_names(&storage).await, ["id", "name"]);
    assert_eq!(row_count(storage.pool(), "users").await.unwrap(), 0);
}

// ============================================================================
// Adding columns
// ============================================================================

#[tokio::test]
async fn test_nullable_column_is_added_in_place() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(UserWithNickname::table()),
        &[USERS, SEED],
    )
    .await;

    let results = storage.sync_schema(false).await.unwrap();
    assert_eq!(results["users"], SyncResult::NewColumnsAdded);
    let users: Vec<UserWithNickname> = storage.get_all().await.unwrap();
    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u.nickname.is_none()));
}

#[tokio::test]
async fn test_defaulted_column_is_added_in_place() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(UserWithScore::table()),
        &[USERS, SEED],
    )
    .await;

    let results = storage.sync_schema(false).await.unwrap();
    assert_eq!(results["users"], SyncResult::NewColumnsAdded);
    let users: Vec<UserWithScore> = storage.get_all().await.unwrap();
    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u.score == 0));
}

#[tokio::test]
async fn test_required_column_forces_recreate() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(UserWithAge::table()),
        &[USERS, SEED],
    )
    .await;

    let results = storage.sync_schema(true).await.unwrap();
    assert_eq!(results["users"], SyncResult::DroppedAndRecreated);
    assert_eq!(column_names(&storage).await, ["id", "name", "age"]);
    assert_eq!(row_count(storage.pool(), "users").await.unwrap(), 0);
}

#[tokio::test]
async fn test_added_and_removed_columns_together() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(UserWithNickname::table()),
        &[USERS_WITH_SURNAME, SEED],
    )
    .await;

    let results = storage.sync_schema(false).await.unwrap();
    assert_eq!(
        results["users"],
        SyncResult::NewColumnsAddedAndOldColumnsRemoved
    );
    assert_eq!(column_names(&storage).await, ["id", "name", "nickname"]);
    assert_eq!(names(&storage).await, ["ann", "ben", "cat"]);
}

// ============================================================================
// Recreate
// ============================================================================

#[tokio::test]
async fn test_type_change_rebuild_preserves_rows() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(UserWithScore::table()),
        &[
            "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, score TEXT)",
            SEED,
        ],
    )
    .await;
    sqlx::query("UPDATE users SET score = '7'")
        .execute(storage.pool())
        .await
        .unwrap();

    let results = storage.sync_schema(true).await.unwrap();
    assert_eq!(results["users"], SyncResult::DroppedAndRecreated);
    let users: Vec<UserWithScore> = storage.get_all().await.unwrap();
    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u.score == 7));
    assert_eq!(list_tables(storage.pool()).await.unwrap(), ["users"]);
}

// ============================================================================
// Constrained columns and foreign keys
// ============================================================================

const AUTHORS: &str =
    "CREATE TABLE authors (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, bio TEXT)";
const AUTHOR_ROWS: &str = "INSERT INTO authors (id, name) VALUES (1, 'ann'), (2, 'ben')";
const BOOKS_CASCADE: &str = "CREATE TABLE books (id INTEGER PRIMARY KEY, \
     author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE)";
const BOOKS: &str = "CREATE TABLE books (id INTEGER PRIMARY KEY, \
     author_id INTEGER NOT NULL REFERENCES authors(id))";
const BOOK_ROWS: &str = "INSERT INTO books (id, author_id) VALUES (1, 1), (2, 2)";

async fn author_columns(storage: &Storage) -> Vec<String> {
    table_info(storage.pool(), "authors")
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect()
}

#[tokio::test]
async fn test_parent_rebuild_keeps_child_rows() {
    for books in [BOOKS_CASCADE, BOOKS] {
        for drop_column in [false, true] {
            let storage = open(
                &ConnectOptions::in_memory().drop_column(drop_column),
                Registry::new().with(Author::table()),
                &[AUTHORS, AUTHOR_ROWS, books, BOOK_ROWS],
            )
            .await;

            let results = storage.sync_schema(true).await.unwrap();
            assert_eq!(results["authors"], SyncResult::OldColumnsRemoved, "{books}");
            assert_eq!(author_columns(&storage).await, ["id", "name"]);
            assert_eq!(row_count(storage.pool(), "authors").await.unwrap(), 2);
            assert_eq!(row_count(storage.pool(), "books").await.unwrap(), 2, "{books}");
            assert!(foreign_key_violations(storage.pool()).await.unwrap().is_empty());
            assert!(foreign_keys_enabled(storage.pool()).await.unwrap());
        }
    }
}

#[tokio::test]
async fn test_recreate_refuses_to_orphan_child_rows() {
    let storage = open(
        &ConnectOptions::in_memory().drop_column(false),
        Registry::new().with(Author::table()),
        &[AUTHORS, AUTHOR_ROWS, BOOKS_CASCADE, BOOK_ROWS],
    )
    .await;

    let err = storage.sync_schema(false).await.unwrap_err();
    match err {
        StorageError::ForeignKeyCheck {
            table,
            child,
            parent,
            rows,
        } => {
            assert_eq!(table, "authors");
            assert_eq!(child, "books");
            assert_eq!(parent, "authors");
            assert_eq!(rows, 2);
        }
        other => panic!("expected a foreign key check failure, got {other:?}"),
    }

    assert_eq!(author_columns(&storage).await, ["id", "name", "bio"]);
    assert_eq!(row_count(storage.pool(), "authors").await.unwrap(), 2);
    assert_eq!(row_count(storage.pool(), "books").await.unwrap(), 2);
    assert!(foreign_keys_enabled(storage.pool()).await.unwrap());
}

#[tokio::test]
async fn test_unique_column_is_removed_by_rebuild() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(User::table()),
        &[
            "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, \
             email TEXT UNIQUE)",
            "INSERT INTO users VALUES (1, 'ann', 'ann@example.com')",
        ],
    )
    .await;

    let simulated = storage.sync_schema_simulate(true).await.unwrap();
    let executed = storage.sync_schema(true).await.unwrap();
    assert_eq!(simulated, executed);
    assert_eq!(executed["users"], SyncResult::OldColumnsRemoved);
    assert_eq!(column_names(&storage).await, ["id", "name"]);
    assert_eq!(names(&storage).await, ["ann"]);
    assert_eq!(
        storage.sync_schema(true).await.unwrap()["users"],
        SyncResult::AlreadyInSync
    );
}

// ============================================================================
// Simulation and idempotence
// ============================================================================

const SCENARIOS: [&[&str]; 8] = [
    &[],
    &[USERS, SEED],
    &[USERS_WITH_SURNAME, SEED],
    &[
        "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL)",
        "INSERT INTO users (id) VALUES (1), (2)",
    ],
    &[
        "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name BLOB NOT NULL)",
        "INSERT INTO users VALUES (1, x'00')",
    ],
    &[
        "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, \
         email TEXT UNIQUE)",
        SEED,
    ],
    &[
        USERS_WITH_SURNAME,
        "CREATE INDEX users_surname ON users (surname)",
        SEED,
    ],
    &[
        "CREATE TABLE teams (id INTEGER PRIMARY KEY NOT NULL)",
        "INSERT INTO teams (id) VALUES (1)",
        "CREATE TABLE users (id INTEGER PRIMARY KEY NOT NULL, name TEXT NOT NULL, \
         team_id INTEGER REFERENCES teams(id))",
        SEED,
        "UPDATE users SET team_id = 1",
    ],
];

#[tokio::test]
async fn test_simulate_matches_execute() {
    for drop_column in [true, false] {
        for preserve in [false, true] {
            for live in SCENARIOS {
                let options = ConnectOptions::in_memory().drop_column(drop_column);
                let storage = open(&options, Registry::new().with(User::table()), live).await;

                let before = table_info(storage.pool(), "users").await.unwrap();
                let simulated = storage.sync_schema_simulate(preserve).await.unwrap();
                let untouched = table_info(storage.pool(), "users").await.unwrap();
                assert_eq!(before, untouched, "simulation ran DDL for {live:?}");

                let executed = storage.sync_schema(preserve).await.unwrap();
                assert_eq!(
                    simulated, executed,
                    "drop_column={drop_column} preserve={preserve} live={live:?}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_new_table_then_in_sync() {
    let storage = open(
        &ConnectOptions::in_memory(),
        Registry::new().with(User::table()),
        &[],
    )
    .await;
    let plans = storage.plan_schema(false).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].result(), SyncResult::NewTableCreated);
    assert!(list_tables(storage.pool()).await.unwrap().is_empty());

    let first = storage.sync_schema(false).await.unwrap();
    assert_eq!(first["users"], SyncResult::NewTableCreated);
    let second = storage.sync_schema(false).await.unwrap();
    assert_eq!(second["users"], SyncResult::AlreadyInSync);
    assert!(storage.plan_schema(true).await.unwrap()[0].is_noop());
}

#[tokio::test]
async fn test_schema_sync_on_plain_schemas() {
    let pool = ConnectOptions::in_memory().connect().await.unwrap();
    let tables: Vec<TableSchema> = notes_schema();
    let sync = SchemaSync::new(pool.clone(), SqliteDialect::new()).preserve(true);

    let dry = sync.clone().dry_run(true).run(&tables).await.unwrap();
    assert_eq!(dry[0].result(), SyncResult::NewTableCreated);
    assert!(list_tables(&pool).await.unwrap().is_empty());

    let applied = sync.run(&tables).await.unwrap();
    assert_eq!(applied[0].result(), SyncResult::NewTableCreated);
    assert_eq!(
        applied[0].statements(sync.dialect()),
        dry[0].statements(sync.dialect())
    );
    assert_eq!(list_tables(&pool).await.unwrap(), ["notes"]);
    assert_eq!(
        sync.run(&tables).await.unwrap()[0].result(),
        SyncResult::AlreadyInSync
    );
}

#[tokio::test]
async fn test_quoted_names_round_trip() {
    use oxide_storage_core::schema::ColumnSchema;
    use oxide_storage_core::DataType;

    let pool = ConnectOptions::in_memory().connect().await.unwrap();
    let sync = SchemaSync::new(pool.clone(), SqliteDialect::new()).preserve(true);
    let base = TableSchema::new("say \"hi\"").column(
        ColumnSchema::new("id", DataType::Integer)
            .not_null()
            .primary_key(),
    );
    let declared = base
        .clone()
        .column(ColumnSchema::new("a\"b", DataType::Text));

    let created = sync.run(std::slice::from_ref(&declared)).await.unwrap();
    assert_eq!(created[0].result(), SyncResult::NewTableCreated);
    assert_eq!(list_tables(&pool).await.unwrap(), ["say \"hi\""]);
    let columns: Vec<String> = table_info(&pool, "say \"hi\"")
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(columns, ["id", "a\"b"]);
    assert_eq!(
        sync.run(std::slice::from_ref(&declared)).await.unwrap()[0].result(),
        SyncResult::AlreadyInSync
    );

    sqlx::query("INSERT INTO \"say \"\"hi\"\"\" (id, \"a\"\"b\") VALUES (1, 'x')")
        .execute(&pool)
        .await
        .unwrap();
    let renamed = base.column(ColumnSchema::new("c\"d", DataType::Text));
    let changed = sync.run(std::slice::from_ref(&renamed)).await.unwrap();
    assert_eq!(
        changed[0].result(),
        SyncResult::NewColumnsAddedAndOldColumnsRemoved
    );
    assert_eq!(row_count(&pool, "say \"hi\"").await.unwrap(), 1);
    assert_eq!(
        sync.run(&[renamed]).await.unwrap()[0].result(),
        SyncResult::AlreadyInSync
    );
}

fn notes_schema() -> Vec<TableSchema> {
    use oxide_storage_core::schema::{ColumnSchema, DefaultValue};
    use oxide_storage_core::DataType;

    vec![TableSchema::new("notes")
        .column(
            ColumnSchema::new("id", DataType::Integer)
                .not_null()
                .primary_key(),
        )
        .column(ColumnSchema::new("body", DataType::Text).not_null())
        .column(
            ColumnSchema::new("created_at", DataType::Text)
                .default_value(DefaultValue::Expression(String::from("CURRENT_TIMESTAMP"))),
        )]
}
