//! oxide-storage CLI
//!
//! Command-line tool for inspecting a SQLite database and synchronizing it
//! with a JSON schema file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_storage_core::dialect::Dialect;
use oxide_storage_core::schema::TableSchema;
use oxide_storage_core::Registry;
use oxide_storage_sqlite::introspect;
use oxide_storage_sqlite::{ConnectOptions, SchemaSync, Storage};

/// Schema inspection and synchronization for SQLite.
#[derive(Parser)]
#[command(name = "oxide-storage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Create the database file if it does not exist.
    #[arg(long)]
    create: bool,

    /// Never use ALTER TABLE ... DROP COLUMN, whatever the library version.
    #[arg(long)]
    no_drop_column: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List user tables with their row counts.
    Tables,

    /// Show the columns of a table as the catalog reports them.
    Describe {
        /// Table name.
        table: String,
    },

    /// Synchronize tables with a JSON schema file.
    Sync {
        /// Path to a JSON array of table schemas.
        #[arg(short, long)]
        schema: PathBuf,

        /// Copy shared columns across a table rebuild instead of dropping rows.
        #[arg(short, long)]
        preserve: bool,

        /// Show the plan and its SQL without executing.
        #[arg(long)]
        dry_run: bool,

        /// Print the plans as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn parse_schema(text: &str) -> anyhow::Result<Vec<TableSchema>> {
    let tables: Vec<TableSchema> = serde_json::from_str(text)?;
    if let Some(table) = tables.iter().find(|t| t.columns.is_empty()) {
        anyhow::bail!("table `{}` declares no columns", table.name);
    }
    Ok(tables)
}

fn load_schema(path: &Path) -> anyhow::Result<Vec<TableSchema>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    parse_schema(&text).with_context(|| format!("Invalid schema file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = ConnectOptions::new(&cli.database).create_if_missing(cli.create);
    if cli.no_drop_column {
        options = options.drop_column(false);
    }
    let storage = Storage::connect(&options, Registry::new()).await?;
    info!(
        database = %cli.database,
        drop_column = storage.dialect().supports_drop_column(),
        "Connected"
    );

    match cli.command {
        Commands::Tables => {
            let tables = introspect::list_tables(storage.pool()).await?;
            if tables.is_empty() {
                info!("No tables found.");
            }
            for table in &tables {
                let rows = introspect::row_count(storage.pool(), table).await?;
                println!("{table:<40} {rows:>10}");
            }
        }

        Commands::Describe { table } => {
            let columns = introspect::table_info(storage.pool(), &table).await?;
            if columns.is_empty() {
                anyhow::bail!("table `{table}` does not exist");
            }
            println!(
                "{:<4} {:<24} {:<16} {:<8} {:<4} DEFAULT",
                "CID", "NAME", "TYPE", "NOTNULL", "PK"
            );
            println!("{:-<72}", "");
            for column in &columns {
                println!(
                    "{:<4} {:<24} {:<16} {:<8} {:<4} {}",
                    column.cid,
                    column.name,
                    column.data_type,
                    column.not_null,
                    column.pk,
                    column.default_value.as_deref().unwrap_or("")
                );
            }
        }

        Commands::Sync {
            schema,
            preserve,
            dry_run,
            json,
        } => {
            let tables = load_schema(&schema)?;
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }

            let sync = SchemaSync::new(storage.pool().clone(), *storage.dialect())
                .preserve(preserve)
                .dry_run(dry_run);
            let plans = sync.run(&tables).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else {
                for plan in &plans {
                    println!("{}: {}", plan.table_name(), plan.result());
                    if dry_run {
                        for sql in plan.statements(sync.dialect()) {
                            println!("    {sql};");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
