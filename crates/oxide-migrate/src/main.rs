//! oxide-migrate CLI
//!
//! Command-line tool that synchronizes a database with an entity model.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::load_entities;
use oxide_migrate::prelude::*;
use oxide_schema::builder::SchemaBuilder;
use oxide_schema::diff::SchemaDiffer;
use oxide_schema::operation::Operation;
use oxide_schema::render::{render_builder_code, render_migration, render_schema_sql, render_sql};
use oxide_schema::schema::SchemaSpec;
use oxide_schema::types::TypeRegistry;

/// Synchronizes a relational schema with an entity model.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:`, `mysql:` or `mariadb:`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Entity metadata file (JSON array).
    #[arg(short, long, env = "OXIDE_ENTITIES", default_value = "entities.json")]
    entities: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL that creates the model from scratch.
    Schema,

    /// Show the operations needed to bring the database up to date.
    Diff {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = Format::Sql)]
        format: Format,
    },

    /// Generate a migration with up/down operations.
    Generate {
        /// Migration identifier, e.g. `0002_add_email`.
        #[arg(short, long, default_value = "0001_auto")]
        name: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply pending changes to the database.
    Migrate {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Roll back everything on failure instead of keeping applied
        /// operations.
        #[arg(long)]
        atomic: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// DDL statements for the target platform.
    Sql,
    /// Rust builder expressions.
    Code,
}

fn main() -> anyhow::Result<()> {
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
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = TypeRegistry::with_builtin_types();
    let entities = load_entities(&cli.entities)?;
    let desired = SchemaBuilder::new(&registry).build(&entities)?;
    info!(
        entities = entities.len(),
        tables = desired.tables.len(),
        "Loaded entity model"
    );

    match cli.command {
        Commands::Schema => {
            let platform = Backend::from_url(&cli.database)?.platform();
            for sql in render_schema_sql(&desired, platform, &registry)? {
                println!("{sql};");
            }
        }

        Commands::Diff { format } => {
            let mut conn = connect(&cli.database)?;
            let ops = pending(&registry, &mut conn, &desired)?;
            if ops.is_empty() {
                info!("No changes detected.");
                return Ok(());
            }
            match format {
                Format::Sql => {
                    for sql in render_sql(&ops, conn.platform(), &registry)? {
                        println!("{sql};");
                    }
                }
                Format::Code => println!("{}", render_builder_code(&ops)),
            }
        }

        Commands::Generate { name, output } => {
            let mut conn = connect(&cli.database)?;
            let ops = pending(&registry, &mut conn, &desired)?;
            if ops.is_empty() {
                info!("No changes detected.");
                return Ok(());
            }
            let code = render_migration(&name, &ops);
            match output {
                Some(path) => {
                    if let Some(dir) = path.parent() {
                        std::fs::create_dir_all(dir)?;
                    }
                    std::fs::write(&path, code)?;
                    info!("Created migration: {}", path.display());
                }
                None => println!("{code}"),
            }
        }

        Commands::Migrate { dry_run, atomic } => {
            let mut conn = connect(&cli.database)?;
            let ops = pending(&registry, &mut conn, &desired)?;
            let mode = if atomic {
                TransactionMode::Atomic
            } else {
                TransactionMode::Savepoints
            };

            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }
            let report = MigrationExecutor::new(&registry)
                .with_options(ApplyOptions { mode, dry_run })
                .apply(&mut conn, &ops)?;

            if dry_run {
                for sql in &report.statements {
                    println!("{sql};");
                }
            } else {
                info!(
                    "Applied {} operation(s), {} statement(s).",
                    report.operations_applied,
                    report.statements.len()
                );
            }
        }
    }

    Ok(())
}

/// Operations that take the live database to the desired schema.
fn pending(
    registry: &TypeRegistry,
    conn: &mut AnyConnection,
    desired: &SchemaSpec,
) -> anyhow::Result<Vec<Operation>> {
    let current = Introspector::new(registry).introspect(conn)?;
    let ops = SchemaDiffer::new(registry)
        .for_platform(conn.platform())
        .diff(&current, desired)?;
    for op in &ops {
        info!("  {op}");
    }
    Ok(ops)
}
