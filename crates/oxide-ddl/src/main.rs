//! oxide-ddl CLI
//!
//! Command-line tool for exporting diagram schemas as DDL and generating
//! migrations between two snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_ddl::prelude::*;

/// Dialect-aware DDL export and migration synthesis.
#[derive(Parser)]
#[command(name = "oxide-ddl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or write the DDL of a schema.
    Export {
        /// Schema document (JSON).
        schema: PathBuf,

        /// Target dialect (mysql, mariadb, postgres, sqlite, mssql).
        #[arg(short, long, env = "OXIDE_DDL_DIALECT")]
        dialect: Dialect,

        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite the output file if it exists.
        #[arg(long)]
        force: bool,
    },

    /// Print the change map between two schema snapshots.
    Diff {
        /// Older snapshot.
        old: PathBuf,

        /// Newer snapshot.
        new: PathBuf,

        /// Extra key name or dotted path to ignore.
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Compare presentation keys (coordinates, colors) too.
        #[arg(long)]
        all_keys: bool,
    },

    /// Generate up and down migration scripts between two snapshots.
    Migrate {
        /// Older snapshot.
        old: PathBuf,

        /// Newer snapshot.
        new: PathBuf,

        /// Target dialect (mysql, mariadb, postgres, sqlite, mssql).
        #[arg(short, long, env = "OXIDE_DDL_DIALECT")]
        dialect: Dialect,

        /// Migrations directory.
        #[arg(short, long, env = "OXIDE_DDL_OUT_DIR", default_value = "migrations")]
        out_dir: PathBuf,

        /// Extra key name or dotted path to ignore.
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Print the scripts instead of writing files.
        #[arg(long)]
        stdout: bool,
    },
}

fn read_document(path: &Path) -> anyhow::Result<serde_json::Value> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn load(path: &Path) -> anyhow::Result<Schema> {
    Schema::from_value(read_document(path)?)
        .with_context(|| format!("Invalid schema in {}", path.display()))
}

fn ignore_keys(extra: Vec<String>, all_keys: bool) -> IgnoreKeys {
    let mut keys = if all_keys {
        IgnoreKeys::new()
    } else {
        IgnoreKeys::presentation()
    };
    keys.extend(extra);
    keys
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

    match cli.command {
        Commands::Export {
            schema,
            dialect,
            output,
            force,
        } => {
            let sql = emit(&load(&schema)?, dialect)?;
            match output {
                Some(path) => write_script(&path, &sql, force)?,
                None => print!("{sql}"),
            }
        }

        Commands::Diff {
            old,
            new,
            ignore,
            all_keys,
        } => {
            // Raw documents, so editor-only keys stay visible to --all-keys
            let older = read_document(&old)?;
            let newer = read_document(&new)?;
            let changes = diff(&older, &newer, &ignore_keys(ignore, all_keys));
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }

        Commands::Migrate {
            old,
            new,
            dialect,
            out_dir,
            ignore,
            stdout,
        } => {
            let from = load(&old)?;
            let to = load(&new)?;
            let changes = diff_schemas(&from, &to, &ignore_keys(ignore, false))?;
            let migration = synthesize(&changes, dialect, Snapshots::new(&from, &to))?;

            if migration.is_empty() {
                info!("No migration needed.");
            } else if stdout {
                println!("-- up\n{}", migration.up);
                println!("-- down\n{}", migration.down);
            } else {
                MigrationWriter::new(out_dir).write(&migration)?;
            }
        }
    }

    Ok(())
}
