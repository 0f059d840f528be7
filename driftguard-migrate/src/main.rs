//! Driftguard Migration CLI Tool
//!
//! Command-line interface for reconciling a PostgreSQL database with a directory of
//! versioned SQL migrations. Suitable for CI/CD pipelines: errors are printed verbatim
//! and the process exits with status 1.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use driftguard::migration::{DirectorySource, Reconciler};
use driftguard_migrate::commands;
use driftguard_migrate::settings::{self, Overrides};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "driftguard-migrate")]
#[command(about = "Versioned schema migrations for PostgreSQL")]
#[command(version)]
struct Cli {
    /// Configuration file (default: config/driftguard.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Migrations directory path
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Schema holding the history table
    #[arg(long, global = true)]
    schema: Option<String>,

    /// History table name
    #[arg(long, global = true)]
    history_table: Option<String>,

    /// Treat the schema as owned by driftguard (required for `clean`)
    #[arg(long, global = true)]
    manage_schema: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Migrate,

    /// Show applied and pending migrations
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check applied migrations against local files without applying anything
    Validate,

    /// Drop the managed schema and recreate an empty history
    Clean {
        /// Confirm the destructive reset
        #[arg(long)]
        yes: bool,
    },

    /// Create an empty migration file with the next version
    New {
        /// Migration description, e.g. "create users"
        description: String,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let quiet = cli.quiet;
    match run(cli) {
        Ok(output) => {
            if !quiet {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let overrides = Overrides {
        database_url: cli.database_url,
        migrations_dir: cli.migrations_dir,
        schema: cli.schema,
        history_table: cli.history_table,
        manage_schema: cli.manage_schema,
    };
    let config = settings::resolve(cli.config.as_deref(), overrides)?;
    log::debug!("Using migrations from {}", config.migrations_dir.display());

    let connect = || Reconciler::from_config(&config);
    match cli.command {
        Commands::Migrate => commands::migrate(&connect()?),
        Commands::Status { json } => commands::status(&connect()?, json),
        Commands::Validate => commands::validate(&connect()?),
        Commands::Clean { yes } => {
            commands::confirm_clean(&config.target(), yes)?;
            commands::clean(&connect()?, yes)
        }
        Commands::New { description } => {
            commands::new_migration(&DirectorySource::from_config(&config), &description)
        }
    }
}
