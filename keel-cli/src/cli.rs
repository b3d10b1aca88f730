//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Keel - PostgreSQL schema migrations
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version)]
#[command(about = "Keel - PostgreSQL schema migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted before or after any subcommand
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Migrations directory [env: KEEL_MIGRATIONS_DIR] [default: migrations]
    #[arg(long, global = true, value_name = "DIR")]
    pub migrations_dir: Option<PathBuf>,

    /// Target schema [env: KEEL_TARGET_SCHEMA] [default: public]
    #[arg(long, global = true, value_name = "SCHEMA")]
    pub schema: Option<String>,

    /// PostgreSQL connection URL [env: DATABASE_URL]
    #[arg(long, global = true, value_name = "URL")]
    pub database_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the migrations directory and the ledger table
    Init,

    /// Apply pending migrations to the database
    Up,

    /// Show applied and pending migrations
    Status(StatusArgs),

    /// Generate a new migration file
    New(NewArgs),

    /// Drop the target schema and reapply all migrations
    Reset(ForceArgs),

    /// Drop the target schema without reapplying migrations
    Dropall(ForceArgs),
}

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `new` command
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Create the migrations directory if it is missing [env: KEEL_FORCE]
    #[arg(long)]
    pub force: bool,

    /// Short description, used for the file name
    #[arg(required = true, value_name = "DESCRIPTION")]
    pub description: Vec<String>,
}

/// Arguments for destructive commands
#[derive(Args, Debug)]
pub struct ForceArgs {
    /// Skip the confirmation prompt [env: KEEL_FORCE]
    #[arg(long)]
    pub force: bool,
}
