//! CLI error types and result alias.

use keel_migrate::{DRIFT_REMEDIATION, ErrorKind, MigrationError};
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(keel::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(keel::config))]
    Config(String),

    /// Disk and ledger disagree
    #[error("{error}")]
    #[diagnostic(code(keel::drift))]
    Drift {
        /// The drift found
        error: MigrationError,
        /// How to recover
        #[help]
        remediation: &'static str,
    },

    /// Connection, timeout, or transaction failure
    #[error("{0}")]
    #[diagnostic(
        code(keel::database),
        help("check DATABASE_URL and that the server is reachable, then rerun")
    )]
    Database(MigrationError),

    /// Any other migration failure
    #[error("{0}")]
    #[diagnostic(code(keel::migration))]
    Migration(MigrationError),

    /// A destructive action needs confirmation that cannot be given
    #[error("{0}")]
    #[diagnostic(code(keel::confirm), help("rerun with --force to proceed"))]
    ConfirmationRequired(String),

    /// The user declined a prompt
    #[error("{0}")]
    #[diagnostic(code(keel::aborted))]
    Aborted(String),

    /// Command usage error
    #[error("{0}")]
    #[diagnostic(code(keel::command))]
    Command(String),
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err.kind() {
            ErrorKind::Drift => CliError::Drift {
                error: err,
                remediation: DRIFT_REMEDIATION,
            },
            ErrorKind::Infrastructure => CliError::Database(err),
            _ => CliError::Migration(err),
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Command(format!("Failed to encode JSON: {}", err))
    }
}
