//! Error types for PostgreSQL operations.

use keel_migrate::MigrationError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL error.
    #[error("postgres error: {}", describe(.0))]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if the server cancelled the statement, which is how
    /// `statement_timeout` expiry is reported.
    pub fn is_statement_timeout(&self) -> bool {
        self.sqlstate() == Some(tokio_postgres::error::SqlState::QUERY_CANCELED.code())
    }

    /// The SQLSTATE code, for errors reported by the server.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }
}

/// Server message with severity and SQLSTATE when available.
fn describe(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => {
            let mut msg = format!("{}: {} (SQLSTATE {})", db.severity(), db.message(), db.code().code());
            if let Some(detail) = db.detail() {
                msg.push_str(&format!("; {}", detail));
            }
            msg
        }
        None => err.to_string(),
    }
}

impl From<PgError> for MigrationError {
    fn from(err: PgError) -> Self {
        MigrationError::database(err.to_string())
    }
}
