//! Error types for the migration engine.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::drift::DriftError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Broad classification of a [`MigrationError`].
///
/// Callers use this to decide how to report a failure: precondition and
/// malformed-input errors need a fix on disk, drift needs a reset, and
/// infrastructure errors can be retried by rerunning the whole invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unreadable migrations directory, invalid target schema.
    Precondition,
    /// Bad filename shape or duplicate version.
    MalformedInput,
    /// The ledger and the migrations directory disagree.
    Drift,
    /// Connection, timeout, or transaction begin/commit failure.
    Infrastructure,
    /// The migration SQL or its ledger insert failed and was rolled back.
    Execution,
}

/// Stage of a single migration's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    /// Opening the transaction.
    Begin,
    /// Setting `search_path` and the statement deadline.
    Scope,
    /// Running the migration body.
    Execute,
    /// Inserting the ledger row.
    Record,
    /// Committing.
    Commit,
    /// The apply deadline expired; the transaction was rolled back.
    Deadline,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Begin => "begin transaction for",
            Self::Scope => "scope transaction for",
            Self::Execute => "execute migration",
            Self::Record => "record migration",
            Self::Commit => "commit migration",
            Self::Deadline => "deadline expired applying",
        };
        f.write_str(label)
    }
}

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory does not exist.
    #[error("migrations directory {} does not exist; run `keel init` first", .0.display())]
    MissingDirectory(PathBuf),

    /// The migrations path exists but is not a directory.
    #[error("migrations path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The migrations directory could not be listed.
    #[error("read migrations directory {}: {source}", path.display())]
    ReadDirectory {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A previously applied migration could not be inspected on disk.
    #[error("stat migration {filename}: {source}")]
    StatMigration {
        /// Migration filename.
        filename: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The target schema name was rejected.
    #[error("invalid target schema: {0}")]
    InvalidSchema(String),

    /// A `.sql` file does not follow `<14 digits>_<slug>.sql`.
    #[error("invalid migration filename: {filename} ({reason})")]
    InvalidFilename {
        /// Offending filename.
        filename: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A new migration file would overwrite an existing one.
    #[error("migration already exists: {0}")]
    MigrationExists(String),

    /// A new migration file could not be written.
    #[error("write migration {filename}: {source}")]
    WriteMigration {
        /// Migration filename.
        filename: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Two files share the same version prefix.
    #[error("duplicate migration version {version} ({first} and {second})")]
    DuplicateVersion {
        /// Shared version.
        version: String,
        /// First filename in sort order.
        first: String,
        /// Second filename in sort order.
        second: String,
    },

    /// The ledger does not match the migrations on disk.
    #[error(transparent)]
    Drift(#[from] DriftError),

    /// A migration body could not be read at apply time.
    #[error("read migration {filename}: {source}")]
    ReadMigration {
        /// Migration filename.
        filename: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A database call did not finish within its deadline.
    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// What was being attempted.
        operation: String,
        /// The deadline that expired.
        timeout: Duration,
    },

    /// Connection or query failure outside a migration transaction.
    #[error("database error: {0}")]
    Database(String),

    /// A step inside a migration transaction failed.
    #[error("{stage} {filename}: {message}")]
    Apply {
        /// Which step failed.
        stage: ApplyStage,
        /// Migration filename.
        filename: String,
        /// Database message.
        message: String,
    },
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an error for a failed step of a migration transaction.
    pub fn apply(stage: ApplyStage, filename: impl Into<String>, msg: impl fmt::Display) -> Self {
        Self::Apply {
            stage,
            filename: filename.into(),
            message: msg.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingDirectory(_)
            | Self::NotADirectory(_)
            | Self::ReadDirectory { .. }
            | Self::StatMigration { .. }
            | Self::InvalidSchema(_)
            | Self::ReadMigration { .. }
            | Self::MigrationExists(_)
            | Self::WriteMigration { .. } => ErrorKind::Precondition,
            Self::InvalidFilename { .. } | Self::DuplicateVersion { .. } => {
                ErrorKind::MalformedInput
            }
            Self::Drift(_) => ErrorKind::Drift,
            Self::Timeout { .. } | Self::Database(_) => ErrorKind::Infrastructure,
            Self::Apply { stage, .. } => match stage {
                ApplyStage::Execute | ApplyStage::Record => ErrorKind::Execution,
                ApplyStage::Begin
                | ApplyStage::Scope
                | ApplyStage::Commit
                | ApplyStage::Deadline => ErrorKind::Infrastructure,
            },
        }
    }

    /// Check if this is a drift error.
    pub fn is_drift(&self) -> bool {
        self.kind() == ErrorKind::Drift
    }

    /// Check if rerunning the same invocation unchanged could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }

    /// The migration this error concerns, when there is one.
    pub fn migration(&self) -> Option<&str> {
        match self {
            Self::StatMigration { filename, .. }
            | Self::ReadMigration { filename, .. }
            | Self::WriteMigration { filename, .. }
            | Self::InvalidFilename { filename, .. }
            | Self::Apply { filename, .. } => Some(filename),
            Self::Drift(drift) => Some(drift.filename()),
            _ => None,
        }
    }
}
