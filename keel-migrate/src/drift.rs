//! Drift detection between the migrations directory and the ledger.
//!
//! The ledger, read in version order, must equal a prefix of the migrations on
//! disk. Each position of that prefix is checked against an ordered list of
//! [`DriftRule`]s; the first rule that fails stops the check.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::file::MigrationFile;
use crate::ledger::LedgerEntry;

/// What to do about drift.
pub const DRIFT_REMEDIATION: &str =
    "run `keel reset` to drop the target schema and reapply every migration from disk";

/// A specific disagreement between disk and ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftError {
    /// The ledger holds more entries than there are files.
    #[error(
        "detected drift: database reports {recorded} applied migrations but only {on_disk} exist on disk (first unaccounted: {first_unaccounted})"
    )]
    LedgerAhead {
        /// Ledger length.
        recorded: usize,
        /// Number of migration files.
        on_disk: usize,
        /// First ledger entry with no file at its position.
        first_unaccounted: String,
    },

    /// The file at a ledger position has a different version.
    #[error("detected drift: expected migration {expected} but database lists {recorded}")]
    VersionMismatch {
        /// File on disk at this position.
        expected: String,
        /// Ledger entry at this position.
        recorded: String,
    },

    /// Same version, different file name.
    #[error("detected drift: migration {on_disk} recorded as {recorded} in database")]
    FilenameMismatch {
        /// File on disk.
        on_disk: String,
        /// Filename stored in the ledger.
        recorded: String,
    },

    /// An applied migration's file is gone.
    #[error("detected drift: applied migration {filename} no longer exists")]
    Missing {
        /// Migration filename.
        filename: String,
    },

    /// An applied migration's path is no longer a regular file.
    #[error("detected drift: migration {filename} is no longer a regular file")]
    NotRegularFile {
        /// Migration filename.
        filename: String,
    },
}

impl DriftError {
    /// The migration the drift was found at.
    pub fn filename(&self) -> &str {
        match self {
            Self::LedgerAhead {
                first_unaccounted, ..
            } => first_unaccounted,
            Self::VersionMismatch { recorded, .. } | Self::FilenameMismatch { recorded, .. } => {
                recorded
            }
            Self::Missing { filename } | Self::NotRegularFile { filename } => filename,
        }
    }

    /// Recommended operator action.
    pub fn remediation(&self) -> &'static str {
        DRIFT_REMEDIATION
    }
}

/// One identity check applied at every ledger position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriftRule {
    /// Versions must match.
    Version,
    /// File names must match exactly.
    Filename,
    /// The file must still exist.
    Present,
    /// The path must still be a regular file.
    RegularFile,
}

impl DriftRule {
    /// Rules in the order they are checked.
    pub const ORDERED: [DriftRule; 4] = [
        DriftRule::Version,
        DriftRule::Filename,
        DriftRule::Present,
        DriftRule::RegularFile,
    ];

    /// Short rule name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Filename => "filename",
            Self::Present => "present",
            Self::RegularFile => "regular-file",
        }
    }

    /// Check one position: `file` on disk against `entry` in the ledger.
    pub fn check(&self, file: &MigrationFile, entry: &LedgerEntry) -> MigrateResult<()> {
        match self {
            Self::Version if file.version != entry.version => {
                Err(DriftError::VersionMismatch {
                    expected: file.filename.clone(),
                    recorded: entry.filename.clone(),
                }
                .into())
            }
            Self::Filename if file.filename != entry.filename => {
                Err(DriftError::FilenameMismatch {
                    on_disk: file.filename.clone(),
                    recorded: entry.filename.clone(),
                }
                .into())
            }
            Self::Present => stat(file, entry).map(|_| ()),
            Self::RegularFile => {
                if stat(file, entry)?.is_file() {
                    Ok(())
                } else {
                    Err(DriftError::NotRegularFile {
                        filename: entry.filename.clone(),
                    }
                    .into())
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for DriftRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Follows symlinks, so a dangling link reads as missing.
fn stat(file: &MigrationFile, entry: &LedgerEntry) -> MigrateResult<std::fs::Metadata> {
    std::fs::metadata(&file.path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DriftError::Missing {
                filename: entry.filename.clone(),
            }
            .into()
        } else {
            MigrationError::StatMigration {
                filename: entry.filename.clone(),
                source,
            }
        }
    })
}

/// Verify that `ledger` is an exact prefix of `files`.
pub fn detect_drift(files: &[MigrationFile], ledger: &[LedgerEntry]) -> MigrateResult<()> {
    if ledger.len() > files.len() {
        return Err(DriftError::LedgerAhead {
            recorded: ledger.len(),
            on_disk: files.len(),
            first_unaccounted: ledger[files.len()].filename.clone(),
        }
        .into());
    }

    for (position, (file, entry)) in files.iter().zip(ledger).enumerate() {
        for rule in DriftRule::ORDERED {
            if let Err(err) = rule.check(file, entry) {
                debug!(position, rule = %rule, migration = %entry.filename, "Drift check failed");
                return Err(err);
            }
        }
    }

    Ok(())
}

/// Migrations on disk split into the applied prefix and the pending suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Migrations the ledger accounts for, in order.
    pub applied: Vec<MigrationFile>,
    /// Migrations still to run, in order.
    pub pending: Vec<MigrationFile>,
}

impl Reconciliation {
    /// Check if nothing is pending.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Run drift detection and split `files` at the end of the ledger.
pub fn reconcile(
    mut files: Vec<MigrationFile>,
    ledger: &[LedgerEntry],
) -> MigrateResult<Reconciliation> {
    detect_drift(&files, ledger)?;
    let pending = files.split_off(ledger.len());
    Ok(Reconciliation {
        applied: files,
        pending,
    })
}
