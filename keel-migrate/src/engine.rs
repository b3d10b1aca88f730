//! Migration engine: load, reconcile, apply.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::drift::{Reconciliation, reconcile};
use crate::error::{ApplyStage, MigrateResult, MigrationError};
use crate::file::{MigrationFile, MigrationFileManager};
use crate::ledger::{LedgerEntry, LedgerStore};
use crate::schema::TargetSchema;

/// Deadline for reading the ledger and preparing the ledger table.
pub const LEDGER_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for a single migration's transaction.
pub const APPLY_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Schema migrations run in and the ledger lives in.
    pub schema: TargetSchema,
    /// Deadline for ledger reads.
    pub ledger_timeout: Duration,
    /// Deadline for each migration transaction.
    pub apply_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            schema: TargetSchema::default(),
            ledger_timeout: LEDGER_READ_TIMEOUT,
            apply_timeout: APPLY_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the target schema.
    pub fn schema(mut self, schema: TargetSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the ledger read deadline.
    pub fn ledger_timeout(mut self, timeout: Duration) -> Self {
        self.ledger_timeout = timeout;
        self
    }

    /// Set the per-migration deadline.
    pub fn apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = timeout;
        self
    }
}

/// A migration that has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// The migration.
    pub file: MigrationFile,
    /// Wall time from reading the body to commit.
    pub duration: Duration,
}

/// Result of [`MigrationEngine::migrate`].
#[derive(Debug, Clone, Default)]
pub struct MigrateOutcome {
    /// Migrations committed by this run, in order.
    pub applied: Vec<AppliedMigration>,
    /// Total duration of the run.
    pub duration: Duration,
}

impl MigrateOutcome {
    /// Check if nothing needed to be applied.
    pub fn is_up_to_date(&self) -> bool {
        self.applied.is_empty()
    }

    /// Number of migrations applied.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// The last migration applied by this run.
    pub fn last_applied(&self) -> Option<&MigrationFile> {
        self.applied.last().map(|a| &a.file)
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        match self.last_applied() {
            None => "database already up to date".to_string(),
            Some(last) => format!(
                "applied {} migration(s) in {}ms, latest {}",
                self.applied_count(),
                self.duration.as_millis(),
                last.filename
            ),
        }
    }
}

/// One line of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationState {
    /// Migration version.
    pub version: String,
    /// Migration filename.
    pub filename: String,
    /// Commit time, when applied.
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationState {
    /// Check if the migration has been applied.
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Applied and pending migrations for a target schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// The target schema.
    pub schema: TargetSchema,
    /// Every migration on disk, in order.
    pub migrations: Vec<MigrationState>,
}

impl MigrationStatus {
    /// Number of applied migrations.
    pub fn applied_count(&self) -> usize {
        self.migrations.iter().filter(|m| m.is_applied()).count()
    }

    /// Number of pending migrations.
    pub fn pending_count(&self) -> usize {
        self.migrations.len() - self.applied_count()
    }

    /// The most recently applied migration.
    pub fn latest_applied(&self) -> Option<&MigrationState> {
        self.migrations.iter().rev().find(|m| m.is_applied())
    }
}

/// The migration engine.
pub struct MigrationEngine<L: LedgerStore> {
    config: EngineConfig,
    ledger: L,
    file_manager: MigrationFileManager,
}

impl<L: LedgerStore> MigrationEngine<L> {
    /// Create a new migration engine.
    pub fn new(config: EngineConfig, ledger: L) -> Self {
        let file_manager = MigrationFileManager::new(&config.migrations_dir);
        Self {
            config,
            ledger,
            file_manager,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the ledger store.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Get the file manager.
    pub fn file_manager(&self) -> &MigrationFileManager {
        &self.file_manager
    }

    /// Create the target schema and ledger table if missing.
    pub async fn initialize(&self) -> MigrateResult<()> {
        within(
            "initialize ledger",
            self.config.ledger_timeout,
            self.ledger.initialize(&self.config.schema),
        )
        .await
    }

    /// Load the migration set from disk.
    pub async fn load(&self) -> MigrateResult<Vec<MigrationFile>> {
        self.file_manager.require_dir().await?;
        self.file_manager.list_migrations().await
    }

    /// Read the ledger under the ledger deadline.
    pub async fn read_ledger(&self) -> MigrateResult<Vec<LedgerEntry>> {
        within(
            "load applied migrations",
            self.config.ledger_timeout,
            self.ledger.applied(&self.config.schema),
        )
        .await
    }

    /// Load, read the ledger, and split into applied and pending.
    ///
    /// The ledger table must already exist.
    pub async fn plan(&self) -> MigrateResult<Reconciliation> {
        let files = self.load().await?;
        let ledger = self.read_ledger().await?;
        reconcile(files, &ledger)
    }

    /// Report which migrations are applied and which are pending.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let files = self.load().await?;
        let ledger = self.read_ledger().await?;
        let plan = reconcile(files, &ledger)?;

        let applied = plan
            .applied
            .into_iter()
            .zip(&ledger)
            .map(|(file, entry)| MigrationState {
                version: file.version,
                filename: file.filename,
                applied_at: Some(entry.applied_at),
            });
        let pending = plan.pending.into_iter().map(|file| MigrationState {
            version: file.version,
            filename: file.filename,
            applied_at: None,
        });

        Ok(MigrationStatus {
            schema: self.config.schema.clone(),
            migrations: applied.chain(pending).collect(),
        })
    }

    /// Apply every pending migration, one transaction each.
    ///
    /// Local problems with the migration set are reported before the ledger
    /// is touched. `on_applied` runs after each commit. The first failure
    /// stops the run; migrations committed before it stay applied.
    pub async fn migrate<F>(&self, mut on_applied: F) -> MigrateResult<MigrateOutcome>
    where
        F: FnMut(&AppliedMigration),
    {
        let start = Instant::now();

        let files = self.load().await?;
        self.initialize().await?;
        let ledger = self.read_ledger().await?;
        let plan = reconcile(files, &ledger)?;

        debug!(
            schema = %self.config.schema,
            applied = plan.applied.len(),
            pending = plan.pending.len(),
            "Reconciled migrations"
        );

        let mut outcome = MigrateOutcome::default();
        for file in plan.pending {
            let applied = self.apply_one(file).await?;
            on_applied(&applied);
            outcome.applied.push(applied);
        }

        outcome.duration = start.elapsed();

        match outcome.last_applied() {
            Some(last) => info!(
                count = outcome.applied_count(),
                latest = %last.filename,
                duration_ms = outcome.duration.as_millis() as u64,
                "Migrations applied"
            ),
            None => info!(schema = %self.config.schema, "Database already up to date"),
        }

        Ok(outcome)
    }

    async fn apply_one(&self, file: MigrationFile) -> MigrateResult<AppliedMigration> {
        let start = Instant::now();
        let sql = file.read_sql().await?;

        debug!(migration = %file.filename, bytes = sql.len(), "Applying migration");

        let deadline = self.config.apply_timeout;
        tokio::time::timeout(
            deadline,
            self.ledger
                .apply(&self.config.schema, &file, &sql, deadline),
        )
        .await
        .map_err(|_| {
            MigrationError::apply(
                ApplyStage::Deadline,
                &file.filename,
                format!("timed out after {}ms", deadline.as_millis()),
            )
        })??;

        let duration = start.elapsed();
        info!(
            migration = %file.filename,
            duration_ms = duration.as_millis() as u64,
            "Applied migration"
        );

        Ok(AppliedMigration { file, duration })
    }
}

/// Apply all pending migrations in `dir` to `schema` with default deadlines.
pub async fn run_up<L, F>(
    ledger: L,
    schema: TargetSchema,
    dir: impl Into<PathBuf>,
    on_applied: F,
) -> MigrateResult<MigrateOutcome>
where
    L: LedgerStore,
    F: FnMut(&AppliedMigration),
{
    let config = EngineConfig::new().migrations_dir(dir).schema(schema);
    MigrationEngine::new(config, ledger).migrate(on_applied).await
}

async fn within<T>(
    operation: &str,
    deadline: Duration,
    fut: impl Future<Output = MigrateResult<T>>,
) -> MigrateResult<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| MigrationError::timeout(operation, deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApplyStage, ErrorKind};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockLedger {
        entries: Mutex<Vec<LedgerEntry>>,
        initialized: AtomicUsize,
        executed: Mutex<Vec<String>>,
        stall: Option<Duration>,
        apply_stall: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl LedgerStore for MockLedger {
        async fn initialize(&self, _schema: &TargetSchema) -> MigrateResult<()> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn applied(&self, _schema: &TargetSchema) -> MigrateResult<Vec<LedgerEntry>> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            Ok(self.entries.lock().unwrap().clone())
        }

        async fn apply(
            &self,
            _schema: &TargetSchema,
            migration: &MigrationFile,
            sql: &str,
            _deadline: Duration,
        ) -> MigrateResult<()> {
            if let Some(stall) = self.apply_stall {
                tokio::time::sleep(stall).await;
            }
            if sql.contains("INVALID") {
                return Err(MigrationError::apply(
                    ApplyStage::Execute,
                    &migration.filename,
                    "syntax error",
                ));
            }
            self.executed.lock().unwrap().push(sql.to_string());
            self.entries
                .lock()
                .unwrap()
                .push(LedgerEntry::for_migration(migration));
            Ok(())
        }
    }

    fn write(dir: &Path, name: &str, sql: &str) {
        std::fs::write(dir.join(name), sql).unwrap();
    }

    fn engine(dir: &Path, ledger: MockLedger) -> MigrationEngine<MockLedger> {
        MigrationEngine::new(EngineConfig::new().migrations_dir(dir), ledger)
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.schema.as_str(), "public");
        assert_eq!(config.ledger_timeout, Duration::from_secs(5));
        assert_eq!(config.apply_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_outcome_summary() {
        let outcome = MigrateOutcome::default();
        assert!(outcome.is_up_to_date());
        assert_eq!(outcome.summary(), "database already up to date");
    }

    #[tokio::test]
    async fn test_migrate_applies_in_order_and_reports_progress() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240102000000_b.sql", "SELECT 'b';");
        write(tmp.path(), "20240101000000_a.sql", "SELECT 'a';");

        let engine = engine(tmp.path(), MockLedger::default());
        let mut seen = Vec::new();
        let outcome = engine
            .migrate(|m| seen.push(m.file.filename.clone()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["20240101000000_a.sql", "20240102000000_b.sql"]);
        assert_eq!(outcome.applied_count(), 2);
        assert_eq!(
            outcome.last_applied().map(|f| f.filename.as_str()),
            Some("20240102000000_b.sql")
        );
        assert_eq!(
            *engine.ledger().executed.lock().unwrap(),
            vec!["SELECT 'a';", "SELECT 'b';"]
        );
    }

    #[tokio::test]
    async fn test_migrate_checks_files_before_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "not-a-migration.sql", "SELECT 1;");

        let engine = engine(tmp.path(), MockLedger::default());
        let err = engine.migrate(|_| {}).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(engine.ledger().initialized.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_migrate_stops_at_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240101000000_a.sql", "SELECT 1;");
        write(tmp.path(), "20240102000000_b.sql", "INVALID");
        write(tmp.path(), "20240103000000_c.sql", "SELECT 3;");

        let engine = engine(tmp.path(), MockLedger::default());
        let err = engine.migrate(|_| {}).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.migration(), Some("20240102000000_b.sql"));
        assert_eq!(engine.ledger().entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_read_deadline() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = MockLedger {
            stall: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let engine = MigrationEngine::new(
            EngineConfig::new()
                .migrations_dir(tmp.path())
                .ledger_timeout(Duration::from_millis(10)),
            ledger,
        );

        let err = engine.migrate(|_| {}).await.unwrap_err();
        assert!(matches!(err, MigrationError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_apply_deadline_names_migration() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240101000000_slow.sql", "SELECT pg_sleep(10);");

        let ledger = MockLedger {
            apply_stall: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let engine = MigrationEngine::new(
            EngineConfig::new()
                .migrations_dir(tmp.path())
                .apply_timeout(Duration::from_millis(10)),
            ledger,
        );

        let err = engine.migrate(|_| {}).await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Apply {
                stage: ApplyStage::Deadline,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.migration(), Some("20240101000000_slow.sql"));
        assert!(err.to_string().contains("timed out after 10ms"));
        assert!(engine.ledger().entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_marks_applied_and_pending() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240101000000_a.sql", "SELECT 1;");
        write(tmp.path(), "20240102000000_b.sql", "SELECT 2;");

        let ledger = MockLedger::default();
        ledger
            .entries
            .lock()
            .unwrap()
            .push(LedgerEntry::new("20240101000000", "20240101000000_a.sql"));

        let status = engine(tmp.path(), ledger).status().await.unwrap();
        assert_eq!(status.applied_count(), 1);
        assert_eq!(status.pending_count(), 1);
        assert_eq!(
            status.latest_applied().map(|m| m.filename.as_str()),
            Some("20240101000000_a.sql")
        );
        assert!(!status.migrations[1].is_applied());
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = engine(&tmp.path().join("missing"), MockLedger::default());

        let err = engine.migrate(|_| {}).await.unwrap_err();
        assert!(matches!(err, MigrationError::MissingDirectory(_)));
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }
}
