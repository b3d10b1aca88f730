//! # keel-migrate
//!
//! Migration engine for Keel.
//!
//! This crate keeps a directory of SQL migration files in lockstep with a
//! ledger table recording what has already run against a target schema:
//! - Migration discovery with strict file name validation
//! - Ledger access through the [`LedgerStore`] trait
//! - Drift detection between disk and ledger
//! - Transactional apply, one transaction per migration
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐
//! │ Migrations   │     │ Ledger Table  │
//! │ directory    │     │ (per schema)  │
//! └──────┬───────┘     └───────┬───────┘
//!        │ load                │ read
//!        ▼                     ▼
//!      ┌─────────────────────────┐
//!      │     Drift Detector      │
//!      └────────────┬────────────┘
//!                   │ pending suffix
//!                   ▼
//!      ┌─────────────────────────┐
//!      │ Apply: SQL + ledger row │
//!      │ in one transaction      │
//!      └─────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_migrate::{run_up, TargetSchema};
//!
//! async fn migrate(store: impl keel_migrate::LedgerStore) -> keel_migrate::MigrateResult<()> {
//!     let outcome = run_up(store, TargetSchema::default(), "./migrations", |m| {
//!         println!("Applied {}", m.file.filename);
//!     })
//!     .await?;
//!     println!("{}", outcome.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! ```text
//! migrations/
//! ├── 20231215120000_create_users.sql
//! └── 20231216090000_add_posts.sql
//! ```
//!
//! The first 14 digits are the version. Once a migration is recorded in the
//! ledger its file must stay in place under the same name; anything else is
//! drift, and the remedy is `keel reset`.

pub mod drift;
pub mod engine;
pub mod error;
pub mod file;
pub mod ledger;
pub mod schema;

// Re-exports
pub use drift::{DRIFT_REMEDIATION, DriftError, DriftRule, Reconciliation, detect_drift, reconcile};
pub use engine::{
    APPLY_TIMEOUT, AppliedMigration, EngineConfig, LEDGER_READ_TIMEOUT, MigrateOutcome,
    MigrationEngine, MigrationState, MigrationStatus, run_up,
};
pub use error::{ApplyStage, ErrorKind, MigrateResult, MigrationError};
pub use file::{
    MigrationFile, MigrationFileManager, order_migrations, parse_migration_filename, slugify,
    version_for,
};
pub use ledger::{LEDGER_TABLE, LedgerEntry, LedgerStore};
pub use schema::{DEFAULT_SCHEMA, TargetSchema, quote_ident};
