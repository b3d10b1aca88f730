//! # Keel
//!
//! Keeps a directory of PostgreSQL migration files and a ledger table of
//! applied migrations in agreement.
//!
//! Keel provides:
//! - Strict discovery of `<14 digits>_<slug>.sql` migration files
//! - Drift detection: every recorded migration must still be on disk, in
//!   order, under the name it was applied with
//! - One transaction per migration, covering both the SQL and its ledger row
//! - A PostgreSQL ledger store built on `tokio-postgres` and `deadpool`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> MigrateResult<()> {
//!     let ledger = PgLedger::connect("postgresql://localhost/mydb")?;
//!     let outcome = run_up(ledger, TargetSchema::default(), "./migrations", |m| {
//!         println!("Applied {} ({}ms)", m.file.filename, m.duration.as_millis());
//!     })
//!     .await?;
//!
//!     println!("{}", outcome.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration discovery, drift detection, and the apply loop.
pub mod migrate {
    pub use keel_migrate::*;
}

/// PostgreSQL ledger store.
pub mod postgres {
    pub use keel_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use keel_migrate::{
        EngineConfig, LedgerEntry, LedgerStore, MigrateOutcome, MigrateResult, MigrationEngine,
        MigrationError, MigrationFile, TargetSchema, run_up,
    };
    pub use keel_postgres::{PgConfig, PgLedger, PgPool};
}

// Re-export key types at the crate root
pub use keel_migrate::{MigrateResult, MigrationEngine, MigrationError, TargetSchema, run_up};
pub use keel_postgres::PgLedger;
