//! The applied-migrations ledger.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MigrateResult;
use crate::file::MigrationFile;
use crate::schema::TargetSchema;

/// Name of the ledger table inside the target schema.
pub const LEDGER_TABLE: &str = "keel_migrations";

/// A row of the ledger: one migration that has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Migration version.
    pub version: String,
    /// Migration filename at the time it was applied.
    pub filename: String,
    /// When the migration was committed.
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry stamped with the current time.
    pub fn new(version: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            filename: filename.into(),
            applied_at: Utc::now(),
        }
    }

    /// Create the entry recording `migration`.
    pub fn for_migration(migration: &MigrationFile) -> Self {
        Self::new(&migration.version, &migration.filename)
    }
}

/// Storage backend for the ledger.
///
/// Implementations own the database connection. Every method receives the
/// target schema explicitly; implementations must not fall back to a default.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the target schema and the ledger table if they are missing.
    async fn initialize(&self, schema: &TargetSchema) -> MigrateResult<()>;

    /// All ledger entries, ordered by version ascending.
    async fn applied(&self, schema: &TargetSchema) -> MigrateResult<Vec<LedgerEntry>>;

    /// Execute `sql` and record `migration` in one transaction.
    ///
    /// Statements run with the target schema as the search path. Any failure
    /// must roll the transaction back so that neither the body nor the ledger
    /// row survives. `deadline` bounds server-side execution time.
    async fn apply(
        &self,
        schema: &TargetSchema,
        migration: &MigrationFile,
        sql: &str,
        deadline: Duration,
    ) -> MigrateResult<()>;
}

/// `CREATE SCHEMA IF NOT EXISTS` for the target schema.
pub fn create_schema_sql(schema: &TargetSchema) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted())
}

/// Idempotent DDL for the ledger table.
pub fn create_ledger_sql(schema: &TargetSchema) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
    version VARCHAR(14) PRIMARY KEY,
    filename VARCHAR(1024) NOT NULL,
    applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
)"#,
        schema.qualify(LEDGER_TABLE)
    )
}

/// Query listing the ledger in version order.
pub fn select_ledger_sql(schema: &TargetSchema) -> String {
    format!(
        "SELECT version, filename, applied_at FROM {} ORDER BY version",
        schema.qualify(LEDGER_TABLE)
    )
}

/// Insert for one ledger row; binds `$1` version and `$2` filename.
pub fn insert_ledger_sql(schema: &TargetSchema) -> String {
    format!(
        "INSERT INTO {} (version, filename) VALUES ($1, $2)",
        schema.qualify(LEDGER_TABLE)
    )
}

/// `SET LOCAL search_path` scoping a transaction to the target schema.
pub fn scope_search_path_sql(schema: &TargetSchema) -> String {
    format!("SET LOCAL search_path TO {}", schema.quoted())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_sql_is_schema_scoped() {
        let schema = TargetSchema::new("app").unwrap();

        let ddl = create_ledger_sql(&schema);
        assert!(ddl.contains("\"app\".\"keel_migrations\""));
        assert!(ddl.contains("version VARCHAR(14) PRIMARY KEY"));
        assert!(ddl.contains("DEFAULT NOW()"));

        assert_eq!(
            select_ledger_sql(&schema),
            "SELECT version, filename, applied_at FROM \"app\".\"keel_migrations\" ORDER BY version"
        );
        assert!(insert_ledger_sql(&schema).contains("VALUES ($1, $2)"));
        assert_eq!(create_schema_sql(&schema), "CREATE SCHEMA IF NOT EXISTS \"app\"");
        assert_eq!(scope_search_path_sql(&schema), "SET LOCAL search_path TO \"app\"");
    }

    #[test]
    fn test_entry_for_migration() {
        let file = MigrationFile::parse(std::path::Path::new("m"), "20240101000000_init.sql")
            .unwrap();
        let entry = LedgerEntry::for_migration(&file);
        assert_eq!(entry.version, "20240101000000");
        assert_eq!(entry.filename, "20240101000000_init.sql");
    }
}
