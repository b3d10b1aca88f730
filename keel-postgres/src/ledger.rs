//! PostgreSQL-backed migration ledger.

use std::time::Duration;

use chrono::{DateTime, Utc};
use keel_migrate::ledger::{
    LEDGER_TABLE, create_ledger_sql, create_schema_sql, insert_ledger_sql, scope_search_path_sql,
    select_ledger_sql,
};
use keel_migrate::{
    ApplyStage, LedgerEntry, LedgerStore, MigrateResult, MigrationError, MigrationFile,
    TargetSchema,
};
use tracing::{debug, info, warn};

use crate::connection::PgTransaction;
use crate::error::PgError;
use crate::pool::PgPool;

/// Deadline for a connectivity check.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for dropping a schema.
pub const DROP_SCHEMA_TIMEOUT: Duration = Duration::from_secs(30);

/// Ledger store backed by a PostgreSQL database.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from a database URL.
    ///
    /// The URL is validated here; no connection is opened until first use.
    pub fn connect(url: &str) -> MigrateResult<Self> {
        let pool = PgPool::builder().url(url).build()?;
        Ok(Self::new(pool))
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check that the database is reachable.
    pub async fn ping(&self) -> MigrateResult<()> {
        deadline("ping database", PING_TIMEOUT, async {
            let conn = self.pool.get().await?;
            conn.query_one("SELECT 1", &[]).await?;
            Ok::<_, PgError>(())
        })
        .await
    }

    /// Drop `schema` and everything in it, including the ledger.
    pub async fn drop_schema(&self, schema: &TargetSchema) -> MigrateResult<()> {
        warn!(schema = %schema, "Dropping schema");
        let sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", schema.quoted());
        deadline("drop schema", DROP_SCHEMA_TIMEOUT, async {
            let conn = self.pool.get().await?;
            conn.batch_execute(&sql).await?;
            Ok::<_, PgError>(())
        })
        .await
    }

    async fn ledger_exists(&self, schema: &TargetSchema) -> MigrateResult<bool> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_tables \
                 WHERE schemaname = $1 AND tablename = $2)",
                &[&schema.as_str(), &LEDGER_TABLE],
            )
            .await?;
        row.try_get::<_, bool>(0).map_err(|e| PgError::from(e).into())
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedger {
    async fn initialize(&self, schema: &TargetSchema) -> MigrateResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(&create_schema_sql(schema)).await?;
        conn.batch_execute(&create_ledger_sql(schema)).await?;
        debug!(schema = %schema, "Ledger table ready");
        Ok(())
    }

    async fn applied(&self, schema: &TargetSchema) -> MigrateResult<Vec<LedgerEntry>> {
        if !self.ledger_exists(schema).await? {
            debug!(schema = %schema, "No ledger table yet");
            return Ok(Vec::new());
        }

        let conn = self.pool.get().await?;
        let rows = conn.query(&select_ledger_sql(schema), &[]).await?;

        rows.iter()
            .map(|row| {
                Ok(LedgerEntry {
                    version: row.try_get::<_, String>("version")?,
                    filename: row.try_get::<_, String>("filename")?,
                    applied_at: row.try_get::<_, DateTime<Utc>>("applied_at")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| PgError::from(e).into())
    }

    async fn apply(
        &self,
        schema: &TargetSchema,
        migration: &MigrationFile,
        sql: &str,
        deadline: Duration,
    ) -> MigrateResult<()> {
        let filename = migration.filename.as_str();
        let fail = |stage, err: PgError| {
            let stage = if err.is_statement_timeout() {
                ApplyStage::Deadline
            } else {
                stage
            };
            MigrationError::apply(stage, filename, err)
        };

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| fail(ApplyStage::Begin, e))?;
        let txn = conn
            .transaction()
            .await
            .map_err(|e| fail(ApplyStage::Begin, e))?;

        let scope = format!(
            "{};\nSET LOCAL statement_timeout = {}",
            scope_search_path_sql(schema),
            deadline.as_millis()
        );
        if let Err(e) = txn.batch_execute(&scope).await {
            return Err(abort(txn, fail(ApplyStage::Scope, e)).await);
        }

        if let Err(e) = txn.batch_execute(sql).await {
            return Err(abort(txn, fail(ApplyStage::Execute, e)).await);
        }

        if let Err(e) = txn
            .execute(
                &insert_ledger_sql(schema),
                &[&migration.version, &migration.filename],
            )
            .await
        {
            return Err(abort(txn, fail(ApplyStage::Record, e)).await);
        }

        txn.commit()
            .await
            .map_err(|e| fail(ApplyStage::Commit, e))?;

        info!(schema = %schema, migration = %filename, "Committed migration");
        Ok(())
    }
}

async fn abort(txn: PgTransaction<'_>, err: MigrationError) -> MigrationError {
    if let Err(rollback) = txn.rollback().await {
        warn!(error = %rollback, "Rollback failed; transaction discarded with connection");
    }
    err
}

async fn deadline<T>(
    operation: &str,
    timeout: Duration,
    fut: impl Future<Output = Result<T, PgError>>,
) -> MigrateResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(MigrationError::timeout(operation, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_validates_url() {
        let err = PgLedger::connect("mysql://localhost/db").err().unwrap();
        assert!(err.to_string().contains("invalid scheme"));
    }

    #[tokio::test]
    async fn test_ping_unreachable_is_infrastructure() {
        let ledger = PgLedger::connect("postgres://127.0.0.1:1/keel?connect_timeout=1").unwrap();
        let err = ledger.ping().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
