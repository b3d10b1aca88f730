//! `keel init` - Prepare the migrations directory and the ledger table.

use keel_migrate::{LEDGER_TABLE, MigrationEngine, MigrationFileManager};

use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the init command
pub async fn run(settings: &Settings) -> CliResult<()> {
    output::header("Keel Init");

    let ledger = super::connect(settings)?;

    MigrationFileManager::new(&settings.migrations_dir)
        .ensure_dir()
        .await?;

    ledger.ping().await?;
    let database = ledger.pool().config().redacted_url();

    let engine = MigrationEngine::new(settings.engine_config(), ledger);
    engine.initialize().await?;

    success("ready to migrate");
    output::kv(
        "Migrations directory",
        &settings.migrations_dir.display().to_string(),
    );
    output::kv("Database", &format!("{} (connection verified)", database));
    output::kv(
        "Ledger table",
        &format!("{}.{} ensured", settings.schema, LEDGER_TABLE),
    );

    Ok(())
}
