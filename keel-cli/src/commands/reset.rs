//! `keel reset` - Drop the target schema and reapply every migration.

use std::io::BufRead;

use keel_migrate::MigrationFileManager;

use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the reset command
pub async fn run(settings: &Settings, input: &mut impl BufRead) -> CliResult<()> {
    let ledger = super::connect(settings)?;
    MigrationFileManager::new(&settings.migrations_dir)
        .require_dir()
        .await?;
    super::confirm_destructive(settings, "reset", input)?;

    output::header("Keel Reset");
    ledger.ping().await?;
    ledger.drop_schema(&settings.schema).await?;
    success(&format!("schema {:?} dropped", settings.schema.as_str()));

    super::init::run(settings).await?;
    super::up::run(settings).await
}
