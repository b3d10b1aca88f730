//! `keel up` - Apply pending migrations.

use keel_migrate::MigrationEngine;

use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the up command
pub async fn run(settings: &Settings) -> CliResult<()> {
    output::header("Keel Up");

    let ledger = super::connect(settings)?;
    output::kv("Schema", settings.schema.as_str());
    output::kv(
        "Migrations",
        &settings.migrations_dir.display().to_string(),
    );
    output::newline();

    let engine = MigrationEngine::new(settings.engine_config(), ledger);
    let outcome = engine
        .migrate(|applied| {
            success(&format!(
                "Applied {} ({}ms)",
                applied.file.filename,
                applied.duration.as_millis()
            ));
        })
        .await?;

    output::newline();
    match outcome.last_applied() {
        None => success("database already up to date"),
        Some(last) => {
            output::kv(
                "Applied",
                &format!("{} migration(s)", outcome.applied_count()),
            );
            output::kv("Latest", &last.filename);
            output::kv("Duration", &format!("{}ms", outcome.duration.as_millis()));
        }
    }

    Ok(())
}
