//! `keel status` - Show applied and pending migrations.

use keel_migrate::MigrationEngine;

use crate::cli::StatusArgs;
use crate::config::Settings;
use crate::error::CliResult;
use crate::output;

/// Run the status command
pub async fn run(settings: &Settings, args: &StatusArgs) -> CliResult<()> {
    let ledger = super::connect(settings)?;
    let engine = MigrationEngine::new(settings.engine_config(), ledger);
    let status = engine.status().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    output::header("Migration Status");
    output::kv("Schema", status.schema.as_str());
    output::kv(
        "Migrations",
        &settings.migrations_dir.display().to_string(),
    );
    output::newline();

    if status.migrations.is_empty() {
        output::info("No migrations found");
        return Ok(());
    }

    for (i, migration) in status.migrations.iter().enumerate() {
        let state = match migration.applied_at {
            Some(at) => output::style_success(&format!(
                "applied {}",
                at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            None => output::style_pending("pending"),
        };
        output::numbered_item(i + 1, &format!("{}  {}", migration.filename, state));
    }

    output::newline();
    output::kv("Applied", &status.applied_count().to_string());
    output::kv("Pending", &status.pending_count().to_string());

    Ok(())
}
