//! `keel new` - Generate a new migration file.

use std::io::BufRead;

use chrono::{DateTime, SecondsFormat, Utc};
use keel_migrate::{MigrationError, MigrationFileManager, slugify, version_for};

use crate::cli::NewArgs;
use crate::config::Settings;
use crate::env::{self, Environment};
use crate::error::{CliError, CliResult};
use crate::output::{self, success};

/// Run the new command
pub async fn run(
    settings: &Settings,
    env: &Environment,
    args: &NewArgs,
    input: &mut impl BufRead,
) -> CliResult<()> {
    let description = args.description.join(" ");
    if description.trim().is_empty() {
        return Err(CliError::Command("description is required".to_string()));
    }
    let slug = slugify(&description).ok_or_else(|| {
        CliError::Command(format!(
            "description {:?} results in an empty slug",
            description
        ))
    })?;

    let manager = MigrationFileManager::new(&settings.migrations_dir);
    ensure_dir(&manager, settings.force).await?;

    let existing = manager.find_by_slug(&slug).await?;
    if !existing.is_empty() {
        output::warn(&format!(
            "{} other migration(s) share the slug {:?} ({}).",
            existing.len(),
            slug,
            existing.join(", ")
        ));

        if settings.non_interactive {
            return Err(CliError::Command(format!(
                "slug {:?} already exists; duplicate creation requires confirmation but {} is set",
                slug,
                env::NON_INTERACTIVE
            )));
        }

        let prompt = format!("Create another migration using slug {:?}?", slug);
        if !output::confirm_with(&prompt, input) {
            return Err(CliError::Aborted(format!(
                "aborted creating migration for duplicate slug {:?}",
                slug
            )));
        }
    }

    let now = Utc::now();
    let version = version_for(now);
    let filename = format!("{}_{}.sql", version, slug);
    let header = migration_header(&version, &filename, now, &created_by(env));

    let created = manager.create_migration(&version, &slug, &header).await?;

    output::header("Keel New");
    success("migration created");
    output::kv("Filename", &created.filename);
    output::kv("Path", &created.path.display().to_string());

    Ok(())
}

async fn ensure_dir(manager: &MigrationFileManager, force: bool) -> CliResult<()> {
    match manager.require_dir().await {
        Ok(()) => Ok(()),
        Err(MigrationError::MissingDirectory(dir)) if force => {
            manager.ensure_dir().await?;
            output::dim(&format!("created {}", dir.display()));
            Ok(())
        }
        Err(MigrationError::MissingDirectory(dir)) => Err(CliError::Command(format!(
            "migrations directory {} does not exist; run `keel init` or pass --force",
            dir.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Comment block written at the top of every new migration.
pub fn migration_header(
    version: &str,
    filename: &str,
    created_at: DateTime<Utc>,
    created_by: &str,
) -> String {
    format!(
        "-- Keel Migration\n\
         -- Version: {}\n\
         -- Filename: {}\n\
         -- Created At (UTC): {}\n\
         -- Created By: {}\n\n",
        version,
        filename,
        created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        created_by
    )
}

/// `user@host`, whichever half is known, or `unknown`.
pub fn created_by(env: &Environment) -> String {
    let user = env
        .get_non_empty("USER")
        .or_else(|| env.get_non_empty("USERNAME"));

    let host = env
        .get_non_empty("HOSTNAME")
        .map(String::from)
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        });

    match (user, host) {
        (Some(user), Some(host)) => format!("{}@{}", user, host),
        (Some(user), None) => user.to_string(),
        (None, Some(host)) => host,
        (None, None) => "unknown".to_string(),
    }
}
