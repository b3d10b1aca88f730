//! CLI command implementations.

pub mod dropall;
pub mod init;
pub mod new;
pub mod reset;
pub mod status;
pub mod up;

use std::io::BufRead;

use keel_postgres::PgLedger;

use crate::config::Settings;
use crate::env;
use crate::error::{CliError, CliResult};
use crate::output;

/// Open a ledger store for the configured database.
pub(crate) fn connect(settings: &Settings) -> CliResult<PgLedger> {
    let url = settings.require_database_url()?;
    Ok(PgLedger::connect(url)?)
}

/// Gate a destructive command behind `--force` or an interactive yes.
pub(crate) fn confirm_destructive(
    settings: &Settings,
    command: &str,
    input: &mut impl BufRead,
) -> CliResult<()> {
    if settings.force {
        return Ok(());
    }

    if settings.non_interactive {
        return Err(CliError::ConfirmationRequired(format!(
            "{} requires confirmation but {} is set",
            command,
            env::NON_INTERACTIVE
        )));
    }

    output::warn(&format!(
        "This will drop the {:?} schema and erase all managed data.",
        settings.schema.as_str()
    ));
    let prompt = format!(
        "Proceed with dropping schema {:?}?",
        settings.schema.as_str()
    );
    if output::confirm_with(&prompt, input) {
        Ok(())
    } else {
        Err(CliError::Aborted(format!("{} aborted by user", command)))
    }
}
