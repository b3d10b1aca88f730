//! `keel dropall` - Drop the target schema.

use std::io::BufRead;

use crate::config::Settings;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the dropall command
pub async fn run(settings: &Settings, input: &mut impl BufRead) -> CliResult<()> {
    let ledger = super::connect(settings)?;
    super::confirm_destructive(settings, "dropall", input)?;

    output::header("Keel Drop All");
    ledger.ping().await?;
    ledger.drop_schema(&settings.schema).await?;

    success(&format!("schema {:?} dropped", settings.schema.as_str()));
    Ok(())
}
