//! Diagnostic logging for the CLI.
//!
//! Logs go to stderr and stay quiet by default so that normal output is the
//! styled terminal text.
//!
//! - `KEEL_LOG` - filter directive (`debug`, `keel_migrate=trace`, ...)
//! - `KEEL_LOG_FORMAT` - `pretty`, `compact` (default) or `json`
//! - `-v` / `-vv` / `-vvv` - info / debug / trace for the keel crates,
//!   taking precedence over `KEEL_LOG`

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::env::{self, Environment};

const KEEL_CRATES: &[&str] = &["keel", "keel_cli", "keel_migrate", "keel_postgres"];

/// Filter directive for the given verbosity and environment.
pub fn filter_directive(verbose: u8, env: &Environment) -> String {
    let level = match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };

    match level {
        Some(level) => {
            let mut directive = String::from("warn");
            for name in KEEL_CRATES {
                directive.push_str(&format!(",{}={}", name, level));
            }
            directive
        }
        None => env
            .get_non_empty(env::LOG)
            .unwrap_or("warn")
            .to_string(),
    }
}

/// Output format name.
pub fn log_format(env: &Environment) -> &'static str {
    match env
        .get_non_empty(env::LOG_FORMAT)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => "json",
        Some("pretty") => "pretty",
        _ => "compact",
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: u8, env: &Environment) {
    let filter =
        EnvFilter::try_new(filter_directive(verbose, env)).unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match log_format(env) {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(format = log_format(env), "Logging initialized");
    }
}
