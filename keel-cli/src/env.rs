//! Environment variables and `.env` files.
//!
//! `.env` values are merged into an [`Environment`] snapshot rather than the
//! process environment. Variables already set in the process always win.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CliError, CliResult};

/// File read from the working directory before configuration is resolved.
pub const DOTENV_FILE: &str = ".env";

/// Connection URL.
pub const DATABASE_URL: &str = "DATABASE_URL";
/// Migrations directory.
pub const MIGRATIONS_DIR: &str = "KEEL_MIGRATIONS_DIR";
/// Target schema.
pub const TARGET_SCHEMA: &str = "KEEL_TARGET_SCHEMA";
/// Skip confirmation prompts.
pub const FORCE: &str = "KEEL_FORCE";
/// Never prompt; fail instead.
pub const NON_INTERACTIVE: &str = "KEEL_NON_INTERACTIVE";
/// When set, `.env` is not read.
pub const SKIP_DOTENV: &str = "KEEL_SKIP_DOTENV";
/// Log filter directive.
pub const LOG: &str = "KEEL_LOG";
/// Log output format.
pub const LOG_FORMAT: &str = "KEEL_LOG_FORMAT";

/// A snapshot of the variables Keel reads.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot the process environment, then fill gaps from `<dir>/.env`
    /// unless `KEEL_SKIP_DOTENV` is set.
    pub fn load(dir: &Path) -> CliResult<Self> {
        let mut env = Self::from_vars(
            std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        );

        if env.get(SKIP_DOTENV).is_none() {
            env.merge_dotenv(&dir.join(DOTENV_FILE))?;
        }

        Ok(env)
    }

    /// Build an environment from explicit pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Add variables from a `.env` file without overriding existing ones.
    ///
    /// A missing file is not an error.
    pub fn merge_dotenv(&mut self, path: &Path) -> CliResult<()> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(()),
            Err(e) => return Err(dotenv_error(path, e)),
        };

        for item in iter {
            let (key, value) = item.map_err(|e| dotenv_error(path, e))?;
            self.vars.entry(key).or_insert(value);
        }
        Ok(())
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up a variable, treating blank values as unset.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Parse a boolean variable; unset or blank means `false`.
    pub fn flag(&self, key: &str) -> CliResult<bool> {
        match self.get_non_empty(key) {
            Some(value) => parse_bool(value, key),
            None => Ok(false),
        }
    }
}

fn dotenv_error(path: &Path, err: dotenvy::Error) -> CliError {
    CliError::Config(format!("load {}: {}", path.display(), err))
}

/// Parse a lenient boolean, naming `name` in the error.
pub fn parse_bool(value: &str, name: &str) -> CliResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err(CliError::Config(format!(
            "invalid boolean for {}: {:?}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn merged(content: &str) -> CliResult<Environment> {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DOTENV_FILE);
        std::fs::write(&path, content).unwrap();

        let mut env = Environment::default();
        env.merge_dotenv(&path)?;
        Ok(env)
    }

    #[test]
    fn test_merge_dotenv() {
        let env = merged(
            r#"
# comment
DATABASE_URL=postgres://localhost/app
export KEEL_TARGET_SCHEMA=tenant
QUOTED="line\nbreak"
SINGLE='$literal'
"#,
        )
        .unwrap();

        assert_eq!(env.get(DATABASE_URL), Some("postgres://localhost/app"));
        assert_eq!(env.get(TARGET_SCHEMA), Some("tenant"));
        assert_eq!(env.get("QUOTED"), Some("line\nbreak"));
        assert_eq!(env.get("SINGLE"), Some("$literal"));
    }

    #[test]
    fn test_malformed_dotenv_is_config_error() {
        let err = merged("NOT A PAIR\n").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_process_env_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".env");
        std::fs::write(&path, "DATABASE_URL=from-file\nKEEL_FORCE=1\n").unwrap();

        let mut env = Environment::from_vars([("DATABASE_URL", "from-process")]);
        env.merge_dotenv(&path).unwrap();

        assert_eq!(env.get(DATABASE_URL), Some("from-process"));
        assert!(env.flag(FORCE).unwrap());
    }

    #[test]
    fn test_missing_dotenv_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = Environment::default();
        env.merge_dotenv(&tmp.path().join(".env")).unwrap();
        assert!(env.get(DATABASE_URL).is_none());
    }

    #[test]
    fn test_parse_bool() {
        for v in ["1", "true", "YES", "on"] {
            assert!(parse_bool(v, FORCE).unwrap());
        }
        for v in ["0", "false", "No", "off"] {
            assert!(!parse_bool(v, FORCE).unwrap());
        }
        let err = parse_bool("maybe", FORCE).unwrap_err();
        assert!(err.to_string().contains("KEEL_FORCE"));
    }
}
