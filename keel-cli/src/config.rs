//! CLI configuration handling.
//!
//! Settings resolve from, highest first: command-line flags, environment
//! (including `.env`), `keel.toml` in the working directory, defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use keel_migrate::{EngineConfig, TargetSchema};

use crate::cli::GlobalArgs;
use crate::env::{self, Environment};
use crate::error::{CliError, CliResult};

/// Config file name (lives in the working directory)
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Default migrations directory
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Contents of `keel.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationsConfig,
}

/// `[database]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,
}

/// `[migrations]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationsConfig {
    /// Migrations directory
    pub directory: Option<PathBuf>,

    /// Target schema
    pub schema: Option<String>,
}

impl FileConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `keel.toml` from `dir`, or defaults when there is none
    pub fn load_from_dir(dir: &Path) -> CliResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--database-url`
    pub database_url: Option<String>,
    /// `--migrations-dir`
    pub migrations_dir: Option<PathBuf>,
    /// `--schema`
    pub schema: Option<String>,
    /// `--force`
    pub force: bool,
}

impl Overrides {
    /// Collect overrides from global flags and a command's `--force`.
    pub fn from_args(global: &GlobalArgs, force: bool) -> Self {
        Self {
            database_url: global.database_url.clone(),
            migrations_dir: global.migrations_dir.clone(),
            schema: global.schema.clone(),
            force,
        }
    }
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection URL, when one is configured
    pub database_url: Option<String>,
    /// Migrations directory
    pub migrations_dir: PathBuf,
    /// Target schema
    pub schema: TargetSchema,
    /// Skip confirmation prompts
    pub force: bool,
    /// Fail instead of prompting
    pub non_interactive: bool,
}

impl Settings {
    /// Resolve settings from every source.
    pub fn resolve(overrides: &Overrides, env: &Environment, file: &FileConfig) -> CliResult<Self> {
        let database_url = overrides
            .database_url
            .clone()
            .or_else(|| env.get_non_empty(env::DATABASE_URL).map(String::from))
            .or_else(|| file.database.url.clone())
            .filter(|url| !url.trim().is_empty());

        let migrations_dir = overrides
            .migrations_dir
            .clone()
            .or_else(|| env.get_non_empty(env::MIGRATIONS_DIR).map(PathBuf::from))
            .or_else(|| file.migrations.directory.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR));

        let schema = match overrides
            .schema
            .as_deref()
            .or_else(|| env.get_non_empty(env::TARGET_SCHEMA))
            .or(file.migrations.schema.as_deref())
        {
            Some(name) => TargetSchema::new(name.trim())
                .map_err(|e| CliError::Config(e.to_string()))?,
            None => TargetSchema::default(),
        };

        Ok(Self {
            database_url,
            migrations_dir,
            schema,
            force: overrides.force || env.flag(env::FORCE)?,
            non_interactive: env.flag(env::NON_INTERACTIVE)?,
        })
    }

    /// Resolve settings, reading `keel.toml` from `dir`.
    pub fn load(overrides: &Overrides, env: &Environment, dir: &Path) -> CliResult<Self> {
        let file = FileConfig::load_from_dir(dir)?;
        Self::resolve(overrides, env, &file)
    }

    /// The connection URL, or an error explaining how to set one.
    pub fn require_database_url(&self) -> CliResult<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CliError::Config(format!(
                "{} is not set; export it, add it to .env, or set [database] url in {}",
                env::DATABASE_URL,
                CONFIG_FILE_NAME
            ))
        })
    }

    /// Engine configuration for these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .migrations_dir(&self.migrations_dir)
            .schema(self.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file(toml: &str) -> FileConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::resolve(&Overrides::default(), &Environment::default(), &FileConfig::default())
                .unwrap();
        assert_eq!(settings.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(settings.schema.as_str(), "public");
        assert!(settings.database_url.is_none());
        assert!(!settings.force);
        assert!(!settings.non_interactive);
        assert!(settings.require_database_url().is_err());
    }

    #[test]
    fn test_precedence() {
        let file = file(
            r#"
[database]
url = "postgres://file/db"

[migrations]
directory = "db/migrations"
schema = "from_file"
"#,
        );
        let env = Environment::from_vars([
            ("DATABASE_URL", "postgres://env/db"),
            ("KEEL_TARGET_SCHEMA", "from_env"),
        ]);
        let overrides = Overrides {
            schema: Some("from_flag".to_string()),
            ..Default::default()
        };

        let settings = Settings::resolve(&overrides, &env, &file).unwrap();
        assert_eq!(settings.database_url.as_deref(), Some("postgres://env/db"));
        assert_eq!(settings.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(settings.schema.as_str(), "from_flag");
    }

    #[test]
    fn test_invalid_schema_is_config_error() {
        let env = Environment::from_vars([("KEEL_TARGET_SCHEMA", "pg_catalog")]);
        let err =
            Settings::resolve(&Overrides::default(), &env, &FileConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_flags_from_env() {
        let env = Environment::from_vars([("KEEL_FORCE", "yes"), ("KEEL_NON_INTERACTIVE", "1")]);
        let settings = Settings::resolve(&Overrides::default(), &env, &FileConfig::default()).unwrap();
        assert!(settings.force);
        assert!(settings.non_interactive);

        let env = Environment::from_vars([("KEEL_NON_INTERACTIVE", "sometimes")]);
        assert!(Settings::resolve(&Overrides::default(), &env, &FileConfig::default()).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<FileConfig>("[database]\nhost = \"x\"\n").is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(FileConfig::load_from_dir(tmp.path()).unwrap(), FileConfig::default());

        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[migrations]\nschema = \"app\"\n",
        )
        .unwrap();
        let loaded = FileConfig::load_from_dir(tmp.path()).unwrap();
        assert_eq!(loaded.migrations.schema.as_deref(), Some("app"));
    }
}
