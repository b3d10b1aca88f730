//! Target schema names and identifier quoting.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{MigrateResult, MigrationError};

/// Schema used when none is configured.
pub const DEFAULT_SCHEMA: &str = "public";

const RESERVED_SCHEMAS: &[&str] = &["pg_catalog", "pg_toast", "information_schema"];
const RESERVED_PREFIXES: &[&str] = &["pg_temp", "pg_toast_temp"];

/// A validated PostgreSQL schema name that migrations run in and the ledger
/// table lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetSchema(String);

impl TargetSchema {
    /// Validate a schema name.
    ///
    /// The name must be non-empty, must not name a system schema, and must
    /// reference a single schema.
    pub fn new(name: impl Into<String>) -> MigrateResult<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(MigrationError::InvalidSchema(
                "schema name must not be empty".to_string(),
            ));
        }

        let lower = name.to_lowercase();
        if RESERVED_SCHEMAS.contains(&lower.as_str())
            || RESERVED_PREFIXES.iter().any(|p| lower.starts_with(p))
        {
            return Err(MigrationError::InvalidSchema(format!(
                "{:?} is a reserved PostgreSQL schema",
                name
            )));
        }

        if name.contains(',') {
            return Err(MigrationError::InvalidSchema(format!(
                "must reference a single schema, got {:?}",
                name
            )));
        }

        if name.contains('\0') {
            return Err(MigrationError::InvalidSchema(
                "schema name must not contain NUL bytes".to_string(),
            ));
        }

        Ok(Self(name))
    }

    /// The raw schema name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The schema name as a quoted identifier.
    pub fn quoted(&self) -> String {
        quote_ident(&self.0)
    }

    /// Qualify an object name with this schema, quoting both parts.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.quoted(), quote_ident(name))
    }
}

impl Default for TargetSchema {
    fn default() -> Self {
        Self(DEFAULT_SCHEMA.to_string())
    }
}

impl fmt::Display for TargetSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetSchema {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TargetSchema {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
