//! Migration file discovery and creation.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MigrateResult, MigrationError};

/// Number of digits in a migration version.
pub const VERSION_LEN: usize = 14;

/// Suffix every migration file carries.
pub const MIGRATION_SUFFIX: &str = ".sql";

/// `chrono` format producing a [`VERSION_LEN`]-digit version.
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// A migration file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// Fixed-width numeric version (the first 14 characters of the name).
    pub version: String,
    /// Full file name, `<version>_<slug>.sql`.
    pub filename: String,
    /// Path used to read the body at apply time.
    pub path: PathBuf,
}

impl MigrationFile {
    /// Parse a file name found in `dir`.
    pub fn parse(dir: &Path, filename: &str) -> MigrateResult<Self> {
        let (version, _) = parse_migration_filename(filename)?;
        Ok(Self {
            version: version.to_string(),
            filename: filename.to_string(),
            path: dir.join(filename),
        })
    }

    /// The descriptive part of the file name.
    pub fn slug(&self) -> &str {
        &self.filename[VERSION_LEN + 1..self.filename.len() - MIGRATION_SUFFIX.len()]
    }

    /// Read the SQL body.
    pub async fn read_sql(&self) -> MigrateResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| MigrationError::ReadMigration {
                filename: self.filename.clone(),
                source,
            })
    }
}

impl Ord for MigrationFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.filename.cmp(&other.filename))
    }
}

impl PartialOrd for MigrationFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split a migration file name into `(version, slug)`.
///
/// The shape is strict: 14 ASCII digits, an underscore, a non-empty slug, and
/// the `.sql` suffix.
pub fn parse_migration_filename(name: &str) -> MigrateResult<(&str, &str)> {
    let invalid = |reason| MigrationError::InvalidFilename {
        filename: name.to_string(),
        reason,
    };

    let stem = name
        .strip_suffix(MIGRATION_SUFFIX)
        .ok_or_else(|| invalid("missing .sql suffix"))?;

    let bytes = stem.as_bytes();
    if bytes.len() < VERSION_LEN || !bytes[..VERSION_LEN].iter().all(u8::is_ascii_digit) {
        return Err(invalid("must start with a 14-digit version"));
    }
    if bytes.get(VERSION_LEN) != Some(&b'_') {
        return Err(invalid("version must be followed by an underscore"));
    }

    let slug = &stem[VERSION_LEN + 1..];
    if slug.is_empty() {
        return Err(invalid("missing description after the version"));
    }
    if slug.contains('/') {
        return Err(invalid("description must not contain a path separator"));
    }

    Ok((&stem[..VERSION_LEN], slug))
}

/// Sort migrations by version and reject duplicate versions.
pub fn order_migrations(mut files: Vec<MigrationFile>) -> MigrateResult<Vec<MigrationFile>> {
    files.sort();

    if let Some(pair) = files.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrationError::DuplicateVersion {
            version: pair[1].version.clone(),
            first: pair[0].filename.clone(),
            second: pair[1].filename.clone(),
        });
    }

    Ok(files)
}

/// Turn a free-text description into a file name slug.
///
/// Lowercase ASCII letters and digits are kept; every run of anything else
/// becomes a single underscore. Returns `None` when nothing usable remains.
pub fn slugify(description: &str) -> Option<String> {
    let mut slug = String::with_capacity(description.len());
    let mut pending_sep = false;

    for c in description.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    (!slug.is_empty()).then_some(slug)
}

/// Format a timestamp as a migration version.
pub fn version_for(timestamp: DateTime<Utc>) -> String {
    timestamp.format(VERSION_FORMAT).to_string()
}

/// Reader/writer for a flat directory of migration files.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Create the migrations directory and any missing parents.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir)
            .await
            .map_err(|source| MigrationError::ReadDirectory {
                path: self.migrations_dir.clone(),
                source,
            })
    }

    /// Fail unless the migrations directory exists and is a directory.
    pub async fn require_dir(&self) -> MigrateResult<()> {
        match tokio::fs::metadata(&self.migrations_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(MigrationError::NotADirectory(self.migrations_dir.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MigrationError::MissingDirectory(self.migrations_dir.clone()))
            }
            Err(source) => Err(MigrationError::ReadDirectory {
                path: self.migrations_dir.clone(),
                source,
            }),
        }
    }

    /// List all migrations in version order.
    ///
    /// Sub-directories and files without the `.sql` suffix are skipped. Any
    /// `.sql` file with a malformed name, or two files sharing a version,
    /// fails the whole listing.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        let read_err = |source| MigrationError::ReadDirectory {
            path: self.migrations_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.migrations_dir)
            .await
            .map_err(read_err)?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            if entry.file_type().await.map_err(read_err)?.is_dir() {
                continue;
            }

            let os_name = entry.file_name();
            let name = os_name.to_string_lossy();
            if !name.ends_with(MIGRATION_SUFFIX) {
                continue;
            }
            if os_name.to_str().is_none() {
                return Err(MigrationError::InvalidFilename {
                    filename: name.into_owned(),
                    reason: "file name is not valid UTF-8",
                });
            }

            files.push(MigrationFile::parse(&self.migrations_dir, &name)?);
        }

        let files = order_migrations(files)?;

        debug!(
            dir = %self.migrations_dir.display(),
            count = files.len(),
            "Discovered migrations"
        );

        Ok(files)
    }

    /// File names of existing migrations whose slug equals `slug`, sorted.
    ///
    /// Unlike [`list_migrations`](Self::list_migrations) this ignores files
    /// that do not parse, so it can be used while the directory is broken.
    pub async fn find_by_slug(&self, slug: &str) -> MigrateResult<Vec<String>> {
        let read_err = |source| MigrationError::ReadDirectory {
            path: self.migrations_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.migrations_dir)
            .await
            .map_err(read_err)?;

        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if matches!(parse_migration_filename(&name), Ok((_, s)) if s == slug) {
                matches.push(name);
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Create `<version>_<slug>.sql` holding `contents`.
    ///
    /// The file is created exclusively; an existing file with the same name is
    /// an error and is left untouched.
    pub async fn create_migration(
        &self,
        version: &str,
        slug: &str,
        contents: &str,
    ) -> MigrateResult<MigrationFile> {
        let filename = format!("{}_{}{}", version, slug, MIGRATION_SUFFIX);
        let migration = MigrationFile::parse(&self.migrations_dir, &filename)?;

        let write_err = |source| MigrationError::WriteMigration {
            filename: filename.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&migration.path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    MigrationError::MigrationExists(filename.clone())
                } else {
                    write_err(e)
                }
            })?;

        file.write_all(contents.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        Ok(migration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "SELECT 1;").unwrap();
    }

    fn names(files: &[MigrationFile]) -> Vec<&str> {
        files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn test_parse_migration_filename() {
        let (version, slug) = parse_migration_filename("20231215120000_create_users.sql").unwrap();
        assert_eq!(version, "20231215120000");
        assert_eq!(slug, "create_users");
    }

    #[test]
    fn test_parse_migration_filename_invalid() {
        for name in [
            "20231215120000_.sql",
            "2023121512000_short.sql",
            "20231215120000-create.sql",
            "2023121512000a_create.sql",
            "create_users.sql",
            "20231215120000_create.txt",
            "20231215120000.sql",
        ] {
            let err = parse_migration_filename(name).unwrap_err();
            assert!(
                err.to_string().starts_with("invalid migration filename"),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_slug_accessor() {
        let file = MigrationFile::parse(Path::new("m"), "20240101000000_add_index.sql").unwrap();
        assert_eq!(file.slug(), "add_index");
        assert_eq!(file.path, PathBuf::from("m/20240101000000_add_index.sql"));
    }

    #[test]
    fn test_order_migrations_is_total() {
        let dir = Path::new("m");
        let files = vec![
            MigrationFile::parse(dir, "20240301000000_c.sql").unwrap(),
            MigrationFile::parse(dir, "20240101000000_a.sql").unwrap(),
            MigrationFile::parse(dir, "20240201000000_b.sql").unwrap(),
        ];
        let ordered = order_migrations(files).unwrap();
        assert_eq!(
            names(&ordered),
            vec![
                "20240101000000_a.sql",
                "20240201000000_b.sql",
                "20240301000000_c.sql"
            ]
        );
    }

    #[test]
    fn test_order_migrations_rejects_duplicates() {
        let dir = Path::new("m");
        let files = vec![
            MigrationFile::parse(dir, "20240101000000_zeta.sql").unwrap(),
            MigrationFile::parse(dir, "20240101000000_alpha.sql").unwrap(),
        ];
        match order_migrations(files).unwrap_err() {
            MigrationError::DuplicateVersion {
                version,
                first,
                second,
            } => {
                assert_eq!(version, "20240101000000");
                assert_eq!(first, "20240101000000_alpha.sql");
                assert_eq!(second, "20240101000000_zeta.sql");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Add users table").as_deref(), Some("add_users_table"));
        assert_eq!(slugify("  --Create   INDEX!! ").as_deref(), Some("create_index"));
        assert_eq!(slugify("v2: rename/col").as_deref(), Some("v2_rename_col"));
        assert_eq!(slugify("!!!"), None);
        assert_eq!(slugify("   "), None);
    }

    #[test]
    fn test_version_for() {
        let ts = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(version_for(ts), "20240305070809");
    }

    #[tokio::test]
    async fn test_list_migrations_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240301000000_third.sql");
        write(tmp.path(), "20240101000000_first.sql");
        write(tmp.path(), "20240201000000_second.sql");
        write(tmp.path(), "README.md");
        std::fs::create_dir(tmp.path().join("20240401000000_nested.sql")).unwrap();

        let manager = MigrationFileManager::new(tmp.path());
        let files = manager.list_migrations().await.unwrap();

        assert_eq!(
            names(&files),
            vec![
                "20240101000000_first.sql",
                "20240201000000_second.sql",
                "20240301000000_third.sql"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_migrations_rejects_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240101000000_first.sql");
        write(tmp.path(), "oops.sql");

        let manager = MigrationFileManager::new(tmp.path());
        let err = manager.list_migrations().await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidFilename { .. }));
        assert!(err.to_string().contains("oops.sql"));
    }

    #[tokio::test]
    async fn test_list_migrations_rejects_duplicate_versions() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240101000000_one.sql");
        write(tmp.path(), "20240101000000_two.sql");

        let manager = MigrationFileManager::new(tmp.path());
        let err = manager.list_migrations().await.unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateVersion { .. }));
    }

    #[tokio::test]
    async fn test_require_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = MigrationFileManager::new(tmp.path().join("nope"));
        assert!(matches!(
            missing.require_dir().await,
            Err(MigrationError::MissingDirectory(_))
        ));

        write(tmp.path(), "plain");
        let file = MigrationFileManager::new(tmp.path().join("plain"));
        assert!(matches!(
            file.require_dir().await,
            Err(MigrationError::NotADirectory(_))
        ));

        assert!(MigrationFileManager::new(tmp.path()).require_dir().await.is_ok());
    }

    #[tokio::test]
    async fn test_create_migration_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = MigrationFileManager::new(tmp.path());

        let created = manager
            .create_migration("20240101000000", "add_users", "-- body\n")
            .await
            .unwrap();
        assert_eq!(created.filename, "20240101000000_add_users.sql");
        assert_eq!(std::fs::read_to_string(&created.path).unwrap(), "-- body\n");

        let err = manager
            .create_migration("20240101000000", "add_users", "-- other\n")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::MigrationExists(_)));
        assert_eq!(std::fs::read_to_string(&created.path).unwrap(), "-- body\n");
    }

    #[tokio::test]
    async fn test_find_by_slug() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "20240201000000_add_users.sql");
        write(tmp.path(), "20240101000000_add_users.sql");
        write(tmp.path(), "20240301000000_add_users_index.sql");
        write(tmp.path(), "broken.sql");

        let manager = MigrationFileManager::new(tmp.path());
        assert_eq!(
            manager.find_by_slug("add_users").await.unwrap(),
            vec![
                "20240101000000_add_users.sql".to_string(),
                "20240201000000_add_users.sql".to_string()
            ]
        );
    }
}
