//! Writes scripts to disk.
//!
//! Migrations are stored as a pair of files sharing a UTC timestamp:
//! `<YYYYMMDDHHMMSS>-migration.up.sql` and
//! `<YYYYMMDDHHMMSS>-migration.down.sql`. Existing files are never
//! overwritten.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{Result, SchemaError};
use crate::migration::Migration;

/// Timestamp prefix format of migration files.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Generates the base name of a migration created at `timestamp`.
#[must_use]
pub fn generate_migration_name(timestamp: DateTime<Utc>) -> String {
    format!("{}-migration", timestamp.format(TIMESTAMP_FORMAT))
}

/// Writes migrations into a directory.
#[derive(Debug, Clone)]
pub struct MigrationWriter {
    dir: PathBuf,
}

impl MigrationWriter {
    /// Creates a writer for a directory. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of the up and down files for a migration name.
    #[must_use]
    pub fn paths(&self, name: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{name}.up.sql")),
            self.dir.join(format!("{name}.down.sql")),
        )
    }

    /// Writes a migration stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`MigrationWriter::write_at`].
    pub fn write(&self, migration: &Migration) -> Result<(PathBuf, PathBuf)> {
        self.write_at(migration, Utc::now())
    }

    /// Writes a migration stamped with `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::FileExists`] if either file is already
    /// present, or an I/O error.
    pub fn write_at(
        &self,
        migration: &Migration,
        timestamp: DateTime<Utc>,
    ) -> Result<(PathBuf, PathBuf)> {
        let (up, down) = self.paths(&generate_migration_name(timestamp));
        for path in [&up, &down] {
            if path.exists() {
                return Err(SchemaError::FileExists(path.clone()));
            }
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(&up, &migration.up)?;
        fs::write(&down, &migration.down)?;
        info!("Created migration: {}", up.display());
        Ok((up, down))
    }
}

/// Writes an exported script, refusing to overwrite unless `force` is set.
///
/// # Errors
///
/// Returns [`SchemaError::FileExists`] if the file exists and `force` is
/// false, or an I/O error.
pub fn write_script(path: &Path, sql: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(SchemaError::FileExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, sql)?;
    info!("Wrote {}", path.display());
    Ok(())
}
