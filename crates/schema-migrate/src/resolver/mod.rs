//! Migration resolution.
//!
//! Scans the configured locations for migration scripts, parses version
//! and description out of each file name, checksums the exact script
//! bytes and returns the catalog sorted ascending by version. Pure scan
//! and parse: no database access, no side effects.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::MigrationConfig;
use crate::core::migration::ResolvedMigration;
use crate::core::version::MigrationVersion;
use crate::error::{MigrateError, Result};

/// Content hash over exact script bytes: the first four big-endian
/// bytes of the SHA-256 digest, as i32. Whitespace-only edits change
/// the checksum; drift detection is byte-level by design.
pub fn checksum(bytes: &[u8]) -> i32 {
    let digest = Sha256::digest(bytes);
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&digest[..4]);
    i32::from_be_bytes(buf)
}

/// Resolves migrations from filesystem scan locations.
pub struct MigrationResolver<'a> {
    config: &'a MigrationConfig,
}

impl<'a> MigrationResolver<'a> {
    /// Create a resolver over the given configuration.
    pub fn new(config: &'a MigrationConfig) -> Self {
        Self { config }
    }

    /// Scan all locations and produce the sorted migration catalog.
    ///
    /// Two migrations sharing a version, or a file matching the
    /// migration naming pattern whose name does not parse, are fatal
    /// configuration errors. An unreadable location is a resolution
    /// error.
    pub fn resolve(&self) -> Result<Vec<ResolvedMigration>> {
        let mut migrations = Vec::new();
        for location in &self.config.locations {
            self.scan_location(location, &mut migrations)?;
        }

        migrations.sort_by(|a, b| a.version.cmp(&b.version));

        for pair in migrations.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(MigrateError::config(format!(
                    "Found more than one migration with version {}: {} and {}",
                    pair[0].version, pair[0].script, pair[1].script
                )));
            }
        }

        Ok(migrations)
    }

    fn scan_location(&self, location: &Path, out: &mut Vec<ResolvedMigration>) -> Result<()> {
        if !location.is_dir() {
            return Err(MigrateError::resolution(
                location.display().to_string(),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "location does not exist or is not a directory",
                ),
            ));
        }

        for entry in WalkDir::new(location).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk error"));
                MigrateError::resolution(location.display().to_string(), io)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(&self.config.sql_migration_suffix)
                || !name.starts_with(&self.config.sql_migration_prefix)
            {
                debug!("Skipping non-migration file: {}", entry.path().display());
                continue;
            }

            let (version, description) = self.parse_name(&name)?;

            let bytes = std::fs::read(entry.path())
                .map_err(|e| MigrateError::resolution(entry.path().display().to_string(), e))?;

            let script = entry
                .path()
                .strip_prefix(location)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            out.push(ResolvedMigration {
                version,
                description,
                script,
                checksum: checksum(&bytes),
                sql: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(())
    }

    /// Parse `V{version}__{description}.sql` per the configured naming
    /// convention.
    fn parse_name(&self, name: &str) -> Result<(MigrationVersion, String)> {
        let stem = name
            .strip_prefix(&self.config.sql_migration_prefix)
            .and_then(|s| s.strip_suffix(&self.config.sql_migration_suffix))
            .ok_or_else(|| bad_name(name, self.config))?;

        let (version_part, description_part) = stem
            .split_once(&self.config.sql_migration_separator)
            .ok_or_else(|| bad_name(name, self.config))?;

        let version = MigrationVersion::parse(version_part)
            .map_err(|_| bad_name(name, self.config))?;
        let description = description_part.replace('_', " ").trim().to_string();

        if description.is_empty() {
            return Err(bad_name(name, self.config));
        }

        Ok((version, description))
    }
}

fn bad_name(name: &str, config: &MigrationConfig) -> MigrateError {
    MigrateError::config(format!(
        "Invalid migration file name: {} (expected {}<version>{}<description>{})",
        name,
        config.sql_migration_prefix,
        config.sql_migration_separator,
        config.sql_migration_suffix
    ))
}
