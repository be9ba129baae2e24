//! Resolved and applied migration records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::value::Row;
use crate::core::version::MigrationVersion;
use crate::error::{MigrateError, Result};

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    /// A versioned SQL script.
    Sql,

    /// Synthetic baseline marker written by `init`; carries no script
    /// content and no checksum.
    Init,
}

impl MigrationType {
    /// Stable string form stored in the ledger's `type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            MigrationType::Sql => "SQL",
            MigrationType::Init => "INIT",
        }
    }

    /// Parse the ledger's `type` column.
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "SQL" => Ok(MigrationType::Sql),
            "INIT" => Ok(MigrationType::Init),
            other => Err(MigrateError::sql(format!(
                "Unknown migration type in ledger: {}",
                other
            ))),
        }
    }
}

/// A migration discovered and parsed from a scan location.
///
/// Immutable once resolved. Statements are not tokenized here: the
/// tokenizer needs the dialect's delimiter rules, so splitting happens
/// at execution time.
#[derive(Debug, Clone)]
pub struct ResolvedMigration {
    /// Version parsed from the script name.
    pub version: MigrationVersion,

    /// Human-readable description parsed from the script name.
    pub description: String,

    /// Script identifier (path relative to its scan location).
    pub script: String,

    /// Content hash over the exact script bytes. Any byte-level change,
    /// including whitespace, changes this value.
    pub checksum: i32,

    /// Raw script text.
    pub sql: String,
}

/// One row of the applied-migrations ledger.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    /// Row order; assigned monotonically on append.
    pub installed_rank: i32,

    /// Migration version. None only for synthetic marker rows.
    pub version: Option<MigrationVersion>,

    /// Description recorded at apply time.
    pub description: String,

    /// Kind of entry.
    pub migration_type: MigrationType,

    /// Script identifier recorded at apply time.
    pub script: String,

    /// Checksum recorded at apply time. None for marker rows.
    pub checksum: Option<i32>,

    /// Database user that performed the run.
    pub installed_by: String,

    /// When the row was written.
    pub installed_on: DateTime<Utc>,

    /// Wall-clock execution time of the migration, in milliseconds.
    pub execution_time_ms: i64,

    /// Whether the migration completed successfully.
    pub success: bool,
}

impl AppliedMigration {
    /// Decode a ledger row in canonical column order: installed_rank,
    /// version, description, type, script, checksum, installed_by,
    /// installed_on, execution_time, success.
    pub fn from_row(row: &Row) -> Result<Self> {
        if row.len() != 10 {
            return Err(MigrateError::sql(format!(
                "Ledger row has {} columns, expected 10",
                row.len()
            )));
        }

        let version = if row[1].is_null() {
            None
        } else {
            Some(MigrationVersion::parse(row[1].as_text()?)?)
        };
        let checksum = if row[5].is_null() {
            None
        } else {
            Some(row[5].as_i32()?)
        };

        Ok(Self {
            installed_rank: row[0].as_i32()?,
            version,
            description: row[2].as_text()?.to_string(),
            migration_type: MigrationType::from_str(row[3].as_text()?)?,
            script: row[4].as_text()?.to_string(),
            checksum,
            installed_by: row[6].as_text()?.to_string(),
            installed_on: row[7].as_timestamp()?,
            execution_time_ms: row[8].as_i64()?,
            success: row[9].as_bool()?,
        })
    }
}
