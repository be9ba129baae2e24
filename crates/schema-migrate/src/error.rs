//! Error types for the migration engine.

use thiserror::Error;

/// Main error type for migration operations.
///
/// The variant is the error kind: callers decide between "abort now"
/// (configuration, resolution, lock) and "recorded, surface to the
/// operator" (statement execution, which always leaves a ledger row)
/// by matching on it rather than on any exception hierarchy.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (duplicate versions, unparseable migration
    /// name, invalid target version string, bad naming convention).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A scan location could not be read.
    #[error("Resolution error at {location}: {source}")]
    Resolution {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// The cross-process migration lock could not be acquired.
    #[error("Unable to acquire migration lock on {table}: {message}. Another migration run may be in progress")]
    LockAcquisition { table: String, message: String },

    /// A migration statement failed. A failure row has been written to
    /// the ledger before this error surfaces.
    #[error("Migration {script} failed at line {line}: {message}")]
    StatementExecution {
        script: String,
        line: u32,
        message: String,
    },

    /// Checksum or ordering drift between the resolved catalog and the
    /// applied ledger. Recoverable only via explicit clean or repair.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A script ended inside a quote or block comment.
    #[error("Malformed script {script} (near line {line}): {message}")]
    MalformedScript {
        script: String,
        line: u32,
        message: String,
    },

    /// Driver-level SQL error outside migration statement execution
    /// (ledger reads, existence checks, metadata queries).
    #[error("SQL error: {0}")]
    Sql(String),

    /// Database metadata could not be determined (product name, engine
    /// version). Fatal: dialect selection depends on it.
    #[error("Unable to determine database metadata: {0}")]
    Metadata(String),
}

impl MigrateError {
    /// Create a Configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        MigrateError::Configuration(message.into())
    }

    /// Create a Resolution error for an unreadable location.
    pub fn resolution(location: impl Into<String>, source: std::io::Error) -> Self {
        MigrateError::Resolution {
            location: location.into(),
            source,
        }
    }

    /// Create a LockAcquisition error.
    pub fn lock(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::LockAcquisition {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Sql error.
    pub fn sql(message: impl Into<String>) -> Self {
        MigrateError::Sql(message.into())
    }

    /// Whether this error was recorded in the ledger before surfacing.
    ///
    /// True only for statement execution failures: the failed migration
    /// has a `success = false` row, so a rerun will see the attempt.
    pub fn is_recorded(&self) -> bool {
        matches!(self, MigrateError::StatementExecution { .. })
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
