//! Migration version numbers.
//!
//! A version is a dotted sequence of non-negative integers (`1`, `1.2`,
//! `2.0.13`). Comparison is element-wise numeric with missing trailing
//! elements treated as zero, so `1.2` < `1.10` < `2.0` and `1.0` == `1`.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{MigrateError, Result};

/// An immutable migration version.
///
/// Stored in normalized form (trailing zero elements stripped), which
/// makes the derived ordering and equality match the element-wise
/// numeric semantics directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationVersion {
    parts: Vec<u64>,
}

impl MigrationVersion {
    /// Parse a version string.
    ///
    /// Underscores are accepted as separators and normalized to dots,
    /// matching the migration file naming convention where `V1_2` means
    /// version `1.2`.
    pub fn parse(text: &str) -> Result<Self> {
        let normalized = text.replace('_', ".");
        if normalized.is_empty() {
            return Err(MigrateError::config("Version string cannot be empty"));
        }

        let mut parts = Vec::new();
        for element in normalized.split('.') {
            let number: u64 = element.parse().map_err(|_| {
                MigrateError::config(format!(
                    "Invalid version '{}': element '{}' is not a non-negative integer",
                    text, element
                ))
            })?;
            parts.push(number);
        }

        // Normalize: 1.0 and 1 are the same version.
        while parts.len() > 1 && parts.last() == Some(&0) {
            parts.pop();
        }

        Ok(Self { parts })
    }

    /// The normalized version elements.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }
}

impl FromStr for MigrationVersion {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&text)
    }
}

impl Serialize for MigrationVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
