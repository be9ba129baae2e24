//! Engine configuration.

mod types;
mod validation;

pub use types::MigrationConfig;

use crate::error::Result;
use crate::script::PlaceholderReplacer;

impl MigrationConfig {
    /// Validate the configuration. Called eagerly by the engine before
    /// anything touches the database.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Build the placeholder replacer for this configuration.
    pub fn placeholder_replacer(&self) -> PlaceholderReplacer {
        PlaceholderReplacer::new(
            self.placeholders.clone(),
            self.placeholder_prefix.clone(),
            self.placeholder_suffix.clone(),
        )
    }
}
