//! Configuration validation.

use crate::config::types::MigrationConfig;
use crate::error::{MigrateError, Result};

pub(crate) fn validate(config: &MigrationConfig) -> Result<()> {
    if config.locations.is_empty() {
        return Err(MigrateError::config(
            "At least one migration location must be configured",
        ));
    }

    require_non_empty("schema", &config.schema)?;
    require_non_empty("table", &config.table)?;
    require_non_empty("sql_migration_prefix", &config.sql_migration_prefix)?;
    require_non_empty("sql_migration_separator", &config.sql_migration_separator)?;
    require_non_empty("sql_migration_suffix", &config.sql_migration_suffix)?;
    require_non_empty("placeholder_prefix", &config.placeholder_prefix)?;
    require_non_empty("placeholder_suffix", &config.placeholder_suffix)?;

    if config.sql_migration_prefix.contains(&config.sql_migration_separator) {
        return Err(MigrateError::config(format!(
            "sql_migration_prefix '{}' must not contain the separator '{}'",
            config.sql_migration_prefix, config.sql_migration_separator
        )));
    }

    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(MigrateError::config(format!("{} cannot be empty", field)));
    }
    Ok(())
}
