//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::version::MigrationVersion;

/// Engine configuration.
///
/// Built once by the caller, validated eagerly via
/// [`validate`](MigrationConfig::validate), then passed by reference
/// into the engine. There is no mutation after construction.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Filesystem locations scanned for migration scripts.
    pub locations: Vec<PathBuf>,

    /// Target schema. The ledger table lives here and `clean` drops
    /// this schema's objects.
    pub schema: String,

    /// Name of the ledger table.
    pub table: String,

    /// File name prefix for versioned migrations.
    pub sql_migration_prefix: String,

    /// Separator between version and description in file names.
    pub sql_migration_separator: String,

    /// File name suffix for migrations.
    pub sql_migration_suffix: String,

    /// Highest version to apply. Migrations above it stay pending.
    pub target: Option<MigrationVersion>,

    /// Allow applying a migration whose version is below the highest
    /// already-applied version. Off by default: such migrations are
    /// reported and skipped with a warning.
    pub out_of_order: bool,

    /// Tolerate a failed ledger row whose version is above every
    /// currently resolvable migration (it belongs to a newer, not yet
    /// deployed release).
    pub ignore_failed_future_migration: bool,

    /// Run validation before migrating.
    pub validate_on_migrate: bool,

    /// On validation failure, drop all schema objects and migrate from
    /// scratch. Irreversible; development-only semantics.
    pub clean_on_validation_error: bool,

    /// Recorded in the ledger's `installed_by` column. Defaults to the
    /// connection's user when unset.
    pub installed_by: Option<String>,

    /// Version recorded by `init` when none is given.
    pub init_version: MigrationVersion,

    /// Description recorded by `init` when none is given.
    pub init_description: String,

    /// Placeholder values substituted into script text.
    pub placeholders: BTreeMap<String, String>,

    /// Opening marker of a placeholder reference.
    pub placeholder_prefix: String,

    /// Closing marker of a placeholder reference.
    pub placeholder_suffix: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            locations: vec![PathBuf::from("migrations")],
            schema: "public".to_string(),
            table: "schema_version".to_string(),
            sql_migration_prefix: "V".to_string(),
            sql_migration_separator: "__".to_string(),
            sql_migration_suffix: ".sql".to_string(),
            target: None,
            out_of_order: false,
            ignore_failed_future_migration: false,
            validate_on_migrate: false,
            clean_on_validation_error: false,
            installed_by: None,
            init_version: MigrationVersion::parse("1").expect("static version"),
            init_description: "<< init >>".to_string(),
            placeholders: BTreeMap::new(),
            placeholder_prefix: "${".to_string(),
            placeholder_suffix: "}".to_string(),
        }
    }
}
