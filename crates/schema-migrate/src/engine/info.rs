//! Reconciliation of resolved and applied migrations for display.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MigrationConfig;
use crate::core::migration::{AppliedMigration, MigrationType, ResolvedMigration};
use crate::core::version::MigrationVersion;

/// Reconciled state of a single migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Resolved and due to be applied on the next run.
    Pending,

    /// Resolved below the highest applied version with out-of-order
    /// disabled: reported, never silently applied.
    Ignored,

    /// Resolved above the configured target version.
    AboveTarget,

    /// Applied successfully.
    Success,

    /// Applied and failed.
    Failed,

    /// Applied, but not resolvable here and above every resolved
    /// version: belongs to a newer, not-yet-deployed release.
    Future,

    /// Applied, but no longer resolvable and not above the catalog:
    /// its script disappeared.
    Missing,

    /// The synthetic init marker.
    Baseline,
}

/// One line of the reconciliation report.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationInfo {
    pub version: Option<MigrationVersion>,
    pub description: String,
    pub migration_type: MigrationType,
    pub script: String,
    pub checksum: Option<i32>,
    pub state: MigrationState,
    pub installed_on: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
}

/// Build the reconciliation view: every resolved and every applied
/// migration, each with its state, sorted by version (marker rows and
/// version-less rows sort by their ledger rank, first).
pub fn build_info(
    config: &MigrationConfig,
    resolved: &[ResolvedMigration],
    applied: &[AppliedMigration],
) -> Vec<MigrationInfo> {
    let applied_by_version: HashMap<&MigrationVersion, &AppliedMigration> = applied
        .iter()
        .filter_map(|row| row.version.as_ref().map(|v| (v, row)))
        .collect();
    let max_applied = applied
        .iter()
        .filter(|row| row.success)
        .filter_map(|row| row.version.as_ref())
        .max();
    let max_resolved = resolved.last().map(|m| &m.version);

    let mut lines = Vec::new();

    for migration in resolved {
        if let Some(row) = applied_by_version.get(&migration.version) {
            lines.push(from_applied(row));
            continue;
        }

        let state = if config
            .target
            .as_ref()
            .is_some_and(|target| &migration.version > target)
        {
            MigrationState::AboveTarget
        } else if !config.out_of_order
            && max_applied.is_some_and(|max| &migration.version < max)
        {
            MigrationState::Ignored
        } else {
            MigrationState::Pending
        };

        lines.push(MigrationInfo {
            version: Some(migration.version.clone()),
            description: migration.description.clone(),
            migration_type: MigrationType::Sql,
            script: migration.script.clone(),
            checksum: Some(migration.checksum),
            state,
            installed_on: None,
            execution_time_ms: None,
        });
    }

    let resolved_versions: HashMap<&MigrationVersion, ()> =
        resolved.iter().map(|m| (&m.version, ())).collect();
    for row in applied {
        let covered = row
            .version
            .as_ref()
            .is_some_and(|v| resolved_versions.contains_key(v));
        if covered {
            continue;
        }

        let state = if row.migration_type == MigrationType::Init {
            MigrationState::Baseline
        } else {
            let future = match (&row.version, max_resolved) {
                (Some(v), Some(max)) => v > max,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if future {
                MigrationState::Future
            } else if row.success {
                MigrationState::Missing
            } else {
                MigrationState::Failed
            }
        };
        let mut line = from_applied(row);
        line.state = state;
        lines.push(line);
    }

    // Version order; rank breaks ties and orders version-less rows.
    lines.sort_by(|a, b| match (&a.version, &b.version) {
        (Some(va), Some(vb)) => va.cmp(vb),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    lines
}

fn from_applied(row: &AppliedMigration) -> MigrationInfo {
    MigrationInfo {
        version: row.version.clone(),
        description: row.description.clone(),
        migration_type: row.migration_type,
        script: row.script.clone(),
        checksum: row.checksum,
        state: state_of_applied(row),
        installed_on: Some(row.installed_on),
        execution_time_ms: Some(row.execution_time_ms),
    }
}

fn state_of_applied(row: &AppliedMigration) -> MigrationState {
    if row.migration_type == MigrationType::Init {
        MigrationState::Baseline
    } else if row.success {
        MigrationState::Success
    } else {
        MigrationState::Failed
    }
}
