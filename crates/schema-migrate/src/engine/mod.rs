//! Migration engine - main workflow coordinator.
//!
//! Reconciles the resolved catalog against the applied ledger under the
//! cross-process migration lock, executes what is pending in version
//! order, and records every attempt. Also carries the operational
//! surface: validate, clean, info, init and repair.

pub mod info;

pub use info::{MigrationInfo, MigrationState};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::core::migration::{AppliedMigration, MigrationType, ResolvedMigration};
use crate::core::traits::{DatabaseInfo, SqlExecutor};
use crate::core::version::MigrationVersion;
use crate::dialect::{self, Dialect};
use crate::error::{MigrateError, Result};
use crate::ledger::{LedgerEntry, MetadataLedger};
use crate::resolver::MigrationResolver;
use crate::script::StatementTokenizer;

/// Result of a migrate run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Schema the run targeted.
    pub schema: String,

    /// Number of migrations applied by this run.
    pub migrations_applied: usize,

    /// Highest successfully applied version after the run.
    pub current_version: Option<MigrationVersion>,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: i64,
}

/// Result of a repair run.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    /// Failed rows removed from the ledger.
    pub failed_rows_removed: u64,

    /// Successful rows whose checksum was realigned with the catalog.
    pub checksums_realigned: u64,
}

/// The migration engine.
///
/// Construction validates the configuration, queries the connection's
/// identity once and selects the dialect for the engine's lifetime.
pub struct MigrationEngine {
    config: MigrationConfig,
    exec: Arc<dyn SqlExecutor>,
    dialect: Box<dyn Dialect>,
    database: DatabaseInfo,
}

impl MigrationEngine {
    /// Create an engine over a validated configuration and an executor.
    pub async fn new(config: MigrationConfig, exec: Arc<dyn SqlExecutor>) -> Result<Self> {
        config.validate()?;
        let database = exec.database_info().await?;
        let dialect = dialect::for_database(&database)?;
        debug!(
            "Using {} dialect for {} {}.{}",
            dialect.name(),
            database.product_name,
            database.major_version,
            database.minor_version
        );
        Ok(Self {
            config,
            exec,
            dialect,
            database,
        })
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn ledger(&self) -> MetadataLedger<'_> {
        MetadataLedger::new(
            self.exec.as_ref(),
            self.dialect.as_ref(),
            &self.config.schema,
            &self.config.table,
        )
    }

    fn installed_by(&self) -> String {
        self.config
            .installed_by
            .clone()
            .unwrap_or_else(|| self.database.username.clone())
    }

    /// Apply all pending migrations.
    ///
    /// Runs INIT → ensure ledger → lock → reconcile → execute/record →
    /// unlock. The first statement failure aborts the run after its
    /// failure row is durably written.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let started = Instant::now();
        let resolved = MigrationResolver::new(&self.config).resolve()?;

        let ledger = self.ledger();
        ledger.ensure_exists().await?;

        ledger.lock().await?;
        let result = self.migrate_locked(&ledger, &resolved).await;
        if let Err(e) = ledger.unlock().await {
            warn!("Failed to release migration lock: {}", e);
        }
        let (applied_count, current_version) = result?;

        let report = MigrationReport {
            schema: self.config.schema.clone(),
            migrations_applied: applied_count,
            current_version,
            duration_ms: started.elapsed().as_millis() as i64,
        };
        info!(
            "Schema {} at version {} ({} migration(s) applied in {}ms)",
            report.schema,
            report
                .current_version
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            report.migrations_applied,
            report.duration_ms
        );
        Ok(report)
    }

    async fn migrate_locked(
        &self,
        ledger: &MetadataLedger<'_>,
        resolved: &[ResolvedMigration],
    ) -> Result<(usize, Option<MigrationVersion>)> {
        // The view read here, inside the locked section, is
        // authoritative for the whole run.
        let mut applied = ledger.read_all().await?;

        if self.config.validate_on_migrate {
            if let Err(e) = validate_applied(&self.config, resolved, &applied) {
                if !self.config.clean_on_validation_error {
                    return Err(e);
                }
                warn!(
                    "Validation failed ({}). clean_on_validation_error is set: \
                     dropping ALL objects in schema {} and migrating from scratch",
                    e, self.config.schema
                );
                self.clean().await?;
                ledger.ensure_exists().await?;
                applied = Vec::new();
            }
        }

        failed_row_guard(&self.config, resolved, &applied)?;

        let pending = select_pending(&self.config, resolved, &applied);
        if pending.is_empty() {
            info!("Schema {} is up to date, no migrations necessary", self.config.schema);
            return Ok((0, ledger.latest_applied_version().await?));
        }

        info!(
            "Applying {} pending migration(s) to schema {}",
            pending.len(),
            self.config.schema
        );
        for migration in &pending {
            self.apply_migration(ledger, migration).await?;
        }

        Ok((pending.len(), ledger.latest_applied_version().await?))
    }

    /// Execute one migration and record the attempt.
    ///
    /// Statements run sequentially inside one transaction together with
    /// the success row. On failure the partial work is rolled back and
    /// the failure row is committed on its own, so the attempt stays
    /// visible to later runs either way.
    async fn apply_migration(
        &self,
        ledger: &MetadataLedger<'_>,
        migration: &ResolvedMigration,
    ) -> Result<()> {
        info!(
            "Migrating schema {} to version {} - {}",
            self.config.schema,
            migration.version,
            migration.description
        );

        let sql = self.config.placeholder_replacer().replace(&migration.sql);
        let tokenizer =
            StatementTokenizer::new(self.dialect.default_delimiter(), self.dialect.quote_rules());
        let statements = tokenizer.tokenize(&migration.script, &sql)?;

        let started = Instant::now();
        self.exec.begin().await?;
        for statement in &statements {
            debug!(
                "Executing statement from {} line {}",
                migration.script, statement.line_number
            );
            if let Err(e) = self.exec.execute(&statement.sql).await {
                let elapsed = started.elapsed().as_millis() as i64;
                if let Err(rollback_err) = self.exec.rollback().await {
                    warn!("Rollback after failed migration errored: {}", rollback_err);
                }

                self.exec.begin().await?;
                ledger.append(self.entry_for(migration, elapsed, false)).await?;
                self.exec.commit().await?;

                return Err(MigrateError::StatementExecution {
                    script: migration.script.clone(),
                    line: statement.line_number,
                    message: e.to_string(),
                });
            }
        }

        let elapsed = started.elapsed().as_millis() as i64;
        ledger.append(self.entry_for(migration, elapsed, true)).await?;
        self.exec.commit().await?;

        info!("Applied version {} in {}ms", migration.version, elapsed);
        Ok(())
    }

    fn entry_for(
        &self,
        migration: &ResolvedMigration,
        execution_time_ms: i64,
        success: bool,
    ) -> LedgerEntry {
        LedgerEntry {
            version: Some(migration.version.clone()),
            description: migration.description.clone(),
            migration_type: MigrationType::Sql,
            script: migration.script.clone(),
            checksum: Some(migration.checksum),
            installed_by: self.installed_by(),
            execution_time_ms,
            success,
        }
    }

    /// Compare the applied ledger against the resolved catalog without
    /// changing anything.
    pub async fn validate(&self) -> Result<()> {
        let resolved = MigrationResolver::new(&self.config).resolve()?;
        if !self
            .dialect
            .table_exists(self.exec.as_ref(), &self.config.schema, &self.config.table)
            .await?
        {
            info!("No migration ledger in schema {}, nothing to validate", self.config.schema);
            return Ok(());
        }
        let applied = self.ledger().read_all().await?;
        validate_applied(&self.config, &resolved, &applied)?;
        info!(
            "Validated schema {}: {} applied migration(s) match the catalog",
            self.config.schema,
            applied.len()
        );
        Ok(())
    }

    /// Drop every object in the target schema, including the ledger.
    ///
    /// Irreversible. Development-only semantics.
    pub async fn clean(&self) -> Result<usize> {
        warn!(
            "Cleaning schema {}: dropping ALL objects. This cannot be undone",
            self.config.schema
        );
        let statements = self
            .dialect
            .list_drop_statements(self.exec.as_ref(), &self.config.schema)
            .await?;
        for sql in &statements {
            debug!("Executing: {}", sql);
            self.exec.execute(sql).await?;
        }
        info!(
            "Cleaned schema {} ({} object(s) dropped)",
            self.config.schema,
            statements.len()
        );
        Ok(statements.len())
    }

    /// Full reconciliation of resolved and applied migrations.
    pub async fn info(&self) -> Result<Vec<MigrationInfo>> {
        let resolved = MigrationResolver::new(&self.config).resolve()?;
        let applied = if self
            .dialect
            .table_exists(self.exec.as_ref(), &self.config.schema, &self.config.table)
            .await?
        {
            self.ledger().read_all().await?
        } else {
            Vec::new()
        };
        Ok(info::build_info(&self.config, &resolved, &applied))
    }

    /// Seed an empty ledger with a baseline marker, without running any
    /// script. Refused once anything has been recorded.
    pub async fn init(
        &self,
        version: Option<MigrationVersion>,
        description: Option<String>,
    ) -> Result<AppliedMigration> {
        let ledger = self.ledger();
        ledger.ensure_exists().await?;

        ledger.lock().await?;
        let result = self.init_locked(&ledger, version, description).await;
        if let Err(e) = ledger.unlock().await {
            warn!("Failed to release migration lock: {}", e);
        }
        result
    }

    async fn init_locked(
        &self,
        ledger: &MetadataLedger<'_>,
        version: Option<MigrationVersion>,
        description: Option<String>,
    ) -> Result<AppliedMigration> {
        if !ledger.read_all().await?.is_empty() {
            return Err(MigrateError::config(
                "init is only allowed on an empty ledger; migrations have already been recorded",
            ));
        }

        let version = version.unwrap_or_else(|| self.config.init_version.clone());
        let description = description.unwrap_or_else(|| self.config.init_description.clone());

        self.exec.begin().await?;
        let row = ledger
            .append(LedgerEntry {
                version: Some(version.clone()),
                description: description.clone(),
                migration_type: MigrationType::Init,
                script: description,
                checksum: None,
                installed_by: self.installed_by(),
                execution_time_ms: 0,
                success: true,
            })
            .await?;
        self.exec.commit().await?;

        info!("Initialized ledger in schema {} at version {}", self.config.schema, version);
        Ok(row)
    }

    /// Remove failed rows and realign checksums of successful rows with
    /// the resolved catalog. Operator-invoked, outside the automatic
    /// flow.
    pub async fn repair(&self) -> Result<RepairReport> {
        let resolved = MigrationResolver::new(&self.config).resolve()?;
        let ledger = self.ledger();
        ledger.ensure_exists().await?;

        ledger.lock().await?;
        let result = self.repair_locked(&ledger, &resolved).await;
        if let Err(e) = ledger.unlock().await {
            warn!("Failed to release migration lock: {}", e);
        }
        result
    }

    async fn repair_locked(
        &self,
        ledger: &MetadataLedger<'_>,
        resolved: &[ResolvedMigration],
    ) -> Result<RepairReport> {
        self.exec.begin().await?;

        let removed = ledger.remove_failed_rows().await?;
        let applied = ledger.read_all().await?;
        let applied_checksums: HashMap<&MigrationVersion, Option<i32>> = applied
            .iter()
            .filter(|row| row.success && row.migration_type == MigrationType::Sql)
            .filter_map(|row| row.version.as_ref().map(|v| (v, row.checksum)))
            .collect();

        let mut realigned = 0u64;
        for migration in resolved {
            if let Some(stored) = applied_checksums.get(&migration.version) {
                if *stored != Some(migration.checksum) {
                    ledger.update_checksum(&migration.version, migration.checksum).await?;
                    info!(
                        "Repaired checksum of version {} ({:?} -> {})",
                        migration.version,
                        stored,
                        migration.checksum
                    );
                    realigned += 1;
                }
            }
        }

        self.exec.commit().await?;

        if removed > 0 {
            info!("Removed {} failed row(s) from the ledger", removed);
        }
        Ok(RepairReport {
            failed_rows_removed: removed,
            checksums_realigned: realigned,
        })
    }
}

/// Select the pending set: resolved migrations not yet successfully
/// applied, capped by the target version, with below-max versions
/// skipped (and warned about) unless out-of-order is enabled.
fn select_pending<'m>(
    config: &MigrationConfig,
    resolved: &'m [ResolvedMigration],
    applied: &[AppliedMigration],
) -> Vec<&'m ResolvedMigration> {
    let applied_versions: HashSet<&MigrationVersion> = applied
        .iter()
        .filter(|row| row.success)
        .filter_map(|row| row.version.as_ref())
        .collect();
    let max_applied = applied_versions.iter().max().copied();

    let mut pending = Vec::new();
    for migration in resolved {
        if applied_versions.contains(&migration.version) {
            continue;
        }
        if let Some(target) = &config.target {
            if &migration.version > target {
                debug!("Migration {} is above target {}, not applied", migration.version, target);
                continue;
            }
        }
        if let Some(max) = max_applied {
            if &migration.version < max && !config.out_of_order {
                warn!(
                    "Migration {} ({}) resolved below current version {} and out-of-order \
                     is disabled: skipped",
                    migration.version, migration.script, max
                );
                continue;
            }
        }
        pending.push(migration);
    }
    pending
}

/// Abort when the ledger carries a failed attempt, unless the failure
/// belongs to a version above everything resolvable and the
/// ignore-failed-future policy tolerates it.
fn failed_row_guard(
    config: &MigrationConfig,
    resolved: &[ResolvedMigration],
    applied: &[AppliedMigration],
) -> Result<()> {
    let max_resolved = resolved.last().map(|m| &m.version);

    for row in applied.iter().filter(|row| !row.success) {
        let is_future = match (&row.version, max_resolved) {
            (Some(v), Some(max)) => v > max,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if is_future && config.ignore_failed_future_migration {
            warn!(
                "Ignoring failed migration {} from a newer release",
                row.version.as_ref().map(|v| v.to_string()).unwrap_or_default()
            );
            continue;
        }
        return Err(MigrateError::Validation(format!(
            "Migration {} previously failed ({}); repair the ledger before migrating",
            row.version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            row.script
        )));
    }
    Ok(())
}

/// Validate every applied row against the resolved catalog.
///
/// Violations: checksum drift, failed attempts, and successful rows
/// whose script is no longer resolvable below the top of the catalog.
/// All violations are reported together.
fn validate_applied(
    config: &MigrationConfig,
    resolved: &[ResolvedMigration],
    applied: &[AppliedMigration],
) -> Result<()> {
    let resolved_by_version: HashMap<&MigrationVersion, &ResolvedMigration> =
        resolved.iter().map(|m| (&m.version, m)).collect();
    let max_resolved = resolved.last().map(|m| &m.version);

    let mut violations = Vec::new();
    for row in applied {
        if row.migration_type == MigrationType::Init {
            continue;
        }
        let Some(version) = &row.version else {
            continue;
        };

        match resolved_by_version.get(version) {
            Some(migration) => {
                if !row.success {
                    violations.push(format!(
                        "version {} has a failed attempt recorded",
                        version
                    ));
                } else if row.checksum != Some(migration.checksum) {
                    violations.push(format!(
                        "checksum mismatch for version {} (ledger {}, resolved {})",
                        version,
                        row.checksum.map(|c| c.to_string()).unwrap_or_else(|| "<none>".to_string()),
                        migration.checksum
                    ));
                }
            }
            None => {
                let future = max_resolved.is_none_or(|max| version > max);
                if future {
                    if !row.success && !config.ignore_failed_future_migration {
                        violations.push(format!(
                            "version {} from a newer release failed and is not ignored",
                            version
                        ));
                    }
                } else if row.success {
                    violations.push(format!(
                        "version {} was applied but is no longer resolvable",
                        version
                    ));
                } else {
                    violations.push(format!(
                        "version {} has a failed attempt recorded and is no longer resolvable",
                        version
                    ));
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(MigrateError::Validation(violations.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resolved(version: &str, checksum: i32) -> ResolvedMigration {
        ResolvedMigration {
            version: MigrationVersion::parse(version).unwrap(),
            description: format!("m {}", version),
            script: format!("V{}__m.sql", version),
            checksum,
            sql: "SELECT 1;".to_string(),
        }
    }

    fn applied(rank: i32, version: &str, checksum: i32, success: bool) -> AppliedMigration {
        AppliedMigration {
            installed_rank: rank,
            version: Some(MigrationVersion::parse(version).unwrap()),
            description: format!("m {}", version),
            migration_type: MigrationType::Sql,
            script: format!("V{}__m.sql", version),
            checksum: Some(checksum),
            installed_by: "tester".to_string(),
            installed_on: Utc::now(),
            execution_time_ms: 3,
            success,
        }
    }

    #[test]
    fn test_pending_excludes_applied_versions() {
        let config = MigrationConfig::default();
        let catalog = [resolved("1", 1), resolved("2", 2)];
        let pending = select_pending(&config, &catalog, &[applied(1, "1", 1, true)]);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version.to_string(), "2");
    }

    #[test]
    fn test_pending_skips_below_max_without_out_of_order() {
        let config = MigrationConfig::default();
        let catalog = [resolved("1", 1), resolved("2", 2), resolved("3", 3)];
        let ledger = [applied(1, "1", 1, true), applied(2, "3", 3, true)];
        let pending = select_pending(&config, &catalog, &ledger);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_pending_includes_gap_with_out_of_order() {
        let config = MigrationConfig {
            out_of_order: true,
            ..Default::default()
        };
        let catalog = [resolved("1", 1), resolved("2", 2), resolved("3", 3)];
        let ledger = [applied(1, "1", 1, true), applied(2, "3", 3, true)];
        let pending = select_pending(&config, &catalog, &ledger);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version.to_string(), "2");
    }

    #[test]
    fn test_pending_respects_target() {
        let config = MigrationConfig {
            target: Some(MigrationVersion::parse("2").unwrap()),
            ..Default::default()
        };
        let catalog = [resolved("1", 1), resolved("2", 2), resolved("3", 3)];
        let pending = select_pending(&config, &catalog, &[]);
        let versions: Vec<String> = pending.iter().map(|m| m.version.to_string()).collect();
        assert_eq!(versions, vec!["1", "2"]);
    }

    #[test]
    fn test_failed_row_blocks_migrate() {
        let config = MigrationConfig::default();
        let catalog = [resolved("1", 1), resolved("2", 2)];
        let ledger = [applied(1, "1", 1, true), applied(2, "2", 2, false)];
        let err = failed_row_guard(&config, &catalog, &ledger).unwrap_err();
        assert!(err.to_string().contains("repair"));
    }

    #[test]
    fn test_failed_future_row_tolerated_with_policy() {
        let config = MigrationConfig {
            ignore_failed_future_migration: true,
            ..Default::default()
        };
        let catalog = [resolved("1", 1)];
        let ledger = [applied(1, "1", 1, true), applied(2, "9", 9, false)];
        assert!(failed_row_guard(&config, &catalog, &ledger).is_ok());

        let strict = MigrationConfig::default();
        assert!(failed_row_guard(&strict, &catalog, &ledger).is_err());
    }

    #[test]
    fn test_validation_detects_checksum_drift() {
        let config = MigrationConfig::default();
        let catalog = [resolved("1", 111)];
        let ledger = [applied(1, "1", 222, true)];
        let err = validate_applied(&config, &catalog, &ledger).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch for version 1"));
    }

    #[test]
    fn test_validation_accepts_matching_ledger() {
        let config = MigrationConfig::default();
        let catalog = [resolved("1", 111), resolved("2", 222)];
        let ledger = [applied(1, "1", 111, true)];
        assert!(validate_applied(&config, &catalog, &ledger).is_ok());
    }

    #[test]
    fn test_validation_flags_missing_migration() {
        let config = MigrationConfig::default();
        let catalog = [resolved("2", 222)];
        let ledger = [applied(1, "1", 111, true), applied(2, "2", 222, true)];
        let err = validate_applied(&config, &catalog, &ledger).unwrap_err();
        assert!(err.to_string().contains("no longer resolvable"));
    }

    #[test]
    fn test_validation_ignores_baseline_marker() {
        let config = MigrationConfig::default();
        let marker = AppliedMigration {
            migration_type: MigrationType::Init,
            checksum: None,
            ..applied(1, "1", 0, true)
        };
        assert!(validate_applied(&config, &[], &[marker]).is_ok());
    }
}
