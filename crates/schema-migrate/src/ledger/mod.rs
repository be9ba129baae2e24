//! The applied-migrations ledger.
//!
//! A dedicated table in the target schema records every migration
//! attempt, success or failure, in append-only `installed_rank` order.
//! The ledger is the cross-process source of truth: reconciliation
//! reads it under the migration lock, and every execution appends to it
//! within the same transaction scope as the migration it records.

use chrono::Utc;
use tracing::{debug, info};

use crate::core::migration::{AppliedMigration, MigrationType};
use crate::core::traits::SqlExecutor;
use crate::core::value::SqlValue;
use crate::core::version::MigrationVersion;
use crate::dialect::Dialect;
use crate::error::Result;

/// A row to be appended to the ledger. Rank and timestamp are assigned
/// by the ledger on append.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub version: Option<MigrationVersion>,
    pub description: String,
    pub migration_type: MigrationType,
    pub script: String,
    pub checksum: Option<i32>,
    pub installed_by: String,
    pub execution_time_ms: i64,
    pub success: bool,
}

/// Handle on the ledger table of one schema.
pub struct MetadataLedger<'a> {
    exec: &'a dyn SqlExecutor,
    dialect: &'a dyn Dialect,
    schema: &'a str,
    table: &'a str,
}

impl<'a> MetadataLedger<'a> {
    /// Create a ledger handle. Nothing is touched until a method runs.
    pub fn new(
        exec: &'a dyn SqlExecutor,
        dialect: &'a dyn Dialect,
        schema: &'a str,
        table: &'a str,
    ) -> Self {
        Self {
            exec,
            dialect,
            schema,
            table,
        }
    }

    fn qualified(&self) -> String {
        self.dialect.qualify(self.schema, self.table)
    }

    /// Create the backing table if absent. Idempotent; a concurrent
    /// creator winning the race is not an error.
    pub async fn ensure_exists(&self) -> Result<()> {
        if self
            .dialect
            .table_exists(self.exec, self.schema, self.table)
            .await?
        {
            return Ok(());
        }

        info!("Creating migration ledger table {}", self.qualified());
        let ddl = self.dialect.create_ledger_table_sql(self.schema, self.table);
        match self.exec.execute(&ddl).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.to_string().to_lowercase();
                if message.contains("already exists") || message.contains("duplicate") {
                    debug!("Ledger table {} created concurrently", self.qualified());
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Read the full ledger, ordered by `installed_rank` ascending.
    pub async fn read_all(&self) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT installed_rank, version, description, type, script, checksum, \
             installed_by, installed_on, execution_time, success \
             FROM {} ORDER BY installed_rank",
            self.qualified()
        );
        let rows = self.exec.query(&sql).await?;
        rows.iter().map(AppliedMigration::from_row).collect()
    }

    /// Append a row with the next `installed_rank`.
    pub async fn append(&self, entry: LedgerEntry) -> Result<AppliedMigration> {
        let rank = self.next_rank().await?;
        let installed_on = Utc::now();

        let placeholders: Vec<String> = (1..=10)
            .map(|i| self.dialect.param_placeholder(i))
            .collect();
        let sql = format!(
            "INSERT INTO {} (installed_rank, version, description, type, script, checksum, \
             installed_by, installed_on, execution_time, success) VALUES ({})",
            self.qualified(),
            placeholders.join(", ")
        );

        let params = vec![
            SqlValue::I32(rank),
            entry
                .version
                .as_ref()
                .map(|v| SqlValue::Text(v.to_string()))
                .unwrap_or(SqlValue::Null),
            SqlValue::Text(entry.description.clone()),
            SqlValue::Text(entry.migration_type.as_str().to_string()),
            SqlValue::Text(entry.script.clone()),
            entry.checksum.map(SqlValue::I32).unwrap_or(SqlValue::Null),
            SqlValue::Text(entry.installed_by.clone()),
            SqlValue::Timestamp(installed_on),
            SqlValue::I64(entry.execution_time_ms),
            SqlValue::Bool(entry.success),
        ];
        self.exec.execute_params(&sql, &params).await?;

        Ok(AppliedMigration {
            installed_rank: rank,
            version: entry.version,
            description: entry.description,
            migration_type: entry.migration_type,
            script: entry.script,
            checksum: entry.checksum,
            installed_by: entry.installed_by,
            installed_on,
            execution_time_ms: entry.execution_time_ms,
            success: entry.success,
        })
    }

    /// Highest version among successful rows, if any.
    pub async fn latest_applied_version(&self) -> Result<Option<MigrationVersion>> {
        let applied = self.read_all().await?;
        Ok(applied
            .into_iter()
            .filter(|m| m.success)
            .filter_map(|m| m.version)
            .max())
    }

    /// Delete rows recorded with `success = false`. Repair surface.
    pub async fn remove_failed_rows(&self) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE success = {}",
            self.qualified(),
            self.dialect.param_placeholder(1)
        );
        self.exec.execute_params(&sql, &[SqlValue::Bool(false)]).await
    }

    /// Overwrite the stored checksum of a successful row. Repair
    /// surface: realigns the ledger with the resolved catalog.
    pub async fn update_checksum(
        &self,
        version: &MigrationVersion,
        checksum: i32,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET checksum = {} WHERE version = {} AND success = {}",
            self.qualified(),
            self.dialect.param_placeholder(1),
            self.dialect.param_placeholder(2),
            self.dialect.param_placeholder(3)
        );
        self.exec
            .execute_params(
                &sql,
                &[
                    SqlValue::I32(checksum),
                    SqlValue::Text(version.to_string()),
                    SqlValue::Bool(true),
                ],
            )
            .await
    }

    /// Acquire the cross-process migration lock guarding this ledger.
    pub async fn lock(&self) -> Result<()> {
        self.dialect
            .acquire_lock(self.exec, self.schema, self.table)
            .await
    }

    /// Release the migration lock.
    pub async fn unlock(&self) -> Result<()> {
        self.dialect
            .release_lock(self.exec, self.schema, self.table)
            .await
    }

    async fn next_rank(&self) -> Result<i32> {
        let sql = format!("SELECT MAX(installed_rank) FROM {}", self.qualified());
        let rows = self.exec.query(&sql).await?;
        match rows.first().and_then(|row| row.first()) {
            None | Some(SqlValue::Null) => Ok(1),
            Some(value) => Ok(value.as_i32()? + 1),
        }
    }
}
