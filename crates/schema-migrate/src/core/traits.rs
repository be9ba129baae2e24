//! The consumed database capability.
//!
//! The engine never opens connections itself. Everything it needs from
//! the connectivity layer is behind [`SqlExecutor`]: run a statement,
//! read rows, scope a transaction, and report engine metadata. Real
//! deployments implement this over their driver of choice; tests
//! implement it in memory.

use async_trait::async_trait;

use crate::core::value::{Row, SqlValue};
use crate::error::Result;

/// Engine identity reported by the connection.
///
/// Determined once per engine construction and cached for the run:
/// dialect selection and version-sensitive dialect behavior must not
/// re-query the backend mid-run.
#[derive(Debug, Clone)]
pub struct DatabaseInfo {
    /// Product name as reported by the driver (e.g. "PostgreSQL",
    /// "Microsoft SQL Server", "MySQL", "HSQL Database Engine").
    pub product_name: String,

    /// Major engine version.
    pub major_version: u32,

    /// Minor engine version.
    pub minor_version: u32,

    /// User name of the current connection, used as the default
    /// `installed_by` for ledger rows.
    pub username: String,
}

/// Execute SQL against the target database.
///
/// # Transactions
///
/// `begin`/`commit`/`rollback` scope a single migration's statements
/// together with its ledger append. Implementations are expected to run
/// all calls on one logical session so that session-scoped advisory
/// locks survive transaction boundaries.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a single statement, returning the affected row count.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute a parameterized statement. Placeholder syntax is the
    /// dialect's native one; parameters bind in order.
    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a query and collect all result rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Begin a transaction.
    async fn begin(&self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> Result<()>;

    /// Report engine metadata. Failure is fatal for the engine: the
    /// dialect cannot be selected without it.
    async fn database_info(&self) -> Result<DatabaseInfo>;
}
