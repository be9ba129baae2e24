//! Per-backend capability providers (Strategy pattern).
//!
//! A [`Dialect`] bundles the small capabilities the engine needs from a
//! backend: identifier quoting, statement delimiter rules, alternate
//! string-quote detection, object existence checks, the advisory lock
//! that serializes migration runs, ledger DDL and clean support. One
//! implementation per supported engine, selected at startup from the
//! connection's reported product identity.

mod hsql;
mod mysql;
mod postgres;
mod sqlserver;

pub use hsql::HsqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlserver::SqlServerDialect;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::core::traits::{DatabaseInfo, SqlExecutor};
use crate::error::{MigrateError, Result};
use crate::script::{AlternateQuoteRules, Delimiter};

/// Database-specific capability set.
#[async_trait]
pub trait Dialect: Send + Sync {
    /// Dialect identifier (e.g. "postgres", "sqlserver").
    fn name(&self) -> &str;

    /// Quote a single identifier.
    fn quote(&self, name: &str) -> String;

    /// Quote and qualify `schema.name`.
    fn qualify(&self, schema: &str, name: &str) -> String {
        format!("{}.{}", self.quote(schema), self.quote(name))
    }

    /// Default statement delimiter for scripts on this dialect.
    fn default_delimiter(&self) -> Delimiter {
        Delimiter::semicolon()
    }

    /// Parameter placeholder for the given 1-based index.
    fn param_placeholder(&self, index: usize) -> String;

    /// Alternate string-quote rules consumed by the tokenizer.
    fn quote_rules(&self) -> &dyn AlternateQuoteRules;

    /// DDL creating the ledger table.
    fn create_ledger_table_sql(&self, schema: &str, table: &str) -> String;

    /// Whether this dialect can serialize concurrent runs. When false,
    /// the engine proceeds with a prominent warning (documented
    /// best-effort behavior, not a silent gap).
    fn supports_lock(&self) -> bool {
        true
    }

    /// Check whether a table exists. Dialects with case-folding
    /// catalogs try the exact name first, then the folded one.
    async fn table_exists(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
        table: &str,
    ) -> Result<bool>;

    /// Acquire the cross-process migration lock for the given table
    /// identity. Blocks until acquired or fails with a driver error.
    async fn acquire_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()>;

    /// Release the migration lock. No-op on dialects whose lock dies
    /// with the transaction or session.
    async fn release_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()>;

    /// Build the DROP statements that empty the given schema, in an
    /// executable order. Used by `clean`.
    async fn list_drop_statements(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
    ) -> Result<Vec<String>>;
}

/// Select the dialect for a connection's reported identity.
///
/// Engine-version-sensitive dialects capture the version here and cache
/// it for their lifetime.
pub fn for_database(info: &DatabaseInfo) -> Result<Box<dyn Dialect>> {
    let product = info.product_name.to_lowercase();
    if product.contains("postgres") {
        Ok(Box::new(PostgresDialect::new()))
    } else if product.contains("sql server") {
        Ok(Box::new(SqlServerDialect::new()))
    } else if product.contains("mysql") || product.contains("mariadb") {
        Ok(Box::new(MySqlDialect::new()))
    } else if product.contains("hsql") {
        Ok(Box::new(HsqlDialect::new(info.major_version)))
    } else {
        Err(MigrateError::config(format!(
            "Unsupported database: {} {}.{}",
            info.product_name, info.major_version, info.minor_version
        )))
    }
}

/// Stable name for the lock guarding `schema.table`.
pub(crate) fn lock_name(schema: &str, table: &str) -> String {
    format!("schema_migrate:{}.{}", schema, table)
}

/// 64-bit lock key derived from the lock name, for dialects whose
/// advisory locks are keyed numerically.
pub(crate) fn lock_key(schema: &str, table: &str) -> i64 {
    let digest = Sha256::digest(lock_name(schema, table).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Escape a string for embedding in a single-quoted SQL literal.
pub(crate) fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Run a COUNT-style query and read the single scalar result.
pub(crate) async fn scalar_i64(exec: &dyn SqlExecutor, sql: &str) -> Result<i64> {
    let rows = exec.query(sql).await?;
    let value = rows
        .first()
        .and_then(|row| row.first())
        .ok_or_else(|| MigrateError::sql(format!("Query returned no rows: {}", sql)))?;
    value.as_i64()
}
