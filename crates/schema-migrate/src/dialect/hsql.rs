//! HSQL (embedded engine) dialect.

use async_trait::async_trait;
use tracing::warn;

use crate::core::traits::SqlExecutor;
use crate::dialect::{escape_literal, scalar_i64, Dialect};
use crate::error::Result;
use crate::script::{AlternateQuoteRules, NoAlternateQuotes};

/// HSQL dialect implementation.
///
/// Engine-version-sensitive: 1.x has no table locking, so concurrent
/// runs degrade to best effort with a logged warning. The version is
/// captured at construction and cached for the dialect's lifetime.
#[derive(Debug, Clone)]
pub struct HsqlDialect {
    /// Running against the old 1.x line instead of 2.x.
    legacy: bool,
    quotes: NoAlternateQuotes,
}

impl HsqlDialect {
    /// Create a dialect instance for the given engine major version.
    pub fn new(major_version: u32) -> Self {
        Self {
            legacy: major_version < 2,
            quotes: NoAlternateQuotes,
        }
    }

    async fn count_tables(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
        table: &str,
    ) -> Result<i64> {
        scalar_i64(
            exec,
            &format!(
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.SYSTEM_TABLES \
                 WHERE TABLE_SCHEM = '{}' AND TABLE_NAME = '{}'",
                escape_literal(schema),
                escape_literal(table)
            ),
        )
        .await
    }
}

#[async_trait]
impl Dialect for HsqlDialect {
    fn name(&self) -> &str {
        "hsql"
    }

    fn quote(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_rules(&self) -> &dyn AlternateQuoteRules {
        &self.quotes
    }

    fn create_ledger_table_sql(&self, schema: &str, table: &str) -> String {
        format!(
            "CREATE TABLE {} (
                installed_rank INT NOT NULL,
                version VARCHAR(50),
                description VARCHAR(200) NOT NULL,
                type VARCHAR(20) NOT NULL,
                script VARCHAR(1000) NOT NULL,
                checksum INT,
                installed_by VARCHAR(100) NOT NULL,
                installed_on TIMESTAMP NOT NULL,
                execution_time BIGINT NOT NULL,
                success BOOLEAN NOT NULL,
                PRIMARY KEY (installed_rank)
            )",
            self.qualify(schema, table)
        )
    }

    fn supports_lock(&self) -> bool {
        !self.legacy
    }

    async fn table_exists(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
        table: &str,
    ) -> Result<bool> {
        if self.count_tables(exec, schema, table).await? > 0 {
            return Ok(true);
        }
        // The catalog upper-cases unquoted identifiers.
        let folded = self
            .count_tables(exec, &schema.to_uppercase(), &table.to_uppercase())
            .await?;
        Ok(folded > 0)
    }

    async fn acquire_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        if self.legacy {
            warn!(
                "HSQL 1.x does not support locking {}; concurrent migration runs are not serialized",
                self.qualify(schema, table)
            );
            return Ok(());
        }
        exec.execute(&format!("LOCK TABLE {} WRITE", self.qualify(schema, table)))
            .await?;
        Ok(())
    }

    async fn release_lock(
        &self,
        _exec: &dyn SqlExecutor,
        _schema: &str,
        _table: &str,
    ) -> Result<()> {
        // The write lock is transaction-scoped and released on commit.
        Ok(())
    }

    async fn list_drop_statements(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
    ) -> Result<Vec<String>> {
        let tables = exec
            .query(&format!(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.SYSTEM_TABLES \
                 WHERE TABLE_SCHEM = '{}' AND TABLE_TYPE = 'TABLE'",
                escape_literal(schema)
            ))
            .await?;

        let mut statements = Vec::new();
        for row in &tables {
            let name = row[0].as_text()?;
            statements.push(format!("DROP TABLE {} CASCADE", self.qualify(schema, name)));
        }
        Ok(statements)
    }
}
