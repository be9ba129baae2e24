//! PostgreSQL dialect.

use async_trait::async_trait;

use crate::core::traits::SqlExecutor;
use crate::dialect::{escape_literal, lock_key, scalar_i64, Dialect};
use crate::error::{MigrateError, Result};
use crate::script::{AlternateQuoteRules, NoAlternateQuotes};

/// PostgreSQL dialect implementation.
///
/// The migration lock is a session-level advisory lock
/// (`pg_advisory_lock`), so it survives per-migration transaction
/// boundaries and is released by the server when the session dies.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect {
    quotes: NoAlternateQuotes,
}

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
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
                installed_on TIMESTAMP WITH TIME ZONE NOT NULL,
                execution_time BIGINT NOT NULL,
                success BOOLEAN NOT NULL,
                PRIMARY KEY (installed_rank)
            )",
            self.qualify(schema, table)
        )
    }

    async fn table_exists(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
        table: &str,
    ) -> Result<bool> {
        let count = scalar_i64(
            exec,
            &format!(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = '{}' AND table_name = '{}'",
                escape_literal(schema),
                escape_literal(table)
            ),
        )
        .await?;
        Ok(count > 0)
    }

    async fn acquire_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        let sql = format!("SELECT pg_advisory_lock({})", lock_key(schema, table));
        exec.query(&sql)
            .await
            .map_err(|e| MigrateError::lock(self.qualify(schema, table), e.to_string()))?;
        Ok(())
    }

    async fn release_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        let sql = format!("SELECT pg_advisory_unlock({})", lock_key(schema, table));
        exec.query(&sql).await?;
        Ok(())
    }

    async fn list_drop_statements(
        &self,
        exec: &dyn SqlExecutor,
        schema: &str,
    ) -> Result<Vec<String>> {
        let mut statements = Vec::new();

        let views = exec
            .query(&format!(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = '{}' AND table_type = 'VIEW'",
                escape_literal(schema)
            ))
            .await?;
        for row in &views {
            let name = row[0].as_text()?;
            statements.push(format!("DROP VIEW IF EXISTS {} CASCADE", self.qualify(schema, name)));
        }

        let tables = exec
            .query(&format!(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = '{}' AND table_type = 'BASE TABLE'",
                escape_literal(schema)
            ))
            .await?;
        for row in &tables {
            let name = row[0].as_text()?;
            statements.push(format!(
                "DROP TABLE IF EXISTS {} CASCADE",
                self.qualify(schema, name)
            ));
        }

        let sequences = exec
            .query(&format!(
                "SELECT sequence_name FROM information_schema.sequences \
                 WHERE sequence_schema = '{}'",
                escape_literal(schema)
            ))
            .await?;
        for row in &sequences {
            let name = row[0].as_text()?;
            statements.push(format!(
                "DROP SEQUENCE IF EXISTS {} CASCADE",
                self.qualify(schema, name)
            ));
        }

        Ok(statements)
    }
}
