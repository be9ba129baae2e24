//! MySQL / MariaDB dialect.

use async_trait::async_trait;

use crate::core::traits::SqlExecutor;
use crate::dialect::{escape_literal, lock_name, scalar_i64, Dialect};
use crate::error::{MigrateError, Result};
use crate::script::{AlternateQuoteRules, NoAlternateQuotes};

/// MySQL dialect implementation.
///
/// The migration lock uses `GET_LOCK`, which is connection-scoped and
/// released on disconnect. Catalog lookups are case-folded to lower
/// case on the fallback path because table names on case-insensitive
/// filesystems are stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect {
    quotes: NoAlternateQuotes,
}

impl MySqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self::default()
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
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = '{}' AND table_name = '{}'",
                escape_literal(schema),
                escape_literal(table)
            ),
        )
        .await
    }
}

#[async_trait]
impl Dialect for MySqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
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
                installed_on DATETIME NOT NULL,
                execution_time BIGINT NOT NULL,
                success BOOL NOT NULL,
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
        if self.count_tables(exec, schema, table).await? > 0 {
            return Ok(true);
        }
        // Case-insensitive catalogs store lower-cased names.
        let folded = self
            .count_tables(exec, &schema.to_lowercase(), &table.to_lowercase())
            .await?;
        Ok(folded > 0)
    }

    async fn acquire_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        let sql = format!(
            "SELECT GET_LOCK('{}', -1)",
            escape_literal(&lock_name(schema, table))
        );
        let acquired = scalar_i64(exec, &sql)
            .await
            .map_err(|e| MigrateError::lock(self.qualify(schema, table), e.to_string()))?;
        if acquired != 1 {
            return Err(MigrateError::lock(
                self.qualify(schema, table),
                format!("GET_LOCK returned {}", acquired),
            ));
        }
        Ok(())
    }

    async fn release_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        let sql = format!(
            "SELECT RELEASE_LOCK('{}')",
            escape_literal(&lock_name(schema, table))
        );
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
            statements.push(format!("DROP VIEW IF EXISTS {}", self.qualify(schema, name)));
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
            statements.push(format!("DROP TABLE IF EXISTS {}", self.qualify(schema, name)));
        }

        Ok(statements)
    }
}
