//! SQL Server dialect.

use async_trait::async_trait;

use crate::core::traits::SqlExecutor;
use crate::dialect::{escape_literal, lock_name, scalar_i64, Dialect};
use crate::error::{MigrateError, Result};
use crate::script::{AlternateQuoteRules, Delimiter};

/// Quote rules for SQL Server: `N'...'` opens a national-character
/// string literal whose close token is the plain single quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerQuoteRules;

impl AlternateQuoteRules for SqlServerQuoteRules {
    fn detect_alternate_open_quote(&self, text: &str) -> Option<String> {
        if text.starts_with("N'") {
            Some("N'".to_string())
        } else {
            None
        }
    }

    fn alternate_close_quote(&self, _open_quote: &str) -> String {
        "'".to_string()
    }
}

/// Microsoft SQL Server dialect implementation.
///
/// Scripts are split on `GO` batch separators (a line of their own,
/// case-insensitive). The migration lock is a session-owned applock so
/// it survives the per-migration transactions and dies with the
/// connection.
#[derive(Debug, Clone, Default)]
pub struct SqlServerDialect {
    quotes: SqlServerQuoteRules,
}

impl SqlServerDialect {
    /// Create a new SQL Server dialect instance.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Dialect for SqlServerDialect {
    fn name(&self) -> &str {
        "sqlserver"
    }

    fn quote(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn default_delimiter(&self) -> Delimiter {
        Delimiter::new("GO", true)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn quote_rules(&self) -> &dyn AlternateQuoteRules {
        &self.quotes
    }

    fn create_ledger_table_sql(&self, schema: &str, table: &str) -> String {
        format!(
            "CREATE TABLE {} (
                installed_rank INT NOT NULL,
                version NVARCHAR(50),
                description NVARCHAR(200) NOT NULL,
                type NVARCHAR(20) NOT NULL,
                script NVARCHAR(1000) NOT NULL,
                checksum INT,
                installed_by NVARCHAR(100) NOT NULL,
                installed_on DATETIME2 NOT NULL,
                execution_time BIGINT NOT NULL,
                success BIT NOT NULL,
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
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}'",
                escape_literal(schema),
                escape_literal(table)
            ),
        )
        .await?;
        Ok(count > 0)
    }

    async fn acquire_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        let sql = format!(
            "EXEC sp_getapplock @Resource = N'{}', @LockMode = 'Exclusive', \
             @LockOwner = 'Session', @LockTimeout = -1",
            escape_literal(&lock_name(schema, table))
        );
        exec.execute(&sql)
            .await
            .map_err(|e| MigrateError::lock(self.qualify(schema, table), e.to_string()))?;
        Ok(())
    }

    async fn release_lock(&self, exec: &dyn SqlExecutor, schema: &str, table: &str) -> Result<()> {
        let sql = format!(
            "EXEC sp_releaseapplock @Resource = N'{}', @LockOwner = 'Session'",
            escape_literal(&lock_name(schema, table))
        );
        exec.execute(&sql).await?;
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
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = '{}' AND TABLE_TYPE = 'VIEW'",
                escape_literal(schema)
            ))
            .await?;
        for row in &views {
            let name = row[0].as_text()?;
            statements.push(format!("DROP VIEW {}", self.qualify(schema, name)));
        }

        let tables = exec
            .query(&format!(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = '{}' AND TABLE_TYPE = 'BASE TABLE'",
                escape_literal(schema)
            ))
            .await?;
        for row in &tables {
            let name = row[0].as_text()?;
            statements.push(format!("DROP TABLE {}", self.qualify(schema, name)));
        }

        Ok(statements)
    }
}
