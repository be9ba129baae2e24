//! # schema-migrate
//!
//! Versioned SQL schema migration engine.
//!
//! This library resolves ordered migration scripts from scan locations,
//! records what has been applied in an append-only ledger table,
//! serializes concurrent runs with a dialect-provided advisory lock,
//! and splits raw scripts into executable statements with a
//! dialect-aware tokenizer. It provides:
//!
//! - **Versioned migrations** named `V{version}__{description}.sql`
//! - **Drift detection** via byte-level content checksums
//! - **Cross-process safety** through database advisory locks
//! - **Operational surface**: migrate, validate, clean, info, init, repair
//!
//! Database connectivity stays outside: the engine consumes an abstract
//! [`SqlExecutor`] implemented over whatever driver the caller uses.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use schema_migrate::{MigrationConfig, MigrationEngine};
//!
//! #[tokio::main]
//! async fn main() -> schema_migrate::Result<()> {
//!     let config = MigrationConfig {
//!         locations: vec!["sql/migrations".into()],
//!         schema: "app".to_string(),
//!         ..Default::default()
//!     };
//!     let executor: Arc<dyn schema_migrate::SqlExecutor> = connect().await?;
//!     let engine = MigrationEngine::new(config, executor).await?;
//!     let report = engine.migrate().await?;
//!     println!("applied {} migration(s)", report.migrations_applied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod resolver;
pub mod script;

// Re-exports for convenient access
pub use crate::core::{
    AppliedMigration, DatabaseInfo, MigrationType, MigrationVersion, ResolvedMigration, Row,
    SqlExecutor, SqlValue,
};
pub use config::MigrationConfig;
pub use engine::{MigrationEngine, MigrationInfo, MigrationReport, MigrationState, RepairReport};
pub use error::{MigrateError, Result};
pub use ledger::{LedgerEntry, MetadataLedger};
pub use resolver::MigrationResolver;
pub use script::{Delimiter, SqlStatement, StatementTokenizer};
