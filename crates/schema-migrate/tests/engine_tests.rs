//! Engine integration tests over an in-memory executor.
//!
//! The mock models what the engine actually needs from a database: a
//! ledger table, an advisory lock (one permit, blocking), catalog
//! queries and a statement log. Two executors sharing one `SharedDb`
//! model two processes on separate connections to the same database.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use schema_migrate::resolver::checksum;
use schema_migrate::{
    DatabaseInfo, MigrateError, MigrationConfig, MigrationEngine, MigrationState,
    MigrationVersion, Result, Row, SqlExecutor, SqlValue,
};
use tempfile::TempDir;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const LEDGER_TABLE: &str = "schema_version";

/// The "database" shared by every connection in a test.
struct SharedDb {
    ledger_rows: Mutex<Vec<Row>>,
    ledger_exists: Mutex<bool>,
    executed: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    lock: Arc<Semaphore>,
}

impl SharedDb {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ledger_rows: Mutex::new(Vec::new()),
            ledger_exists: Mutex::new(false),
            executed: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            lock: Arc::new(Semaphore::new(1)),
        })
    }

    fn rows(&self) -> Vec<Row> {
        self.ledger_rows.lock().unwrap().clone()
    }

    fn statements_mentioning(&self, needle: &str) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.contains(needle))
            .cloned()
            .collect()
    }
}

/// One connection/session to the shared database.
struct MockExecutor {
    db: Arc<SharedDb>,
    tag: String,
    product: String,
    major_version: u32,
    fail_contains: Mutex<Option<String>>,
    held_permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl MockExecutor {
    fn new(db: Arc<SharedDb>, tag: &str) -> Arc<Self> {
        Self::with_product(db, tag, "PostgreSQL", 14)
    }

    fn with_product(db: Arc<SharedDb>, tag: &str, product: &str, major_version: u32) -> Arc<Self> {
        Arc::new(Self {
            db,
            tag: tag.to_string(),
            product: product.to_string(),
            major_version,
            fail_contains: Mutex::new(None),
            held_permit: Mutex::new(None),
        })
    }

    fn fail_on(&self, needle: &str) {
        *self.fail_contains.lock().unwrap() = Some(needle.to_string());
    }

    fn clear_failure(&self) {
        *self.fail_contains.lock().unwrap() = None;
    }

    fn event(&self, kind: &str) {
        self.db
            .events
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.tag, kind));
    }

    async fn acquire(&self) {
        let permit = self
            .db
            .lock
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");
        self.event("lock");
        *self.held_permit.lock().unwrap() = Some(permit);
    }

    fn release(&self) {
        self.event("unlock");
        self.held_permit.lock().unwrap().take();
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let trigger = self.fail_contains.lock().unwrap().clone();
        if let Some(needle) = trigger {
            if sql.contains(&needle) {
                return Err(MigrateError::sql(format!("forced failure on: {}", needle)));
            }
        }

        if sql.contains("sp_getapplock") || sql.starts_with("LOCK TABLE") {
            self.acquire().await;
            return Ok(0);
        }
        if sql.contains("sp_releaseapplock") {
            self.release();
            return Ok(0);
        }

        if sql.starts_with("CREATE TABLE") && sql.contains(LEDGER_TABLE) {
            let mut exists = self.db.ledger_exists.lock().unwrap();
            if *exists {
                return Err(MigrateError::sql("relation already exists"));
            }
            *exists = true;
            return Ok(0);
        }

        if sql.starts_with("DROP ") {
            if sql.contains(LEDGER_TABLE) {
                *self.db.ledger_exists.lock().unwrap() = false;
                self.db.ledger_rows.lock().unwrap().clear();
            }
            self.db.executed.lock().unwrap().push(sql.to_string());
            return Ok(0);
        }

        // Migration statement: give concurrent runs a chance to overlap.
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.db.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }

    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        if sql.starts_with("INSERT INTO") {
            self.event("append");
            self.db.ledger_rows.lock().unwrap().push(params.to_vec());
            return Ok(1);
        }
        if sql.starts_with("DELETE FROM") {
            let mut rows = self.db.ledger_rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|row| row[9] != SqlValue::Bool(false));
            return Ok((before - rows.len()) as u64);
        }
        if sql.starts_with("UPDATE") {
            let mut rows = self.db.ledger_rows.lock().unwrap();
            let mut updated = 0;
            for row in rows.iter_mut() {
                if row[1] == params[1] && row[9] == SqlValue::Bool(true) {
                    row[5] = params[0].clone();
                    updated += 1;
                }
            }
            return Ok(updated);
        }
        Err(MigrateError::sql(format!("unexpected parameterized SQL: {}", sql)))
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        if sql.contains("pg_advisory_lock") || sql.contains("GET_LOCK") {
            self.acquire().await;
            return Ok(vec![vec![SqlValue::I64(1)]]);
        }
        if sql.contains("pg_advisory_unlock") || sql.contains("RELEASE_LOCK") {
            self.release();
            return Ok(vec![vec![SqlValue::I64(1)]]);
        }

        if sql.contains("COUNT(*)") {
            let exists = *self.db.ledger_exists.lock().unwrap();
            let count = if exists && sql.contains(LEDGER_TABLE) { 1 } else { 0 };
            return Ok(vec![vec![SqlValue::I64(count)]]);
        }

        if sql.contains("MAX(installed_rank)") {
            let rows = self.db.ledger_rows.lock().unwrap();
            let max = rows
                .iter()
                .filter_map(|row| match row[0] {
                    SqlValue::I32(rank) => Some(rank),
                    _ => None,
                })
                .max();
            return Ok(vec![vec![max.map(SqlValue::I32).unwrap_or(SqlValue::Null)]]);
        }

        if sql.contains("ORDER BY installed_rank") {
            self.event("read");
            return Ok(self.db.rows());
        }

        let lower = sql.to_lowercase();
        if lower.contains("table_type") && lower.contains("'view'") {
            return Ok(Vec::new());
        }
        if lower.contains("table_type") {
            let exists = *self.db.ledger_exists.lock().unwrap();
            if exists {
                return Ok(vec![vec![SqlValue::Text(LEDGER_TABLE.to_string())]]);
            }
            return Ok(Vec::new());
        }
        if lower.contains("sequence_name") {
            return Ok(Vec::new());
        }

        Err(MigrateError::sql(format!("unexpected query: {}", sql)))
    }

    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn database_info(&self) -> Result<DatabaseInfo> {
        Ok(DatabaseInfo {
            product_name: self.product.clone(),
            major_version: self.major_version,
            minor_version: 0,
            username: "mock_user".to_string(),
        })
    }
}

fn write_migration(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(name), content).unwrap();
}

fn config_for(dir: &TempDir) -> MigrationConfig {
    MigrationConfig {
        locations: vec![dir.path().to_path_buf()],
        ..Default::default()
    }
}

async fn engine(config: MigrationConfig, exec: Arc<MockExecutor>) -> MigrationEngine {
    MigrationEngine::new(config, exec).await.unwrap()
}

fn row_version(row: &Row) -> String {
    match &row[1] {
        SqlValue::Text(v) => v.clone(),
        other => panic!("unexpected version value: {:?}", other),
    }
}

fn row_success(row: &Row) -> bool {
    row[9] == SqlValue::Bool(true)
}

#[tokio::test]
async fn test_migrate_applies_in_version_order() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V10__third.sql", "CREATE TABLE third (id INT);");
    write_migration(&dir, "V1__first.sql", "CREATE TABLE first (id INT);");
    write_migration(&dir, "V2__second.sql", "CREATE TABLE second (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    let engine = engine(config_for(&dir), exec).await;

    let report = engine.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 3);
    assert_eq!(report.current_version.unwrap().to_string(), "10");

    let executed = db.statements_mentioning("CREATE TABLE");
    let order: Vec<&str> = executed
        .iter()
        .filter_map(|sql| {
            ["first", "second", "third"]
                .into_iter()
                .find(|t| sql.contains(*t))
        })
        .collect();
    assert_eq!(order, vec!["first", "second", "third"]);

    let rows = db.rows();
    assert_eq!(rows.len(), 3);
    let ranks: Vec<i32> = rows
        .iter()
        .map(|row| match row[0] {
            SqlValue::I32(r) => r,
            _ => panic!("rank not an i32"),
        })
        .collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_second_run_applies_nothing() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");

    let first = engine(config_for(&dir), exec.clone()).await;
    assert_eq!(first.migrate().await.unwrap().migrations_applied, 1);

    let second = engine(config_for(&dir), exec).await;
    let report = second.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 0);
    assert_eq!(db.rows().len(), 1);
}

#[tokio::test]
async fn test_failed_statement_records_failure_and_aborts() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__ok.sql", "CREATE TABLE ok (id INT);");
    write_migration(
        &dir,
        "V2__boom.sql",
        "CREATE TABLE boom (id INT);\nINSERT INTO boom_trigger VALUES (1);",
    );
    write_migration(&dir, "V3__never.sql", "CREATE TABLE never (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    exec.fail_on("boom_trigger");

    let err = engine(config_for(&dir), exec).await.migrate().await.unwrap_err();
    match &err {
        MigrateError::StatementExecution { script, line, .. } => {
            assert_eq!(script, "V2__boom.sql");
            assert_eq!(*line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_recorded());

    let rows = db.rows();
    assert_eq!(rows.len(), 2);
    assert!(row_success(&rows[0]));
    assert_eq!(row_version(&rows[1]), "2");
    assert!(!row_success(&rows[1]));

    // Fail-fast: V3 was never attempted.
    assert!(db.statements_mentioning("never").is_empty());
}

#[tokio::test]
async fn test_failed_row_blocks_migrate_until_repair() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__ok.sql", "CREATE TABLE ok (id INT);");
    write_migration(&dir, "V2__boom.sql", "INSERT INTO boom_trigger VALUES (1);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    exec.fail_on("boom_trigger");

    assert!(engine(config_for(&dir), exec.clone()).await.migrate().await.is_err());

    // A rerun sees the failure row and refuses.
    let err = engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap_err();
    assert!(matches!(err, MigrateError::Validation(_)));
    assert!(err.to_string().contains("repair"));

    // Repair removes the failed row, then a rerun succeeds.
    let report = engine(config_for(&dir), exec.clone()).await.repair().await.unwrap();
    assert_eq!(report.failed_rows_removed, 1);

    exec.clear_failure();
    let report = engine(config_for(&dir), exec).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 1);

    let rows = db.rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(row_success));
}

#[tokio::test]
async fn test_out_of_order_disabled_skips_gap() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");
    write_migration(&dir, "V3__three.sql", "CREATE TABLE three (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    // V2 arrives late.
    write_migration(&dir, "V2__two.sql", "CREATE TABLE two (id INT);");

    let report = engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 0);
    assert!(db.statements_mentioning("two").is_empty());

    let infos = engine(config_for(&dir), exec).await.info().await.unwrap();
    let two = infos
        .iter()
        .find(|i| i.version.as_ref().unwrap().to_string() == "2")
        .unwrap();
    assert_eq!(two.state, MigrationState::Ignored);
}

#[tokio::test]
async fn test_out_of_order_enabled_applies_gap_with_later_rank() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");
    write_migration(&dir, "V3__three.sql", "CREATE TABLE three (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    write_migration(&dir, "V2__two.sql", "CREATE TABLE two (id INT);");

    let config = MigrationConfig {
        out_of_order: true,
        ..config_for(&dir)
    };
    let report = engine(config, exec).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 1);

    let rows = db.rows();
    let versions: Vec<String> = rows.iter().map(row_version).collect();
    // Version 2 is appended after 3, with a later rank.
    assert_eq!(versions, vec!["1", "3", "2"]);
}

#[tokio::test]
async fn test_validate_detects_checksum_drift_and_repair_realigns() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    assert!(engine(config_for(&dir), exec.clone()).await.validate().await.is_ok());

    // Mutate the already-applied script.
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id BIGINT);");

    let err = engine(config_for(&dir), exec.clone()).await.validate().await.unwrap_err();
    assert!(matches!(err, MigrateError::Validation(_)));
    assert!(err.to_string().contains("checksum mismatch for version 1"));

    let report = engine(config_for(&dir), exec.clone()).await.repair().await.unwrap();
    assert_eq!(report.checksums_realigned, 1);
    assert!(engine(config_for(&dir), exec).await.validate().await.is_ok());

    let expected = checksum("CREATE TABLE one (id BIGINT);".as_bytes());
    assert_eq!(db.rows()[0][5], SqlValue::I32(expected));
}

#[tokio::test]
async fn test_clean_on_validation_error_migrates_from_scratch() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    let new_body = "CREATE TABLE one (id BIGINT);";
    write_migration(&dir, "V1__one.sql", new_body);

    let config = MigrationConfig {
        validate_on_migrate: true,
        clean_on_validation_error: true,
        ..config_for(&dir)
    };
    let report = engine(config, exec).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 1);

    let rows = db.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][5], SqlValue::I32(checksum(new_body.as_bytes())));
}

#[tokio::test]
async fn test_validate_on_migrate_without_clean_aborts() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id BIGINT);");

    let config = MigrationConfig {
        validate_on_migrate: true,
        ..config_for(&dir)
    };
    let err = engine(config, exec).await.migrate().await.unwrap_err();
    assert!(matches!(err, MigrateError::Validation(_)));
    // The drifted migration was not re-applied.
    assert_eq!(db.rows().len(), 1);
}

#[tokio::test]
async fn test_init_seeds_baseline_marker() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V4__four.sql", "CREATE TABLE four (id INT);");
    write_migration(&dir, "V5__five.sql", "CREATE TABLE five (id INT);");
    write_migration(&dir, "V6__six.sql", "CREATE TABLE six (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");

    let baseline = engine(config_for(&dir), exec.clone())
        .await
        .init(Some(MigrationVersion::parse("5").unwrap()), Some("existing schema".into()))
        .await
        .unwrap();
    assert_eq!(baseline.installed_rank, 1);
    assert!(baseline.checksum.is_none());

    // Only migrations above the baseline run.
    let report = engine(config_for(&dir), exec).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 1);
    assert!(db.statements_mentioning("four").is_empty());
    assert!(db.statements_mentioning("five").is_empty());
    assert_eq!(db.statements_mentioning("six").len(), 1);
}

#[tokio::test]
async fn test_init_refused_once_ledger_has_rows() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    let err = engine(config_for(&dir), exec)
        .await
        .init(None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Configuration(_)));
}

#[tokio::test]
async fn test_info_reports_reconciled_states() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    engine(config_for(&dir), exec.clone()).await.migrate().await.unwrap();

    write_migration(&dir, "V2__two.sql", "CREATE TABLE two (id INT);");

    let infos = engine(config_for(&dir), exec).await.info().await.unwrap();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].state, MigrationState::Success);
    assert!(infos[0].installed_on.is_some());
    assert_eq!(infos[1].state, MigrationState::Pending);
    assert!(infos[1].installed_on.is_none());
}

#[tokio::test]
async fn test_malformed_script_aborts_without_ledger_row() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__bad.sql", "INSERT INTO t VALUES ('unterminated);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    let err = engine(config_for(&dir), exec).await.migrate().await.unwrap_err();
    match err {
        MigrateError::MalformedScript { script, .. } => assert_eq!(script, "V1__bad.sql"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(db.rows().is_empty());
}

#[tokio::test]
async fn test_placeholders_substituted_before_execution() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE ${prefix}_audit (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    let config = MigrationConfig {
        placeholders: [("prefix".to_string(), "app".to_string())].into(),
        ..config_for(&dir)
    };
    engine(config, exec).await.migrate().await.unwrap();

    assert_eq!(db.statements_mentioning("app_audit").len(), 1);
    assert!(db.statements_mentioning("${prefix}").is_empty());
}

#[tokio::test]
async fn test_sqlserver_scripts_split_on_go_only() {
    let dir = TempDir::new().unwrap();
    write_migration(
        &dir,
        "V1__batches.sql",
        "CREATE TABLE accounts (id INT, label NVARCHAR(50));\n\
         INSERT INTO accounts VALUES (1, N'semi;colon')\n\
         GO\n\
         UPDATE accounts SET label = N'done' WHERE id = 1\n\
         GO\n",
    );

    let db = SharedDb::new();
    let exec = MockExecutor::with_product(db.clone(), "a", "Microsoft SQL Server", 15);
    engine(config_for(&dir), exec).await.migrate().await.unwrap();

    let batches = db.statements_mentioning("accounts");
    assert_eq!(batches.len(), 2);
    // The first batch keeps its inline semicolons and quoted content.
    assert!(batches[0].contains("CREATE TABLE accounts"));
    assert!(batches[0].contains("N'semi;colon'"));
    assert!(batches[1].starts_with("UPDATE accounts"));
}

#[tokio::test]
async fn test_legacy_embedded_engine_runs_without_lock() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::with_product(db.clone(), "a", "HSQL Database Engine", 1);
    let report = engine(config_for(&dir), exec).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 1);

    // No lock was ever taken: best-effort mode.
    let events = db.events.lock().unwrap().clone();
    assert!(!events.iter().any(|e| e.ends_with(":lock")));
}

#[tokio::test]
async fn test_concurrent_runs_are_serialized_by_the_lock() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");
    write_migration(&dir, "V2__two.sql", "CREATE TABLE two (id INT);");

    let db = SharedDb::new();
    let exec_a = MockExecutor::new(db.clone(), "a");
    let exec_b = MockExecutor::new(db.clone(), "b");

    let dir_path = dir.path().to_path_buf();
    let config = move || MigrationConfig {
        locations: vec![dir_path.clone()],
        ..Default::default()
    };

    let engine_a = MigrationEngine::new(config(), exec_a).await.unwrap();
    let engine_b = MigrationEngine::new(config(), exec_b).await.unwrap();

    let (ra, rb) = tokio::join!(engine_a.migrate(), engine_b.migrate());
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    // Exactly one run applied the migrations; the other found an
    // up-to-date ledger once it got the lock.
    assert_eq!(ra.migrations_applied + rb.migrations_applied, 2);
    assert_eq!(db.rows().len(), 2);

    // Every ledger read and append happened under the holder's lock.
    let events = db.events.lock().unwrap().clone();
    let mut holder: Option<String> = None;
    for event in &events {
        let (tag, kind) = event.split_once(':').unwrap();
        match kind {
            "lock" => {
                assert!(holder.is_none(), "lock acquired while held: {:?}", events);
                holder = Some(tag.to_string());
            }
            "unlock" => {
                assert_eq!(holder.as_deref(), Some(tag), "foreign unlock: {:?}", events);
                holder = None;
            }
            _ => {
                assert_eq!(
                    holder.as_deref(),
                    Some(tag),
                    "ledger access outside the lock: {:?}",
                    events
                );
            }
        }
    }
}

#[tokio::test]
async fn test_target_version_caps_the_run() {
    let dir = TempDir::new().unwrap();
    write_migration(&dir, "V1__one.sql", "CREATE TABLE one (id INT);");
    write_migration(&dir, "V2__two.sql", "CREATE TABLE two (id INT);");
    write_migration(&dir, "V3__three.sql", "CREATE TABLE three (id INT);");

    let db = SharedDb::new();
    let exec = MockExecutor::new(db.clone(), "a");
    let config = MigrationConfig {
        target: Some(MigrationVersion::parse("2").unwrap()),
        ..config_for(&dir)
    };
    let report = engine(config, exec).await.migrate().await.unwrap();
    assert_eq!(report.migrations_applied, 2);
    assert_eq!(report.current_version.unwrap().to_string(), "2");
    assert!(db.statements_mentioning("three").is_empty());
}
