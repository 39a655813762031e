//! libSQL storage layer for monitoring history and run records.
//!
//! The [`Storage`] struct wraps a local libSQL database holding:
//! - `history`: the last scraped snapshot of every channel
//! - `runs`: one row per monitoring cycle
//! - `results`: analyzed channels produced by each run
//!
//! **Access rules:**
//! - `lookout run` / `lookout schedule`: read-write via [`Storage::open`]
//! - `lookout status`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use lookout_shared::{ContentKind, HistoryRecord, LookoutError, MonitoringResult, Result, RunId};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    /// Never read; held so the database outlives `conn`.
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Lifecycle state of a monitoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but at least one target failed.
    Partial,
    /// Every target failed or nothing was collected.
    Failed,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(LookoutError::Storage(format!("unknown run status: {other}"))),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored monitoring run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub result_count: usize,
    pub failed_targets: Vec<String>,
    pub report_path: Option<String>,
}

fn db_err(e: impl std::fmt::Display) -> LookoutError {
    LookoutError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LookoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LookoutError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LookoutError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LookoutError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // History snapshots
    // -----------------------------------------------------------------------

    /// Fetch the last snapshot stored under `key`.
    pub async fn get_history(&self, key: &str) -> Result<Option<HistoryRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, url, content, hash, last_updated FROM history WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_history(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Insert or replace a single snapshot.
    pub async fn upsert_history(&self, record: &HistoryRecord) -> Result<()> {
        self.upsert_history_batch(std::slice::from_ref(record)).await
    }

    /// Write several snapshots atomically. Used to commit a target's channels
    /// only once the whole target has been analyzed.
    pub async fn upsert_history_batch(&self, records: &[HistoryRecord]) -> Result<()> {
        self.check_writable()?;
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction().await.map_err(db_err)?;
        for record in records {
            tx.execute(
                "INSERT INTO history (key, url, content, hash, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                   url = excluded.url,
                   content = excluded.content,
                   hash = excluded.hash,
                   last_updated = excluded.last_updated",
                params![
                    record.key.as_str(),
                    record.url.as_str(),
                    record.content.as_str(),
                    record.hash.as_str(),
                    record.last_updated.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Number of stored snapshots.
    pub async fn count_history(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM history", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(db_err)? as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(db_err(e)),
        }
    }

    /// All snapshots, ordered by key.
    pub async fn list_history(&self) -> Result<Vec<HistoryRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key, url, content, hash, last_updated FROM history ORDER BY key",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            records.push(row_to_history(&row)?);
        }
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Record the start of a monitoring run.
    pub async fn insert_run(&self, id: &RunId) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, started_at, status) VALUES (?1, ?2, ?3)",
                params![id.to_string(), now, RunStatus::Running.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Mark a run finished with its final counts.
    pub async fn finish_run(
        &self,
        id: &RunId,
        status: RunStatus,
        result_count: usize,
        failed_targets: &[String],
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let failed = serde_json::to_string(failed_targets).map_err(db_err)?;
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, status = ?2, result_count = ?3, failed_targets = ?4
                 WHERE id = ?5",
                params![
                    now,
                    status.as_str(),
                    result_count as i64,
                    failed,
                    id.to_string()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Attach the written report file to a run.
    pub async fn set_run_report(&self, id: &RunId, report_path: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE runs SET report_path = ?1 WHERE id = ?2",
                params![report_path, id.to_string()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// The most recently started run, if any.
    pub async fn latest_run(&self) -> Result<Option<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, status, result_count, failed_targets, report_path
                 FROM runs ORDER BY started_at DESC, id DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Store one analyzed channel under `run_id`.
    pub async fn insert_result(&self, run_id: &RunId, result: &MonitoringResult) -> Result<()> {
        self.check_writable()?;
        let changes = serde_json::to_string(&result.detected_changes).map_err(db_err)?;
        let metadata = serde_json::to_string(&result.metadata).map_err(db_err)?;
        self.conn
            .execute(
                "INSERT INTO results (id, run_id, target_name, content_type, url, content_hash,
                                      raw_content, ai_summary, detected_changes, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    Uuid::now_v7().to_string(),
                    run_id.to_string(),
                    result.target_name.as_str(),
                    result.kind.as_str(),
                    result.url.as_str(),
                    result.content_hash.as_str(),
                    result.raw_content.as_str(),
                    result.ai_summary.as_str(),
                    changes,
                    metadata,
                    result.timestamp.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Results of a run, in insertion order.
    pub async fn list_results_by_run(&self, run_id: &RunId) -> Result<Vec<MonitoringResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT created_at, target_name, content_type, url, content_hash, raw_content,
                        ai_summary, detected_changes, metadata
                 FROM results WHERE run_id = ?1 ORDER BY rowid",
                params![run_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_result(&row)?);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LookoutError::Storage(format!("invalid date: {e}")))
}

fn row_to_history(row: &libsql::Row) -> Result<HistoryRecord> {
    Ok(HistoryRecord {
        key: row.get::<String>(0).map_err(db_err)?,
        url: row.get::<String>(1).map_err(db_err)?,
        content: row.get::<String>(2).map_err(db_err)?,
        hash: row.get::<String>(3).map_err(db_err)?,
        last_updated: parse_date(&row.get::<String>(4).map_err(db_err)?)?,
    })
}

fn row_to_run(row: &libsql::Row) -> Result<RunRecord> {
    let failed: String = row.get(5).map_err(db_err)?;
    Ok(RunRecord {
        id: row.get::<String>(0).map_err(db_err)?,
        started_at: parse_date(&row.get::<String>(1).map_err(db_err)?)?,
        finished_at: match row.get::<String>(2) {
            Ok(s) => Some(parse_date(&s)?),
            Err(_) => None,
        },
        status: RunStatus::parse(&row.get::<String>(3).map_err(db_err)?)?,
        result_count: row.get::<i64>(4).map_err(db_err)? as usize,
        failed_targets: serde_json::from_str(&failed).map_err(db_err)?,
        report_path: row.get::<String>(6).ok(),
    })
}

fn row_to_result(row: &libsql::Row) -> Result<MonitoringResult> {
    let kind: String = row.get(2).map_err(db_err)?;
    let changes: String = row.get(7).map_err(db_err)?;
    let metadata: String = row.get(8).map_err(db_err)?;
    Ok(MonitoringResult {
        timestamp: parse_date(&row.get::<String>(0).map_err(db_err)?)?,
        target_name: row.get::<String>(1).map_err(db_err)?,
        kind: kind.parse::<ContentKind>().map_err(LookoutError::Storage)?,
        url: row.get::<String>(3).map_err(db_err)?,
        content_hash: row.get::<String>(4).map_err(db_err)?,
        raw_content: row.get::<String>(5).map_err(db_err)?,
        ai_summary: row.get::<String>(6).map_err(db_err)?,
        detected_changes: serde_json::from_str(&changes).map_err(db_err)?,
        metadata: serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&metadata)
            .map_err(db_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("lookout_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn record(key: &str, content: &str) -> HistoryRecord {
        HistoryRecord {
            key: key.into(),
            url: "https://acme.test".into(),
            content: content.into(),
            hash: format!("hash-of-{content}"),
            last_updated: Utc::now(),
        }
    }

    fn sample_result(target: &str) -> MonitoringResult {
        MonitoringResult {
            timestamp: Utc::now(),
            target_name: target.into(),
            kind: ContentKind::Pricing,
            url: "https://acme.test/pricing".into(),
            content_hash: "abc123".into(),
            raw_content: "Pro plan $20".into(),
            ai_summary: "Pro tier costs $20".into(),
            detected_changes: vec!["Content updated since last monitoring".into()],
            metadata: BTreeMap::from([("keyword_hits".to_string(), serde_json::json!({"plan": 1}))]),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("lookout_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn history_upsert_and_query() {
        let storage = test_storage().await;
        assert!(storage.get_history("Acme_website").await.unwrap().is_none());

        storage
            .upsert_history(&record("Acme_website", "v1"))
            .await
            .expect("insert");
        storage
            .upsert_history(&record("Acme_website", "v2"))
            .await
            .expect("update");

        let found = storage.get_history("Acme_website").await.unwrap().unwrap();
        assert_eq!(found.content, "v2");
        assert_eq!(found.hash, "hash-of-v2");
        assert_eq!(storage.count_history().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unreadable_history_row_is_an_error_not_a_short_list() {
        let storage = test_storage().await;
        storage.upsert_history(&record("Acme_website", "v1")).await.unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO history (key, url, content, hash, last_updated)
                 VALUES ('Zeta_website', 'https://zeta.test', 'x', 'h', 'not a date')",
                params![],
            )
            .await
            .unwrap();

        assert!(storage.list_history().await.is_err());
    }

    #[tokio::test]
    async fn history_batch() {
        let storage = test_storage().await;
        storage
            .upsert_history_batch(&[record("B_pricing", "x"), record("A_website", "y")])
            .await
            .expect("batch");

        let keys: Vec<String> = storage
            .list_history()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, ["A_website", "B_pricing"]);
    }

    #[tokio::test]
    async fn run_lifecycle() {
        let storage = test_storage().await;
        assert!(storage.latest_run().await.unwrap().is_none());

        let run_id = RunId::new();
        storage.insert_run(&run_id).await.expect("insert run");

        let running = storage.latest_run().await.unwrap().unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.finished_at.is_none());

        storage
            .finish_run(&run_id, RunStatus::Partial, 3, &["Globex".to_string()])
            .await
            .expect("finish");
        storage
            .set_run_report(&run_id, "reports/competitive_report_x.md")
            .await
            .expect("report path");

        let done = storage.latest_run().await.unwrap().unwrap();
        assert_eq!(done.id, run_id.to_string());
        assert_eq!(done.status, RunStatus::Partial);
        assert_eq!(done.result_count, 3);
        assert_eq!(done.failed_targets, vec!["Globex".to_string()]);
        assert_eq!(
            done.report_path.as_deref(),
            Some("reports/competitive_report_x.md")
        );
        assert!(done.finished_at.is_some());
    }

    #[tokio::test]
    async fn results_round_trip() {
        let storage = test_storage().await;
        let run_id = RunId::new();
        storage.insert_run(&run_id).await.unwrap();

        let first = sample_result("Acme");
        let second = sample_result("Globex");
        storage.insert_result(&run_id, &first).await.unwrap();
        storage.insert_result(&run_id, &second).await.unwrap();

        let stored = storage.list_results_by_run(&run_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].target_name, "Acme");
        assert_eq!(stored[0].kind, ContentKind::Pricing);
        assert_eq!(stored[0].detected_changes, first.detected_changes);
        assert_eq!(stored[0].metadata, first.metadata);

        let other = storage.list_results_by_run(&RunId::new()).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("lookout_test_{}.db", Uuid::now_v7()));
        drop(Storage::open(&tmp).await.expect("create"));

        let ro = Storage::open_readonly(&tmp).await.expect("open readonly");
        let err = ro.upsert_history(&record("k", "v")).await.unwrap_err();
        assert!(err.to_string().contains("read-only"));
        assert_eq!(ro.count_history().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("lookout_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
