//! SQL migration definitions for the Lookout database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: history snapshots, runs, results",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Last known snapshot per channel, keyed by <target>_<kind>
CREATE TABLE IF NOT EXISTS history (
    key          TEXT PRIMARY KEY,
    url          TEXT NOT NULL,
    content      TEXT NOT NULL,
    hash         TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

-- One row per monitoring cycle
CREATE TABLE IF NOT EXISTS runs (
    id             TEXT PRIMARY KEY,
    started_at     TEXT NOT NULL,
    finished_at    TEXT,
    status         TEXT NOT NULL,
    result_count   INTEGER NOT NULL DEFAULT 0,
    failed_targets TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);

-- Analyzed channels produced by a run
CREATE TABLE IF NOT EXISTS results (
    id               TEXT PRIMARY KEY,
    run_id           TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    target_name      TEXT NOT NULL,
    content_type     TEXT NOT NULL,
    url              TEXT NOT NULL,
    content_hash     TEXT NOT NULL,
    raw_content      TEXT NOT NULL,
    ai_summary       TEXT NOT NULL,
    detected_changes TEXT NOT NULL,
    metadata         TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_run_id ON results(run_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Track the report file written for a run",
            sql: r#"
ALTER TABLE runs ADD COLUMN report_path TEXT;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
