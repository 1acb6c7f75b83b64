//! Decision persistence.
//!
//! Two sinks, both append-only from the pipeline's point of view: a
//! newline-delimited JSON audit log (one full report per line) and a
//! SQLite `decisions` table for the `history` query. Neither sink ever
//! mutates a report, and a failure in either is a recoverable
//! `PersistenceError`; the already-computed verdict stands.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Serialize;

use crate::config::Config;
use crate::error::GatewayError;
use crate::report::Report;

/// Handle to the audit log and decision store paths.
#[derive(Debug, Clone)]
pub struct AuditLog {
    log_path: PathBuf,
    db_path: PathBuf,
}

/// One row of the decision store, as returned by `history`.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRow {
    pub id: i64,
    pub report_id: String,
    pub input_hash: String,
    pub decision: String,
    pub score: f64,
    pub reasons: String,
    pub timestamp: String,
}

impl AuditLog {
    pub fn new(config: &Config) -> Self {
        Self {
            log_path: config.log_path.clone(),
            db_path: config.db_path.clone(),
        }
    }

    /// Append one report as a single JSON line.
    pub fn append_jsonl(&self, report: &Report) -> Result<(), GatewayError> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(persistence)?;
        }
        let line = serde_json::to_string(report)
            .map_err(|e| GatewayError::Persistence(format!("serialize report: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(persistence)?;
        writeln!(file, "{line}").map_err(persistence)?;
        Ok(())
    }

    /// Insert the report's decision row into the SQLite store.
    pub fn save_decision(&self, report: &Report) -> Result<(), GatewayError> {
        let conn = self.open_db()?;
        let reasons: Vec<&str> = report.hits.iter().map(|h| h.reason.as_str()).collect();
        conn.execute(
            "INSERT INTO decisions (report_id, input_hash, decision, score, reasons, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                report.id,
                report.input.sha256,
                report.decision.as_str(),
                report.score,
                reasons.join("; "),
                report.timestamp.to_rfc3339(),
            ],
        )
        .map_err(persistence)?;
        Ok(())
    }

    /// The `limit` most recent decisions, newest first.
    pub fn fetch_recent(&self, limit: usize) -> Result<Vec<DecisionRow>, GatewayError> {
        let conn = self.open_db()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, report_id, input_hash, decision, score, reasons, timestamp
                 FROM decisions ORDER BY id DESC LIMIT ?1",
            )
            .map_err(persistence)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(DecisionRow {
                    id: row.get(0)?,
                    report_id: row.get(1)?,
                    input_hash: row.get(2)?,
                    decision: row.get(3)?,
                    score: row.get(4)?,
                    reasons: row.get(5)?,
                    timestamp: row.get(6)?,
                })
            })
            .map_err(persistence)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(persistence)?;
        Ok(rows)
    }

    fn open_db(&self) -> Result<Connection, GatewayError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(persistence)?;
        }
        let conn = Connection::open(&self.db_path).map_err(persistence)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS decisions (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 report_id TEXT NOT NULL,
                 input_hash TEXT NOT NULL,
                 decision TEXT NOT NULL,
                 score REAL NOT NULL,
                 reasons TEXT NOT NULL,
                 timestamp TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp);",
        )
        .map_err(persistence)?;
        Ok(conn)
    }
}

fn persistence(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Persistence(err.to_string())
}
