use crate::detect::LinkMap;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Durable label -> URL records plus a short history of runs.
pub trait RecordStore {
    fn get_all(&self) -> Result<LinkMap>;
    fn upsert(&mut self, label: &str, url: &str) -> Result<()>;
    fn record_run(&mut self, run: &RunRecord) -> Result<()>;
    fn runs(&self, limit: usize) -> Result<Vec<RunRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub source: String,
    pub outcome: String,
    pub added: usize,
    pub updated: usize,
    pub touched: usize,
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    /// Open the database, creating the file, its directory and the schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        let store = SqliteStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Last known URL per label. Labels are unique in practice only.
            CREATE TABLE IF NOT EXISTS links (
                label TEXT NOT NULL,
                url TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_links_label ON links(label);

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                started_at INTEGER NOT NULL,
                source TEXT NOT NULL,
                outcome TEXT NOT NULL CHECK(outcome IN ('updated', 'no_changes')),
                added INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                touched INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
            ",
        )?;
        Ok(())
    }

    /// Stored links sorted by label, latest row per label.
    pub fn records(&self) -> Result<Vec<StoredRecord>> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|(label, url)| StoredRecord { label, url })
            .collect())
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn get_all(&self) -> Result<LinkMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT label, url FROM links ORDER BY rowid")?;

        // Later rows win if a label was ever stored twice
        let mut links = LinkMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        for row in rows {
            let (label, url): (String, String) = row?;
            links.insert(label, url);
        }
        Ok(links)
    }

    fn upsert(&mut self, label: &str, url: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE links SET url = ?1 WHERE label = ?2",
            params![url, label],
        )?;

        if updated == 0 {
            self.conn.execute(
                "INSERT INTO links (label, url) VALUES (?1, ?2)",
                params![label, url],
            )?;
        }
        Ok(())
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO runs (id, started_at, source, outcome, added, updated, touched)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &run.id,
                run.started_at.timestamp(),
                &run.source,
                &run.outcome,
                run.added as i64,
                run.updated as i64,
                run.touched as i64,
            ],
        )?;
        Ok(())
    }

    fn runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, source, outcome, added, updated, touched
             FROM runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: from_timestamp(row.get(1)?),
                    source: row.get(2)?,
                    outcome: row.get(3)?,
                    added: row.get::<_, i64>(4)? as usize,
                    updated: row.get::<_, i64>(5)? as usize,
                    touched: row.get::<_, i64>(6)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
    }
}

/// In-memory store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    links: LinkMap,
    runs: Vec<RunRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_links(links: LinkMap) -> Self {
        Self {
            links,
            runs: Vec::new(),
        }
    }
}

impl RecordStore for MemoryStore {
    fn get_all(&self) -> Result<LinkMap> {
        Ok(self.links.clone())
    }

    fn upsert(&mut self, label: &str, url: &str) -> Result<()> {
        self.links.insert(label.to_string(), url.to_string());
        Ok(())
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        self.runs.push(run.clone());
        Ok(())
    }

    fn runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        Ok(self.runs.iter().rev().take(limit).cloned().collect())
    }
}
