use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, ScholarError};
use crate::record::{Dataset, PublicationRecord};

/// The one logical name the dataset lives under.
pub const DATASET_KEY: &str = "scholar_db";

/// A loaded dataset plus the version it was read at.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub version: u64,
    pub dataset: Dataset,
}

/// Durable storage for the dataset blob.
///
/// `save` only succeeds when `expected_version` still matches what is stored,
/// so two racing read-merge-write cycles cannot silently lose an update.
pub trait DatasetStore {
    fn load(&self) -> Result<Snapshot>;

    /// Returns the new version.
    fn save(&self, dataset: &Dataset, expected_version: u64) -> Result<u64>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn current_version(&self) -> Result<u64> {
        let v: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM datasets WHERE key = ?1",
                [DATASET_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(v.unwrap_or(0) as u64)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS datasets (
            key        TEXT PRIMARY KEY,
            version    INTEGER NOT NULL,
            body       TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

impl DatasetStore for SqliteStore {
    fn load(&self) -> Result<Snapshot> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT version, body FROM datasets WHERE key = ?1",
                [DATASET_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(Snapshot::default()),
            Some((version, body)) => Ok(Snapshot {
                version: version as u64,
                dataset: serde_json::from_str(&body)?,
            }),
        }
    }

    fn save(&self, dataset: &Dataset, expected_version: u64) -> Result<u64> {
        let body = serde_json::to_string(dataset)?;
        let next = expected_version + 1;

        let changed = if expected_version == 0 {
            self.conn.execute(
                "INSERT OR IGNORE INTO datasets (key, version, body) VALUES (?1, ?2, ?3)",
                rusqlite::params![DATASET_KEY, next as i64, body],
            )?
        } else {
            self.conn.execute(
                "UPDATE datasets SET version = ?2, body = ?3, updated_at = datetime('now')
                 WHERE key = ?1 AND version = ?4",
                rusqlite::params![DATASET_KEY, next as i64, body, expected_version as i64],
            )?
        };

        if changed == 0 {
            return Err(ScholarError::VersionConflict {
                expected: expected_version,
                found: self.current_version()?,
            });
        }

        debug!("Saved {} records as version {}", dataset.len(), next);
        Ok(next)
    }
}

// ── Overview ──

pub struct Stats {
    pub version: u64,
    pub records: usize,
    pub profiles: usize,
    pub citations: u64,
    pub undated: usize,
    pub years: Option<(i32, i32)>,
}

pub fn get_stats(snap: &Snapshot) -> Stats {
    let ds = &snap.dataset;
    let profiles: std::collections::HashSet<&str> = ds
        .iter()
        .filter_map(|r| r.profile_user_id.as_deref())
        .collect();
    let years = ds.iter().filter_map(|r| r.year);
    let range = years.clone().min().zip(years.max());

    Stats {
        version: snap.version,
        records: ds.len(),
        profiles: profiles.len(),
        citations: ds.iter().map(|r| u64::from(r.citations)).sum(),
        undated: ds.iter().filter(|r| r.year.is_none()).count(),
        years: range,
    }
}

/// Records filtered by profile id and year, most cited first.
pub fn fetch_overview<'a>(
    dataset: &'a Dataset,
    profile: Option<&str>,
    year: Option<i32>,
    limit: usize,
) -> Vec<&'a PublicationRecord> {
    let mut rows: Vec<&PublicationRecord> = dataset
        .iter()
        .filter(|r| profile.map_or(true, |p| r.profile_user_id.as_deref() == Some(p)))
        .filter(|r| year.map_or(true, |y| r.year == Some(y)))
        .collect();
    rows.sort_by(|a, b| b.citations.cmp(&a.citations).then(b.year.cmp(&a.year)));
    rows.truncate(limit);
    rows
}
