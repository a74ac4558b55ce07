//! `progress_data` persistence and the queries the dashboard reads.

use crate::{
    error::EtlError,
    transform::{ProgressRecord, StatusLabel},
    util::{format_date, format_timestamp, parse_date, parse_timestamp},
};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use time::Date;
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS progress_data (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    tahapan     TEXT NOT NULL,
    wilayah     TEXT NOT NULL,
    status      TEXT NOT NULL,
    persentase  REAL NOT NULL,
    scraped_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_progress_data_scraped_at ON progress_data (scraped_at);
";

pub trait Store {
    /// Appends every record; returns how many rows were written.
    fn insert(&mut self, records: &[ProgressRecord]) -> Result<usize, EtlError>;
    /// Distinct calendar dates present, newest first.
    fn available_dates(&self) -> Result<Vec<Date>, EtlError>;
    /// All records scraped on `date`, or every record when `None`.
    fn read(&self, date: Option<Date>) -> Result<Vec<ProgressRecord>, EtlError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EtlError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, EtlError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    fn bootstrap(&self) -> Result<(), EtlError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProgressRecord> {
        let status_raw: String = row.get(2)?;
        let scraped_raw: String = row.get(4)?;
        let status = StatusLabel::parse(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown status {status_raw:?}").into(),
            )
        })?;
        let recorded_at = parse_timestamp(&scraped_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(ProgressRecord {
            stage: row.get(0)?,
            region: row.get(1)?,
            status,
            percentage: row.get(3)?,
            recorded_at,
        })
    }
}

impl Store for SqliteStore {
    fn insert(&mut self, records: &[ProgressRecord]) -> Result<usize, EtlError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO progress_data (tahapan, wilayah, status, persentase, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.stage,
                    r.region,
                    r.status.as_str(),
                    r.percentage,
                    format_timestamp(r.recorded_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn available_dates(&self) -> Result<Vec<Date>, EtlError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT DATE(scraped_at) AS dt FROM progress_data
             WHERE DATE(scraped_at) IS NOT NULL ORDER BY dt DESC",
        )?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|s| {
                parse_date(s).map_err(|e| {
                    EtlError::Storage(rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    ))
                })
            })
            .collect()
    }

    fn read(&self, date: Option<Date>) -> Result<Vec<ProgressRecord>, EtlError> {
        const COLUMNS: &str =
            "SELECT tahapan, wilayah, status, persentase, scraped_at FROM progress_data";
        let records = match date {
            Some(d) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{COLUMNS} WHERE DATE(scraped_at) = ?1 ORDER BY id"))?;
                let rows = stmt
                    .query_map(params![format_date(d)], Self::map_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{COLUMNS} ORDER BY id"))?;
                let rows = stmt
                    .query_map([], Self::map_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(records)
    }
}

/// Appends `records` to `store`. Empty input never touches the store.
pub fn load<S: Store + ?Sized>(store: &mut S, records: &[ProgressRecord]) -> Result<usize, EtlError> {
    if records.is_empty() {
        info!("no data to load");
        return Ok(0);
    }
    let count = store.insert(records)?;
    info!("loaded {count} rows into progress_data");
    Ok(count)
}
