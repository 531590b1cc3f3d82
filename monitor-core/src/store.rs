//! Append-only SQLite table of readings.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};
use std::{
    fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info};

use crate::Reading;

const DATE_FORMAT: &str = "%Y-%m-%d";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS weather (
    city TEXT NOT NULL,
    condition TEXT NOT NULL,
    temperature_c REAL NOT NULL,
    feels_like_c REAL NOT NULL,
    humidity REAL NOT NULL,
    wind_speed REAL NOT NULL,
    observed_at INTEGER NOT NULL,
    observed_date TEXT NOT NULL
)";

const SELECT_COLUMNS: &str =
    "SELECT city, condition, temperature_c, feels_like_c, humidity, wind_speed, observed_at FROM weather";

/// Durable store of every reading ever taken. Rows are only ever inserted.
///
/// The connection sits behind a mutex so writers are serialized even if the
/// store is shared between tasks.
#[derive(Debug)]
pub struct ReadingStore {
    conn: Mutex<Connection>,
}

impl ReadingStore {
    /// Open (or create) the database file and make sure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
        let store = Self::init(conn)?;

        info!("Reading store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_TABLE, [])
            .context("failed to create weather table")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Flush and close the underlying connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| anyhow!("reading store lock poisoned"))?;
        conn.close()
            .map_err(|(_, err)| anyhow::Error::new(err).context("failed to close database"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("reading store lock poisoned"))
    }

    /// Append every reading in one transaction; either all rows land or none do.
    pub fn insert_batch(&self, readings: &[Reading]) -> Result<()> {
        if readings.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().context("failed to begin insert transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO weather (city, condition, temperature_c, feels_like_c,
                        humidity, wind_speed, observed_at, observed_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("failed to prepare insert")?;

            for r in readings {
                stmt.execute(params![
                    r.city(),
                    r.condition(),
                    r.temperature_c(),
                    r.feels_like_c(),
                    r.humidity(),
                    r.wind_speed(),
                    r.observed_at(),
                    r.observed_date().format(DATE_FORMAT).to_string(),
                ])
                .with_context(|| format!("failed to insert reading for {}", r.city()))?;
            }
        }
        tx.commit().context("failed to commit readings")?;

        debug!("Inserted {} readings", readings.len());
        Ok(())
    }

    /// Every row whose date equals the latest date in the table, in insertion order.
    pub fn query_latest_date(&self) -> Result<Vec<Reading>> {
        let conn = self.lock()?;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE observed_date = (SELECT MAX(observed_date) FROM weather) ORDER BY rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_reading)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read latest-date readings")?;
        Ok(rows)
    }

    pub fn query_all(&self) -> Result<Vec<Reading>> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} ORDER BY rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_reading)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read readings")?;
        Ok(rows)
    }

    pub fn latest_date(&self) -> Result<Option<NaiveDate>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row("SELECT MAX(observed_date) FROM weather", [], |row| row.get(0))
            .context("failed to query latest date")?;

        value
            .map(|s| {
                NaiveDate::parse_from_str(&s, DATE_FORMAT)
                    .with_context(|| format!("invalid stored date '{s}'"))
            })
            .transpose()
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))
            .context("failed to count readings")?;
        u64::try_from(n).map_err(|_| anyhow!("negative row count {n}"))
    }

    /// Run raw SQL against the connection, bypassing the append-only API.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

fn row_to_reading(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let observed_at: i64 = row.get(6)?;
    Reading::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        observed_at,
    )
    .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(6, observed_at))
}
