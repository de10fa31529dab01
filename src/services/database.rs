use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::error::Result;
use crate::models::{Company, DailyBar, Segment, Tick};

/// SQLite store backing the ingestion pipeline
///
/// Holds the company registry, the tick table, the daily bar table and the
/// processed-file ledger. All writes that must be repeat-safe go through
/// `INSERT OR REPLACE` against a unique key, so re-running a partially
/// committed unit of work cannot double-count.
#[derive(Debug)]
pub struct MarketStore {
    pool: SqlitePool,
    database_path: PathBuf,
}

impl MarketStore {
    /// Open (or create) the database and initialize the schema
    pub async fn open(database_path: &Path) -> Result<Self> {
        info!("Opening market store at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(connect_options).await?;

        let store = Self {
            pool,
            database_path: database_path.to_path_buf(),
        };
        store.initialize_schema().await?;

        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet
    async fn initialize_schema(&self) -> Result<()> {
        let statements = vec![
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                mid INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                symbol_nf TEXT NOT NULL DEFAULT '',
                isin TEXT NOT NULL DEFAULT '',
                reuters TEXT NOT NULL DEFAULT '',
                boursorama TEXT NOT NULL DEFAULT '',
                pea BOOLEAN NOT NULL DEFAULT 0,
                sector INTEGER NOT NULL DEFAULT 0
            )
            "#,
            // A symbol is unique within its segment, not globally
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_companies_mid_symbol
             ON companies(mid, symbol)",
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                date DATETIME NOT NULL,
                cid INTEGER NOT NULL REFERENCES companies(id),
                value REAL NOT NULL,
                volume INTEGER NOT NULL
            )
            "#,
            // Logical key of the tick table; upserts rely on this
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_stocks_date_cid
             ON stocks(date, cid)",
            "CREATE INDEX IF NOT EXISTS idx_stocks_cid_date
             ON stocks(cid, date)",
            r#"
            CREATE TABLE IF NOT EXISTS daystocks (
                date DATE NOT NULL,
                cid INTEGER NOT NULL REFERENCES companies(id),
                open REAL NOT NULL,
                close REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                volume INTEGER NOT NULL
            )
            "#,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_daystocks_date_cid
             ON daystocks(date, cid)",
            r#"
            CREATE TABLE IF NOT EXISTS file_done (
                name TEXT PRIMARY KEY
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Market store schema initialized");
        Ok(())
    }

    // Registry operations

    /// Load all registry rows for one segment
    pub async fn companies_for_segment(&self, segment: Segment) -> Result<Vec<Company>> {
        let rows = sqlx::query(
            "SELECT id, name, mid, symbol, pea, sector FROM companies WHERE mid = ?1",
        )
        .bind(segment.mid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Company {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    mid: row.try_get("mid")?,
                    symbol: row.try_get("symbol")?,
                    pea: row.try_get("pea")?,
                    sector: row.try_get("sector")?,
                })
            })
            .collect()
    }

    /// Insert a new company row; the store assigns the surrogate id
    pub async fn insert_company(
        &self,
        name: &str,
        segment: Segment,
        symbol: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO companies (name, mid, symbol, pea) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(name)
        .bind(segment.mid())
        .bind(symbol)
        .bind(segment.is_pea())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Update the display name of an existing company
    pub async fn rename_company(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE companies SET name = ?1 WHERE id = ?2")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Tick operations

    /// Upsert one file's tick batch in a single transaction
    ///
    /// Keyed on (date, cid); replaying the same batch after a crash between
    /// the tick commit and the ledger commit leaves the table unchanged.
    pub async fn upsert_ticks(&self, ticks: &[Tick]) -> Result<usize> {
        if ticks.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;

        for tick in ticks {
            sqlx::query(
                "INSERT OR REPLACE INTO stocks (date, cid, value, volume)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(tick.date)
            .bind(tick.cid)
            .bind(tick.value)
            .bind(tick.volume as i64)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        Ok(ticks.len())
    }

    /// Read ticks at or after the given date, ordered by (cid, date)
    ///
    /// `None` reads the full table.
    pub async fn ticks_since(&self, since: Option<NaiveDate>) -> Result<Vec<Tick>> {
        let rows = match since {
            Some(date) => {
                let floor = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
                    crate::error::AppError::InvalidInput(format!("bad date: {}", date))
                })?;
                sqlx::query(
                    "SELECT date, cid, value, volume FROM stocks
                     WHERE date >= ?1 ORDER BY cid, date",
                )
                .bind(floor)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT date, cid, value, volume FROM stocks ORDER BY cid, date")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| {
                Ok(Tick {
                    date: row.try_get::<NaiveDateTime, _>("date")?,
                    cid: row.try_get("cid")?,
                    value: row.try_get("value")?,
                    volume: row.try_get::<i64, _>("volume")? as u64,
                })
            })
            .collect()
    }

    // Ledger operations

    /// Load the full processed-file ledger as a set
    pub async fn done_files(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT name FROM file_done")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("name")?))
            .collect()
    }

    /// Check one path against the ledger
    pub async fn is_file_done(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_done WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Record a file as processed; append-only, repeat-safe
    pub async fn mark_file_done(&self, name: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO file_done (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Daily bar operations

    /// Upsert daily bars keyed on (date, cid)
    pub async fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;

        for bar in bars {
            sqlx::query(
                "INSERT OR REPLACE INTO daystocks (date, cid, open, close, high, low, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(bar.date)
            .bind(bar.cid)
            .bind(bar.open)
            .bind(bar.close)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.volume as i64)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        Ok(bars.len())
    }

    /// Read all daily bars for one company, ordered by date
    pub async fn daily_bars(&self, cid: i64) -> Result<Vec<DailyBar>> {
        let rows = sqlx::query(
            "SELECT date, cid, open, close, high, low, volume FROM daystocks
             WHERE cid = ?1 ORDER BY date",
        )
        .bind(cid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DailyBar {
                    date: row.try_get::<NaiveDate, _>("date")?,
                    cid: row.try_get("cid")?,
                    open: row.try_get("open")?,
                    close: row.try_get("close")?,
                    high: row.try_get("high")?,
                    low: row.try_get("low")?,
                    volume: row.try_get::<i64, _>("volume")? as u64,
                })
            })
            .collect()
    }

    /// Row counts for the status command
    pub async fn counts(&self) -> Result<StoreCounts> {
        let companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;
        let ticks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks")
            .fetch_one(&self.pool)
            .await?;
        let bars: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daystocks")
            .fetch_one(&self.pool)
            .await?;
        let files_done: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_done")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreCounts {
            companies,
            ticks,
            bars,
            files_done,
        })
    }

    /// Path this store was opened at
    pub fn path(&self) -> &Path {
        &self.database_path
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Market store connection pool closed");
    }
}

/// Row counts across the store's tables
#[derive(Debug, Clone, Copy)]
pub struct StoreCounts {
    pub companies: i64,
    pub ticks: i64,
    pub bars: i64,
    pub files_done: i64,
}
