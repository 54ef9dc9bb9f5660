//! Local market data storage using SQLite.
//!
//! Provides persistent storage for:
//! - T-1 baseline records (per-field merge on rewrite)
//! - Daily snapshots
//! - Intraday bars
//!
//! The screener runs entirely offline against this store; collectors write
//! into it ahead of time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::provider::{BarArchive, BaselineStore, ProviderError, SnapshotSource};
use super::{BaselineRecord, IntradayBar, SnapshotRecord};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- T-1 baseline table
CREATE TABLE IF NOT EXISTS baselines (
    symbol TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    float_share REAL,
    total_mv REAL,
    sum_inst_net REAL,
    list_count REAL,
    winner_rate REAL,
    cost_concentration REAL,
    margin_cap_ratio REAL,
    pre_close REAL,
    pre_vol REAL,
    pre_ats REAL,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (symbol, trade_date)
);

CREATE INDEX IF NOT EXISTS idx_baselines_date
ON baselines(trade_date);

-- Daily snapshot table
CREATE TABLE IF NOT EXISTS daily_snapshots (
    symbol TEXT NOT NULL,
    trade_date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    amount REAL NOT NULL,
    trade_count REAL,
    bid_vol1 REAL,
    ask_vol1 REAL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (symbol, trade_date)
);

CREATE INDEX IF NOT EXISTS idx_daily_snapshots_date
ON daily_snapshots(trade_date);

-- Intraday bar table
CREATE TABLE IF NOT EXISTS intraday_bars (
    symbol TEXT NOT NULL,
    bar_time TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    amount REAL DEFAULT 0,
    PRIMARY KEY (symbol, bar_time)
);

CREATE INDEX IF NOT EXISTS idx_intraday_bars_symbol
ON intraday_bars(symbol);
"#;

/// Baseline value columns, in insert order after (symbol, trade_date).
const BASELINE_FIELDS: [&str; 10] = [
    "float_share",
    "total_mv",
    "sum_inst_net",
    "list_count",
    "winner_rate",
    "cost_concentration",
    "margin_cap_ratio",
    "pre_close",
    "pre_vol",
    "pre_ats",
];

const DATE_FORMAT: &str = "%Y-%m-%d";
const BAR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Upsert statement where a new non-zero value wins per column.
fn baseline_upsert_sql() -> String {
    let columns = BASELINE_FIELDS.join(", ");
    let placeholders = (3..=BASELINE_FIELDS.len() + 2)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let merges = BASELINE_FIELDS
        .iter()
        .map(|f| {
            format!(
                "{f} = CASE WHEN excluded.{f} IS NOT NULL AND excluded.{f} != 0 \
                 THEN excluded.{f} ELSE COALESCE(baselines.{f}, excluded.{f}) END"
            )
        })
        .collect::<Vec<_>>()
        .join(",\n    ");

    format!(
        "INSERT INTO baselines (symbol, trade_date, {columns})\n\
         VALUES (?1, ?2, {placeholders})\n\
         ON CONFLICT(symbol, trade_date) DO UPDATE SET\n    {merges},\n    \
         updated_at = CURRENT_TIMESTAMP"
    )
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for local storage
#[derive(Debug, Clone)]
pub struct LocalStorageConfig {
    /// Path to SQLite database
    pub db_path: PathBuf,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".codecoder")
                .join("screener.db"),
        }
    }
}

impl LocalStorageConfig {
    /// Use an explicit database path.
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalStorageStats {
    pub baseline_count: usize,
    pub snapshot_count: usize,
    pub bar_count: usize,
}

// ============================================================================
// Local Storage
// ============================================================================

/// Local SQLite storage for screener inputs
pub struct LocalStorage {
    /// rusqlite::Connection is Send but not Sync
    db: Arc<Mutex<Connection>>,
    config: LocalStorageConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    pub fn new(config: LocalStorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create storage directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&config.db_path)
            .context("Failed to open local storage database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %config.db_path.display(), "Initialized local storage");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.config.db_path
    }

    // ========================================================================
    // Baselines
    // ========================================================================

    /// Load all baselines for a trade date, ordered by symbol.
    pub async fn load_baselines(&self, date: NaiveDate) -> Result<Vec<BaselineRecord>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT symbol, {} FROM baselines WHERE trade_date = ?1 ORDER BY symbol",
            BASELINE_FIELDS.join(", ")
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
            Ok(BaselineRecord {
                symbol: row.get(0)?,
                trade_date: date,
                float_share: row.get(1)?,
                total_mv: row.get(2)?,
                sum_inst_net: row.get(3)?,
                list_count: row.get(4)?,
                winner_rate: row.get(5)?,
                cost_concentration: row.get(6)?,
                margin_cap_ratio: row.get(7)?,
                pre_close: row.get(8)?,
                pre_vol: row.get(9)?,
                pre_ats: row.get(10)?,
            })
        })?;

        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(date = %date, count = records.len(), "Loaded baselines from local storage");
        Ok(records)
    }

    /// Upsert baselines. Existing non-zero values survive zero/NULL rewrites.
    pub async fn store_baselines(&self, records: &[BaselineRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(&baseline_upsert_sql())?;
            for r in records {
                stmt.execute(params![
                    r.symbol,
                    r.trade_date.format(DATE_FORMAT).to_string(),
                    r.float_share,
                    r.total_mv,
                    r.sum_inst_net,
                    r.list_count,
                    r.winner_rate,
                    r.cost_concentration,
                    r.margin_cap_ratio,
                    r.pre_close,
                    r.pre_vol,
                    r.pre_ats,
                ])
                .with_context(|| format!("Failed to upsert baseline for {}", r.symbol))?;
            }
        }
        tx.commit()?;

        debug!(count = records.len(), "Saved baselines to local storage");
        Ok(records.len())
    }

    // ========================================================================
    // Daily Snapshots
    // ========================================================================

    /// Load the snapshot for a trade date, ordered by symbol.
    pub async fn load_snapshot(&self, date: NaiveDate) -> Result<Vec<SnapshotRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT symbol, open, high, low, close, volume, amount, trade_count, bid_vol1, ask_vol1
             FROM daily_snapshots WHERE trade_date = ?1 ORDER BY symbol",
        )?;
        let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
            Ok(SnapshotRecord {
                symbol: row.get(0)?,
                trade_date: date,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: row.get(5)?,
                amount: row.get(6)?,
                trade_count: row.get(7)?,
                bid_vol1: row.get(8)?,
                ask_vol1: row.get(9)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Save snapshot rows, replacing any existing row for the same key.
    pub async fn store_snapshot(&self, records: &[SnapshotRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO daily_snapshots
                (symbol, trade_date, open, high, low, close, volume, amount, trade_count, bid_vol1, ask_vol1)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            for r in records {
                stmt.execute(params![
                    r.symbol,
                    r.trade_date.format(DATE_FORMAT).to_string(),
                    r.open,
                    r.high,
                    r.low,
                    r.close,
                    r.volume,
                    r.amount,
                    r.trade_count,
                    r.bid_vol1,
                    r.ask_vol1,
                ])?;
            }
        }
        tx.commit()?;

        debug!(count = records.len(), "Saved daily snapshot to local storage");
        Ok(records.len())
    }

    // ========================================================================
    // Intraday Bars
    // ========================================================================

    /// Load one symbol's bars for a date, oldest first.
    pub async fn load_bars(&self, symbol: &str, date: NaiveDate) -> Result<Vec<IntradayBar>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT symbol, bar_time, open, high, low, close, volume, amount
             FROM intraday_bars
             WHERE symbol = ?1 AND substr(bar_time, 1, 10) = ?2
             ORDER BY bar_time ASC",
        )?;
        let rows = stmt.query_map(
            params![symbol, date.format(DATE_FORMAT).to_string()],
            Self::row_to_bar,
        )?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn row_to_bar(row: &rusqlite::Row) -> rusqlite::Result<IntradayBar> {
        let time_str: String = row.get(1)?;
        let bar_time = NaiveDateTime::parse_from_str(&time_str, BAR_TIME_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(IntradayBar {
            symbol: row.get(0)?,
            bar_time,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            close: row.get(5)?,
            volume: row.get(6)?,
            amount: row.get(7)?,
        })
    }

    /// Save bars, replacing existing rows for the same (symbol, bar_time).
    pub async fn store_bars(&self, bars: &[IntradayBar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO intraday_bars
                (symbol, bar_time, open, high, low, close, volume, amount)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for b in bars {
                stmt.execute(params![
                    b.symbol,
                    b.bar_time.format(BAR_TIME_FORMAT).to_string(),
                    b.open,
                    b.high,
                    b.low,
                    b.close,
                    b.volume,
                    b.amount,
                ])?;
            }
        }
        tx.commit()?;

        debug!(symbol = %bars[0].symbol, count = bars.len(), "Saved intraday bars");
        Ok(bars.len())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Row counts per table.
    pub async fn get_stats(&self) -> Result<LocalStorageStats> {
        let db = self.db.lock().await;
        let count = |table: &str| -> Result<usize> {
            let n: i64 = db.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
            Ok(usize::try_from(n).unwrap_or(0))
        };

        Ok(LocalStorageStats {
            baseline_count: count("baselines")?,
            snapshot_count: count("daily_snapshots")?,
            bar_count: count("intraday_bars")?,
        })
    }
}

// ============================================================================
// Source Trait Implementations
// ============================================================================

#[async_trait]
impl BaselineStore for LocalStorage {
    async fn get_baseline(&self, date: NaiveDate) -> Result<Vec<BaselineRecord>, ProviderError> {
        Ok(self.load_baselines(date).await?)
    }

    async fn save_baseline(&self, records: &[BaselineRecord]) -> Result<usize, ProviderError> {
        Ok(self.store_baselines(records).await?)
    }
}

#[async_trait]
impl SnapshotSource for LocalStorage {
    async fn get_daily_snapshot(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<SnapshotRecord>, ProviderError> {
        Ok(self.load_snapshot(date).await?)
    }
}

#[async_trait]
impl BarArchive for LocalStorage {
    async fn get_intraday_bars(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Vec<IntradayBar>, ProviderError> {
        Ok(self.load_bars(symbol, date).await?)
    }
}
