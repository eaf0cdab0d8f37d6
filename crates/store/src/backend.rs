//! Embedded SQL backends.
//!
//! SQLite and DuckDB share one query set (see [`crate::sql`]); each backend
//! only knows how to run a [`Query`] and hand back [`RawRow`]s.

use std::path::Path;
use std::time::Duration;

use flow_core::config::{StoreBackend, StoreConfig};
use flow_core::{
    Error, ForeignHolding, Instrument, MainFundFlow, MarginRecord, MarketBar, Result, SourceTable,
    StockCode, TradeDate, INSTRUMENT_TABLE,
};
use tracing::{debug, info};

use crate::sql::{self, Query, RawRow};
use crate::store::{DateRange, SourceStore};

/// A connection that can run the shared queries.
pub trait SqlConnection {
    type Error: std::fmt::Display;

    /// Run a row query shaped by `query.text_cols` / `query.num_cols`.
    fn fetch_rows(&self, query: &Query) -> std::result::Result<Vec<RawRow>, Self::Error>;

    /// Run a single-value text query.
    fn fetch_text(&self, sql: &str) -> std::result::Result<Option<String>, Self::Error>;
}

impl SqlConnection for rusqlite::Connection {
    type Error = rusqlite::Error;

    fn fetch_rows(&self, query: &Query) -> rusqlite::Result<Vec<RawRow>> {
        let mut stmt = self.prepare(&query.sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(query.params.iter()), |row| {
            let mut raw = RawRow {
                texts: Vec::with_capacity(query.text_cols),
                values: Vec::with_capacity(query.num_cols),
            };
            for i in 0..query.text_cols {
                raw.texts.push(row.get(i)?);
            }
            for i in 0..query.num_cols {
                raw.values.push(row.get(query.text_cols + i)?);
            }
            Ok(raw)
        })?;
        rows.collect()
    }

    fn fetch_text(&self, sql: &str) -> rusqlite::Result<Option<String>> {
        self.query_row(sql, [], |row| row.get(0))
    }
}

impl SqlConnection for duckdb::Connection {
    type Error = duckdb::Error;

    fn fetch_rows(&self, query: &Query) -> duckdb::Result<Vec<RawRow>> {
        let mut stmt = self.prepare(&query.sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(query.params.iter()), |row| {
            let mut raw = RawRow {
                texts: Vec::with_capacity(query.text_cols),
                values: Vec::with_capacity(query.num_cols),
            };
            for i in 0..query.text_cols {
                raw.texts.push(row.get(i)?);
            }
            for i in 0..query.num_cols {
                raw.values.push(row.get(query.text_cols + i)?);
            }
            Ok(raw)
        })?;
        rows.collect()
    }

    fn fetch_text(&self, sql: &str) -> duckdb::Result<Option<String>> {
        self.query_row(sql, [], |row| row.get(0))
    }
}

/// Map a driver error onto the error taxonomy. Missing tables and columns
/// mean the source is unavailable; anything else is a database failure.
fn classify_error(table: &str, message: String) -> Error {
    let lower = message.to_ascii_lowercase();
    let missing = lower.contains("no such table")
        || lower.contains("no such column")
        || lower.contains("does not exist")
        || lower.contains("not found in from clause");
    if missing {
        Error::source_unavailable(table, message)
    } else {
        Error::database(format!("{table}: {message}"))
    }
}

#[inline]
fn matches_nothing(codes: Option<&[StockCode]>) -> bool {
    codes.is_some_and(|c| c.is_empty())
}

/// Source store over an embedded SQL connection.
pub struct SqlStore<C> {
    conn: C,
}

/// SQLite-backed store.
pub type SqliteStore = SqlStore<rusqlite::Connection>;

/// DuckDB-backed store.
pub type DuckDbStore = SqlStore<duckdb::Connection>;

impl<C: SqlConnection> SqlStore<C> {
    /// Wrap an already-open connection.
    pub fn from_connection(conn: C) -> Self {
        Self { conn }
    }

    fn fetch(&self, table: &str, query: &Query) -> Result<Vec<RawRow>> {
        let rows = self
            .conn
            .fetch_rows(query)
            .map_err(|e| classify_error(table, e.to_string()))?;
        debug!(table, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }
}

impl SqliteStore {
    /// Open a SQLite database read-only. Reads wait up to `busy_timeout`
    /// on a writer before failing.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        use rusqlite::OpenFlags;

        let conn = rusqlite::Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::database(format!("open {}: {e}", path.as_ref().display())))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }
}

impl DuckDbStore {
    /// Open a DuckDB database read-only.
    ///
    /// DuckDB has no busy timeout: a file held by a writer in another
    /// process fails the open at once and surfaces as `Error::Database`,
    /// so `busy_timeout_secs` only applies to SQLite.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = duckdb::Config::default()
            .access_mode(duckdb::AccessMode::ReadOnly)
            .map_err(|e| Error::database(e.to_string()))?;
        let conn = duckdb::Connection::open_with_flags(path.as_ref(), config)
            .map_err(|e| Error::database(format!("open {}: {e}", path.as_ref().display())))?;
        Ok(Self::from_connection(conn))
    }
}

impl<C: SqlConnection> SourceStore for SqlStore<C> {
    fn max_trade_date(&self, table: SourceTable) -> Result<Option<TradeDate>> {
        let name = table.table_name();
        let text = self
            .conn
            .fetch_text(&sql::max_date_query(table))
            .map_err(|e| classify_error(name, e.to_string()))?;
        Ok(text.as_deref().and_then(flow_core::parse_trade_date))
    }

    fn market_bars(&self, range: &DateRange, codes: Option<&[StockCode]>) -> Result<Vec<MarketBar>> {
        if matches_nothing(codes) {
            return Ok(Vec::new());
        }
        let query = sql::market_bars_query(range, codes);
        let rows = self.fetch(SourceTable::MarketBars.table_name(), &query)?;
        Ok(sql::to_market_bars(rows))
    }

    fn margin_records(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MarginRecord>> {
        if matches_nothing(codes) {
            return Ok(Vec::new());
        }
        let query = sql::margin_query(range, codes);
        let rows = self.fetch(SourceTable::Margin.table_name(), &query)?;
        Ok(sql::to_margin_records(rows))
    }

    fn foreign_holdings(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<ForeignHolding>> {
        if matches_nothing(codes) {
            return Ok(Vec::new());
        }
        let query = sql::foreign_query(range, codes);
        let rows = self.fetch(SourceTable::ForeignHoldings.table_name(), &query)?;
        Ok(sql::to_foreign_holdings(rows))
    }

    fn main_fund_flows(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MainFundFlow>> {
        if matches_nothing(codes) {
            return Ok(Vec::new());
        }
        let query = sql::main_flow_query(range, codes);
        let rows = self.fetch(SourceTable::MainFundFlow.table_name(), &query)?;
        Ok(sql::to_main_fund_flows(rows))
    }

    fn instruments(&self, codes: Option<&[StockCode]>) -> Result<Vec<Instrument>> {
        if matches_nothing(codes) {
            return Ok(Vec::new());
        }
        let query = sql::instruments_query(codes);
        let rows = self.fetch(INSTRUMENT_TABLE, &query)?;
        Ok(sql::to_instruments(rows))
    }
}

/// Open the store a configuration points at.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn SourceStore>> {
    info!(store = %config.describe(), "Opening source store");
    match config.backend {
        StoreBackend::Sqlite => {
            let timeout = Duration::from_secs(config.busy_timeout_secs);
            Ok(Box::new(SqliteStore::open(&config.path, timeout)?))
        }
        StoreBackend::DuckDb => Ok(Box::new(DuckDbStore::open(&config.path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SCHEMA: &str = "
        CREATE TABLE daily_market (code TEXT, trade_date DATE, open REAL, high REAL, low REAL,
            close REAL, volume REAL, turnover_rate REAL);
        CREATE TABLE margin_data (code TEXT, trade_date DATE, financing_buy REAL,
            financing_balance REAL, securities_sell REAL, securities_balance REAL,
            net_financing_buy REAL);
        CREATE TABLE stock_basic (code TEXT, name TEXT, sector TEXT, industry TEXT,
            float_mv REAL, total_mv REAL, pe_ttm REAL);
        INSERT INTO daily_market VALUES
            ('600000', '2024-03-01', 10, 11, 9, 10.5, 1000, 1.2),
            ('600000', '2024-03-04', 10.5, 11, 10, 10.8, 1100, 1.3),
            ('000001', '2024-03-04', 12, 12.5, 11.8, 12.2, 900, NULL),
            ('000001', '2024-03-05', 12.2, 12.4, 12, NULL, 900, 0.9);
        INSERT INTO margin_data VALUES
            ('600000', '2024-03-01', 100, 5000, 0, 0, 50);
        INSERT INTO stock_basic VALUES
            ('600000', 'Pudong Bank', 'Main Board', 'Banks', 2e11, 2.5e11, 5.1),
            ('000001', 'Ping An Bank', 'SZSE Main Board', 'Banks', 2e11, 2.1e11, 4.8);
    ";

    fn d(day: u32) -> TradeDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn code(s: &str) -> StockCode {
        StockCode::parse(s).unwrap()
    }

    fn sqlite_store() -> SqliteStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        SqliteStore::from_connection(conn)
    }

    fn duckdb_store() -> DuckDbStore {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        DuckDbStore::from_connection(conn)
    }

    fn check_store(store: &dyn SourceStore) {
        assert_eq!(store.max_trade_date(SourceTable::MarketBars).unwrap(), Some(d(5)));
        assert_eq!(store.max_trade_date(SourceTable::Margin).unwrap(), Some(d(1)));

        // NULL close rows are not loaded.
        let bars = store.market_bars(&DateRange::all(), None).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].code.as_str(), "000001");
        assert_eq!(bars[0].turnover_rate, 0.0);

        let bars = store
            .market_bars(&DateRange::between(d(2), d(5)), Some(&[code("600000")]))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].trade_date, d(4));

        let margin = store.margin_records(&DateRange::all(), None).unwrap();
        assert_eq!(margin.len(), 1);
        assert_eq!(margin[0].net_financing_buy, 50.0);

        let instruments = store.instruments(Some(&[code("000001")])).unwrap();
        assert_eq!(instruments.len(), 1);
        assert_eq!(instruments[0].board.display_name(), "深市主板");

        assert!(store.market_bars(&DateRange::all(), Some(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_store() {
        check_store(&sqlite_store());
    }

    #[test]
    fn test_duckdb_store() {
        check_store(&duckdb_store());
    }

    #[test]
    fn test_missing_table_is_unavailable() {
        for store in [
            Box::new(sqlite_store()) as Box<dyn SourceStore>,
            Box::new(duckdb_store()) as Box<dyn SourceStore>,
        ] {
            let err = store.max_trade_date(SourceTable::ForeignHoldings).unwrap_err();
            assert!(err.is_source_unavailable(), "{err}");
            let err = store
                .main_fund_flows(&DateRange::all(), None)
                .unwrap_err();
            assert!(err.is_source_unavailable(), "{err}");
        }
    }

    #[test]
    fn test_classify_error() {
        assert!(classify_error("t", "no such table: t".into()).is_source_unavailable());
        assert!(classify_error("t", "Catalog Error: Table with name t does not exist!".into())
            .is_source_unavailable());
        assert!(!classify_error("t", "database is locked".into()).is_source_unavailable());
    }

    #[test]
    fn test_open_missing_sqlite_file_fails() {
        let result = SqliteStore::open("/nonexistent/dir/none.db", Duration::from_secs(1));
        assert!(result.is_err());
    }
}
