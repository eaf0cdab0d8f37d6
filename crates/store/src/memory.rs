//! In-memory source store.
//!
//! Holds fixture rows per table. A table left unset behaves like a missing
//! table in a real database and answers with `SourceUnavailable`.

use flow_core::{
    Error, ForeignHolding, Instrument, MainFundFlow, MarginRecord, MarketBar, Result, SourceTable,
    StockCode, TradeDate, INSTRUMENT_TABLE,
};

use crate::store::{DateRange, SourceStore};

/// Source store backed by vectors.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    market_bars: Option<Vec<MarketBar>>,
    margin: Option<Vec<MarginRecord>>,
    foreign: Option<Vec<ForeignHolding>>,
    main_flow: Option<Vec<MainFundFlow>>,
    instruments: Option<Vec<Instrument>>,
}

/// Row with a code and trade date.
trait Keyed {
    fn code(&self) -> &StockCode;
    fn date(&self) -> TradeDate;
}

macro_rules! impl_keyed {
    ($($ty:ty),*) => {
        $(impl Keyed for $ty {
            fn code(&self) -> &StockCode {
                &self.code
            }
            fn date(&self) -> TradeDate {
                self.trade_date
            }
        })*
    };
}

impl_keyed!(MarketBar, MarginRecord, ForeignHolding, MainFundFlow);

fn select<T: Keyed + Clone>(
    rows: &Option<Vec<T>>,
    table: SourceTable,
    range: &DateRange,
    codes: Option<&[StockCode]>,
) -> Result<Vec<T>> {
    let rows = rows
        .as_ref()
        .ok_or_else(|| Error::source_unavailable(table.table_name(), "table not present"))?;
    let mut out: Vec<T> = rows
        .iter()
        .filter(|r| range.contains(r.date()))
        .filter(|r| codes.map_or(true, |c| c.contains(r.code())))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.code().cmp(b.code()).then(a.date().cmp(&b.date())));
    Ok(out)
}

fn max_date<T: Keyed>(rows: &Option<Vec<T>>, table: SourceTable) -> Result<Option<TradeDate>> {
    rows.as_ref()
        .map(|rows| rows.iter().map(Keyed::date).max())
        .ok_or_else(|| Error::source_unavailable(table.table_name(), "table not present"))
}

impl MemoryStore {
    /// Store with every table missing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with every table present but empty.
    pub fn empty() -> Self {
        Self {
            market_bars: Some(Vec::new()),
            margin: Some(Vec::new()),
            foreign: Some(Vec::new()),
            main_flow: Some(Vec::new()),
            instruments: Some(Vec::new()),
        }
    }

    pub fn with_market_bars(mut self, rows: Vec<MarketBar>) -> Self {
        self.market_bars = Some(rows);
        self
    }

    pub fn with_margin(mut self, rows: Vec<MarginRecord>) -> Self {
        self.margin = Some(rows);
        self
    }

    pub fn with_foreign_holdings(mut self, rows: Vec<ForeignHolding>) -> Self {
        self.foreign = Some(rows);
        self
    }

    pub fn with_main_fund_flows(mut self, rows: Vec<MainFundFlow>) -> Self {
        self.main_flow = Some(rows);
        self
    }

    pub fn with_instruments(mut self, rows: Vec<Instrument>) -> Self {
        self.instruments = Some(rows);
        self
    }

    /// Drop a table, as if it had never been created.
    pub fn without(mut self, table: SourceTable) -> Self {
        match table {
            SourceTable::MarketBars => self.market_bars = None,
            SourceTable::Margin => self.margin = None,
            SourceTable::ForeignHoldings => self.foreign = None,
            SourceTable::MainFundFlow => self.main_flow = None,
        }
        self
    }
}

impl SourceStore for MemoryStore {
    fn max_trade_date(&self, table: SourceTable) -> Result<Option<TradeDate>> {
        match table {
            SourceTable::MarketBars => max_date(&self.market_bars, table),
            SourceTable::Margin => max_date(&self.margin, table),
            SourceTable::ForeignHoldings => max_date(&self.foreign, table),
            SourceTable::MainFundFlow => max_date(&self.main_flow, table),
        }
    }

    fn market_bars(&self, range: &DateRange, codes: Option<&[StockCode]>) -> Result<Vec<MarketBar>> {
        select(&self.market_bars, SourceTable::MarketBars, range, codes)
    }

    fn margin_records(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MarginRecord>> {
        select(&self.margin, SourceTable::Margin, range, codes)
    }

    fn foreign_holdings(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<ForeignHolding>> {
        select(&self.foreign, SourceTable::ForeignHoldings, range, codes)
    }

    fn main_fund_flows(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MainFundFlow>> {
        select(&self.main_flow, SourceTable::MainFundFlow, range, codes)
    }

    fn instruments(&self, codes: Option<&[StockCode]>) -> Result<Vec<Instrument>> {
        let rows = self
            .instruments
            .as_ref()
            .ok_or_else(|| Error::source_unavailable(INSTRUMENT_TABLE, "table not present"))?;
        let mut out: Vec<Instrument> = rows
            .iter()
            .filter(|i| codes.map_or(true, |c| c.contains(&i.code)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> TradeDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn flow(code: &str, day: u32, net_inflow: f64) -> MainFundFlow {
        MainFundFlow {
            code: StockCode::parse(code).unwrap(),
            trade_date: d(day),
            net_inflow,
        }
    }

    #[test]
    fn test_missing_tables_unavailable() {
        let store = MemoryStore::new();
        assert!(store
            .max_trade_date(SourceTable::Margin)
            .unwrap_err()
            .is_source_unavailable());
        assert!(store.instruments(None).unwrap_err().is_source_unavailable());
    }

    #[test]
    fn test_empty_table_has_no_max_date() {
        let store = MemoryStore::empty();
        assert_eq!(store.max_trade_date(SourceTable::Margin).unwrap(), None);
    }

    #[test]
    fn test_select_filters_and_sorts() {
        let store = MemoryStore::empty().with_main_fund_flows(vec![
            flow("600000", 4, 1.0),
            flow("000001", 5, 2.0),
            flow("600000", 1, 3.0),
            flow("600000", 9, 4.0),
        ]);
        let codes = [StockCode::parse("600000").unwrap()];
        let rows = store
            .main_fund_flows(&DateRange::between(d(1), d(5)), Some(&codes))
            .unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.net_inflow).collect();
        assert_eq!(values, vec![3.0, 1.0]);
        assert_eq!(store.max_trade_date(SourceTable::MainFundFlow).unwrap(), Some(d(9)));
    }

    #[test]
    fn test_without_drops_table() {
        let store = MemoryStore::empty().without(SourceTable::ForeignHoldings);
        assert!(store.foreign_holdings(&DateRange::all(), None).is_err());
        assert!(store.margin_records(&DateRange::all(), None).is_ok());
    }
}
