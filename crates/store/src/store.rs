//! Read-only store interface over the source tables.

use flow_core::{
    ForeignHolding, Instrument, MainFundFlow, MarginRecord, MarketBar, Result, SourceTable,
    StockCode, TradeDate,
};

/// Inclusive date range. An open bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<TradeDate>,
    pub end: Option<TradeDate>,
}

impl DateRange {
    /// Range covering `start..=end`.
    pub fn between(start: TradeDate, end: TradeDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Range covering every date.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether `date` falls inside the range.
    #[inline]
    pub fn contains(&self, date: TradeDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Read access to the source tables.
///
/// Every method is a point-in-time read and never writes. A table that does
/// not exist yields [`flow_core::Error::SourceUnavailable`]; callers decide
/// whether that is fatal. `codes: Some(&[])` matches nothing.
pub trait SourceStore {
    /// Latest trade date committed to a table, `None` if it is empty.
    fn max_trade_date(&self, table: SourceTable) -> Result<Option<TradeDate>>;

    /// Market bars within `range`, ordered by code then date.
    fn market_bars(&self, range: &DateRange, codes: Option<&[StockCode]>) -> Result<Vec<MarketBar>>;

    /// Margin records within `range`, ordered by code then date.
    fn margin_records(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MarginRecord>>;

    /// Foreign holdings within `range`, ordered by code then date.
    fn foreign_holdings(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<ForeignHolding>>;

    /// Main-fund flows within `range`, ordered by code then date.
    fn main_fund_flows(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MainFundFlow>>;

    /// Instrument reference rows, ordered by code.
    fn instruments(&self, codes: Option<&[StockCode]>) -> Result<Vec<Instrument>>;
}

impl<S: SourceStore + ?Sized> SourceStore for Box<S> {
    fn max_trade_date(&self, table: SourceTable) -> Result<Option<TradeDate>> {
        (**self).max_trade_date(table)
    }

    fn market_bars(&self, range: &DateRange, codes: Option<&[StockCode]>) -> Result<Vec<MarketBar>> {
        (**self).market_bars(range, codes)
    }

    fn margin_records(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MarginRecord>> {
        (**self).margin_records(range, codes)
    }

    fn foreign_holdings(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<ForeignHolding>> {
        (**self).foreign_holdings(range, codes)
    }

    fn main_fund_flows(
        &self,
        range: &DateRange,
        codes: Option<&[StockCode]>,
    ) -> Result<Vec<MainFundFlow>> {
        (**self).main_fund_flows(range, codes)
    }

    fn instruments(&self, codes: Option<&[StockCode]>) -> Result<Vec<Instrument>> {
        (**self).instruments(codes)
    }
}
