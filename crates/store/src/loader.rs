//! Trailing window loading.
//!
//! Pulls the last N calendar days of every time-series table, for either
//! the whole market or an explicit code set. A failing table degrades to
//! empty; an empty market-bar slice means there is nothing to report.

use chrono::Duration;
use flow_core::{
    ForeignHolding, MainFundFlow, MarginRecord, MarketBar, Result, SourceTable, StockCode,
    TradeDate,
};
use tracing::{info, warn};

use crate::store::{DateRange, SourceStore};

/// Which instruments to load.
#[derive(Debug, Clone, Copy)]
pub enum LoadScope<'a> {
    /// Every instrument (bulk report).
    All,
    /// Only these codes (targeted path).
    Codes(&'a [StockCode]),
}

impl<'a> LoadScope<'a> {
    fn codes(&self) -> Option<&'a [StockCode]> {
        match *self {
            LoadScope::All => None,
            LoadScope::Codes(codes) => Some(codes),
        }
    }
}

/// Raw rows of every source table over one window.
#[derive(Debug, Clone, Default)]
pub struct SourceWindow {
    /// Date range that was loaded.
    pub range: DateRange,
    pub market_bars: Vec<MarketBar>,
    pub margin: Vec<MarginRecord>,
    pub foreign_holdings: Vec<ForeignHolding>,
    pub main_fund_flows: Vec<MainFundFlow>,
    /// Tables that failed and were treated as empty.
    pub degraded: Vec<SourceTable>,
}

impl SourceWindow {
    /// Whether the market-bar spine is empty.
    pub fn is_empty(&self) -> bool {
        self.market_bars.is_empty()
    }
}

fn tolerate<T>(degraded: &mut Vec<SourceTable>, table: SourceTable, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            warn!(table = %table, error = %e, "Source table unavailable, treating as empty");
            degraded.push(table);
            Vec::new()
        }
    }
}

/// Loader for a fixed trailing span.
#[derive(Debug, Clone, Copy)]
pub struct WindowLoader {
    lookback_days: i64,
}

impl WindowLoader {
    /// Create a loader covering `lookback_days` calendar days before the end
    /// date.
    pub fn new(lookback_days: i64) -> Self {
        Self { lookback_days }
    }

    /// Inclusive range ending at `end`.
    pub fn range_ending(&self, end: TradeDate) -> DateRange {
        let start = end
            .checked_sub_signed(Duration::days(self.lookback_days))
            .unwrap_or(end);
        DateRange::between(start, end)
    }

    /// Load every source table over the window ending at `end`.
    pub fn load<S: SourceStore + ?Sized>(
        &self,
        store: &S,
        end: TradeDate,
        scope: LoadScope<'_>,
    ) -> SourceWindow {
        let range = self.range_ending(end);
        let codes = scope.codes();
        let mut degraded = Vec::new();

        let market_bars = tolerate(
            &mut degraded,
            SourceTable::MarketBars,
            store.market_bars(&range, codes),
        );
        let margin = tolerate(
            &mut degraded,
            SourceTable::Margin,
            store.margin_records(&range, codes),
        );
        let foreign_holdings = tolerate(
            &mut degraded,
            SourceTable::ForeignHoldings,
            store.foreign_holdings(&range, codes),
        );
        let main_fund_flows = tolerate(
            &mut degraded,
            SourceTable::MainFundFlow,
            store.main_fund_flows(&range, codes),
        );

        info!(
            start = ?range.start,
            end = ?range.end,
            bars = market_bars.len(),
            margin = margin.len(),
            foreign = foreign_holdings.len(),
            main_flow = main_fund_flows.len(),
            "Loaded source window"
        );

        SourceWindow {
            range,
            market_bars,
            margin,
            foreign_holdings,
            main_fund_flows,
            degraded,
        }
    }
}
