//! Latest-observation snapshot rows.
//!
//! Every funding source is attached by code with its own latest row, so an
//! instrument whose market bar is newer than its margin record still carries
//! that margin record. A source with no row for the code stays `None` and
//! reads as zero through the accessors.

use flow_core::{MainFundFlow, MarginRecord, MarketBar, StockCode, TradeDate};
use serde::Serialize;

/// Latest foreign holding for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForeignLatest {
    pub trade_date: TradeDate,
    /// Cumulative holding value.
    pub hold_value: f64,
    /// Change since the previous observation in the window, zero for the
    /// first one.
    pub inflow: f64,
}

/// One instrument's most recent observation across all sources.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    /// Latest market bar (the spine).
    pub bar: MarketBar,
    /// Close moving average at `bar`.
    pub ma: f64,
    /// Percent change of close at `bar`, `None` when undefined.
    pub chg_pct: Option<f64>,
    pub margin: Option<MarginRecord>,
    pub main_flow: Option<MainFundFlow>,
    pub foreign: Option<ForeignLatest>,
}

impl SnapshotRow {
    pub fn code(&self) -> &StockCode {
        &self.bar.code
    }

    pub fn trade_date(&self) -> TradeDate {
        self.bar.trade_date
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    /// Percent change, zero when undefined.
    pub fn chg_pct_or_zero(&self) -> f64 {
        self.chg_pct.unwrap_or(0.0)
    }

    pub fn net_financing_buy(&self) -> f64 {
        self.margin.as_ref().map_or(0.0, |m| m.net_financing_buy)
    }

    pub fn financing_balance(&self) -> f64 {
        self.margin.as_ref().map_or(0.0, |m| m.financing_balance)
    }

    pub fn main_net_inflow(&self) -> f64 {
        self.main_flow.as_ref().map_or(0.0, |f| f.net_inflow)
    }

    pub fn foreign_hold_value(&self) -> f64 {
        self.foreign.map_or(0.0, |f| f.hold_value)
    }

    pub fn foreign_inflow(&self) -> f64 {
        self.foreign.map_or(0.0, |f| f.inflow)
    }
}
