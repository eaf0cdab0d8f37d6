//! Market breadth on the latest trading day.

use std::fmt;

use flow_core::{SourceTable, TradeDate};
use flow_store::{DateRange, SourceStore};
use serde::Serialize;
use tracing::warn;

/// Sentiment bucket from the share of advancing instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// More than 80% up.
    Euphoric,
    /// More than 50% up.
    Warm,
    /// More than 20% up.
    Sluggish,
    Frozen,
    /// No market data.
    Unavailable,
}

impl Sentiment {
    pub fn from_up_ratio(ratio: f64) -> Self {
        if ratio > 0.8 {
            Sentiment::Euphoric
        } else if ratio > 0.5 {
            Sentiment::Warm
        } else if ratio > 0.2 {
            Sentiment::Sluggish
        } else {
            Sentiment::Frozen
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sentiment::Euphoric => "Euphoric",
            Sentiment::Warm => "Warm",
            Sentiment::Sluggish => "Sluggish",
            Sentiment::Frozen => "Frozen",
            Sentiment::Unavailable => "No Data",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Up/down counts for one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketBreadth {
    pub sentiment: Sentiment,
    /// Close above open.
    pub up: usize,
    /// Close below open.
    pub down: usize,
    pub total: usize,
    pub trade_date: Option<TradeDate>,
}

impl MarketBreadth {
    fn unavailable(trade_date: Option<TradeDate>) -> Self {
        Self {
            sentiment: Sentiment::Unavailable,
            up: 0,
            down: 0,
            total: 0,
            trade_date,
        }
    }

    pub fn up_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.up as f64 / self.total as f64)
    }
}

/// Breadth on the latest market-bar date. Never fails.
pub fn market_breadth<S: SourceStore + ?Sized>(store: &S) -> MarketBreadth {
    let date = match store.max_trade_date(SourceTable::MarketBars) {
        Ok(Some(date)) => date,
        Ok(None) => return MarketBreadth::unavailable(None),
        Err(e) => {
            warn!(error = %e, "Breadth unavailable");
            return MarketBreadth::unavailable(None);
        }
    };

    let bars = match store.market_bars(&DateRange::between(date, date), None) {
        Ok(bars) => bars,
        Err(e) => {
            warn!(error = %e, "Breadth unavailable");
            return MarketBreadth::unavailable(Some(date));
        }
    };
    if bars.is_empty() {
        return MarketBreadth::unavailable(Some(date));
    }

    let up = bars.iter().filter(|b| b.close > b.open).count();
    let down = bars.iter().filter(|b| b.close < b.open).count();
    let total = bars.len();
    MarketBreadth {
        sentiment: Sentiment::from_up_ratio(up as f64 / total as f64),
        up,
        down,
        total,
        trade_date: Some(date),
    }
}
