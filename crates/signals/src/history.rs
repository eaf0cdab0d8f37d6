//! Single-instrument history for deep-dive views.
//!
//! Unlike the snapshot, this joins margin and foreign holdings on the exact
//! trade date: each bar shows what was recorded that day, zero otherwise.

use std::collections::BTreeMap;

use flow_core::{Instrument, StockCode, TradeDate};
use flow_store::{DateRange, SourceStore};
use serde::Serialize;
use tracing::{debug, warn};

/// One trading day for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub trade_date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover_rate: f64,
    pub financing_buy: f64,
    pub financing_balance: f64,
    pub securities_sell: f64,
    pub securities_balance: f64,
    pub net_financing_buy: f64,
    /// Foreign cumulative holding value.
    pub nb_hold_value: f64,
}

/// Full history plus reference data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentHistory {
    pub instrument: Instrument,
    /// Board display name.
    pub sector: String,
    /// Rows in ascending date order.
    pub rows: Vec<HistoryRow>,
}

/// History for one code. `None` when the code is invalid, has no market
/// bars, or has no reference row.
pub fn instrument_history<S: SourceStore + ?Sized>(
    store: &S,
    raw_code: &str,
) -> Option<InstrumentHistory> {
    let code = StockCode::normalize(raw_code)?;
    let codes = std::slice::from_ref(&code);
    let range = DateRange::all();

    let bars = match store.market_bars(&range, Some(codes)) {
        Ok(bars) if !bars.is_empty() => bars,
        Ok(_) => return None,
        Err(e) => {
            warn!(code = %code, error = %e, "History unavailable");
            return None;
        }
    };

    let instrument = match store.instruments(Some(codes)) {
        Ok(rows) => rows.into_iter().next()?,
        Err(e) => {
            warn!(code = %code, error = %e, "Instrument reference unavailable");
            return None;
        }
    };

    let margin: BTreeMap<TradeDate, _> = store
        .margin_records(&range, Some(codes))
        .unwrap_or_else(|e| {
            debug!(error = %e, "Margin history unavailable");
            Vec::new()
        })
        .into_iter()
        .map(|m| (m.trade_date, m))
        .collect();
    let foreign: BTreeMap<TradeDate, f64> = store
        .foreign_holdings(&range, Some(codes))
        .unwrap_or_else(|e| {
            debug!(error = %e, "Foreign holding history unavailable");
            Vec::new()
        })
        .into_iter()
        .map(|h| (h.trade_date, h.hold_value))
        .collect();

    let mut rows: Vec<HistoryRow> = bars
        .into_iter()
        .map(|bar| {
            let m = margin.get(&bar.trade_date);
            HistoryRow {
                trade_date: bar.trade_date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                turnover_rate: bar.turnover_rate,
                financing_buy: m.map_or(0.0, |m| m.financing_buy),
                financing_balance: m.map_or(0.0, |m| m.financing_balance),
                securities_sell: m.map_or(0.0, |m| m.securities_sell),
                securities_balance: m.map_or(0.0, |m| m.securities_balance),
                net_financing_buy: m.map_or(0.0, |m| m.net_financing_buy),
                nb_hold_value: foreign.get(&bar.trade_date).copied().unwrap_or(0.0),
            }
        })
        .collect();
    rows.sort_by_key(|r| r.trade_date);

    Some(InstrumentHistory {
        sector: instrument.board.display_name().to_string(),
        instrument,
        rows,
    })
}
