//! Targeted signals for a small code set.
//!
//! Used for holdings views where loading the whole market is wasteful.
//! Runs the same pipeline as the full report, restricted to the requested
//! codes, so a code present in both gets the same label and surge score.

use flow_core::{normalize_codes, Config, Signal, StockCode};
use flow_store::{LoadScope, SourceStore};
use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::evaluate;

/// Reduced report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRow {
    pub code: StockCode,
    pub signal: Signal,
    pub label: &'static str,
    pub surge_score: f64,
}

/// Signals for the given raw code strings.
///
/// Inputs are normalized, deduplicated and sorted; anything that does not
/// resolve to a six-digit code is dropped. Codes with no market data or no
/// instrument reference are absent from the result.
pub fn signals_for_codes<S, I, C>(store: &S, raw_codes: I, config: &Config) -> Vec<SignalRow>
where
    S: SourceStore + ?Sized,
    I: IntoIterator<Item = C>,
    C: AsRef<str>,
{
    let codes = normalize_codes(raw_codes);
    if codes.is_empty() {
        debug!("No valid codes requested");
        return Vec::new();
    }

    let output = evaluate(
        store,
        config,
        LoadScope::Codes(&codes),
        config.window.targeted_lookback_days,
    );
    let rows: Vec<SignalRow> = output
        .rows
        .into_iter()
        .map(|e| SignalRow {
            code: e.instrument.code,
            signal: e.signal,
            label: e.signal.label(),
            surge_score: e.metrics.surge_score,
        })
        .collect();

    info!(requested = codes.len(), returned = rows.len(), "Generated targeted signals");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flow_core::{Board, Instrument, MarketBar};
    use flow_store::MemoryStore;

    fn bar(code: &str, day: u32, close: f64) -> MarketBar {
        MarketBar {
            code: StockCode::parse(code).unwrap(),
            trade_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            turnover_rate: 1.0,
        }
    }

    fn instrument(code: &str) -> Instrument {
        Instrument {
            code: StockCode::parse(code).unwrap(),
            name: "Foo".to_string(),
            board: Board::ShanghaiMain,
            industry: "Banking".to_string(),
            float_mv: 1e10,
            total_mv: 1e10,
            pe_ttm: 5.0,
        }
    }

    #[test]
    fn test_codes_normalized_before_lookup() {
        let store = MemoryStore::empty()
            .with_market_bars(vec![bar("600000", 7, 10.0), bar("600000", 8, 11.0)])
            .with_instruments(vec![instrument("600000")]);
        let rows = signals_for_codes(
            &store,
            ["600000", "600000 ", "abc600000", "1"],
            &Config::default(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code.as_str(), "600000");
        assert_eq!(rows[0].signal, Signal::Uptrend);
        assert_eq!(rows[0].surge_score, 0.0);
    }

    #[test]
    fn test_no_valid_codes() {
        let store = MemoryStore::empty().with_market_bars(vec![bar("600000", 8, 11.0)]);
        let rows = signals_for_codes(&store, ["", "x", "12"], &Config::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unknown_code_absent() {
        let store = MemoryStore::empty()
            .with_market_bars(vec![bar("600000", 8, 11.0)])
            .with_instruments(vec![instrument("600000")]);
        let rows = signals_for_codes(&store, ["000001"], &Config::default());
        assert!(rows.is_empty());
    }
}
