//! Feature computation engine.
//!
//! Runs the rolling indicators over a loaded window and reduces each
//! instrument to its snapshot row.

use std::collections::BTreeMap;

use flow_core::{Config, ForeignHolding, MarketBar, StockCode, TradeDate};
use flow_store::SourceWindow;
use tracing::debug;

use crate::{
    indicators::{pct_change, FirstDifference, RollingMean},
    snapshot::{ForeignLatest, SnapshotRow},
};

/// Indicators at one market bar.
#[derive(Debug, Clone)]
pub struct BarIndicators {
    pub bar: MarketBar,
    /// Close moving average including this bar.
    pub ma: f64,
    /// Percent change from the previous bar.
    pub chg_pct: Option<f64>,
}

/// Foreign inflow at one holding observation.
#[derive(Debug, Clone)]
pub struct HoldingFlow {
    pub holding: ForeignHolding,
    /// First difference of the holding value, `None` for the first
    /// observation of the code.
    pub inflow: Option<f64>,
}

/// Group rows by code, each group in ascending date order.
///
/// Rows sharing a date keep their input order.
fn group_by_code<'a, T, F>(rows: &'a [T], key: F) -> BTreeMap<StockCode, Vec<&'a T>>
where
    F: Fn(&T) -> (&StockCode, TradeDate),
{
    let mut groups: BTreeMap<StockCode, Vec<&'a T>> = BTreeMap::new();
    for row in rows {
        let (code, _) = key(row);
        groups.entry(code.clone()).or_default().push(row);
    }
    for series in groups.values_mut() {
        series.sort_by_key(|row| key(row).1);
    }
    groups
}

/// Most recent row per code, within each code's own series.
fn latest_by_code<'a, T, F>(rows: &'a [T], key: F) -> BTreeMap<StockCode, &'a T>
where
    F: Fn(&T) -> (&StockCode, TradeDate),
{
    let mut latest: BTreeMap<StockCode, &'a T> = BTreeMap::new();
    for row in rows {
        let (code, date) = key(row);
        match latest.get(code) {
            Some(current) if key(current).1 > date => {}
            _ => {
                latest.insert(code.clone(), row);
            }
        }
    }
    latest
}

/// Feature computation engine.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEngine {
    /// Moving-average period in observations.
    ma_period: usize,
}

impl FeatureEngine {
    /// Create a new feature engine from configuration.
    pub fn new(config: &Config) -> Self {
        Self::with_ma_period(config.window.ma_period)
    }

    pub fn with_ma_period(ma_period: usize) -> Self {
        Self {
            ma_period: ma_period.max(1),
        }
    }

    /// Moving average and percent change for every bar, ordered by code then
    /// date.
    pub fn bar_indicators(&self, bars: &[MarketBar]) -> Vec<BarIndicators> {
        let mut out = Vec::with_capacity(bars.len());
        for series in group_by_code(bars, |b| (&b.code, b.trade_date)).into_values() {
            let mut ma = RollingMean::new(self.ma_period);
            let mut prev_close = None;
            for bar in series {
                out.push(BarIndicators {
                    bar: bar.clone(),
                    ma: ma.add(bar.close),
                    chg_pct: pct_change(prev_close, bar.close),
                });
                prev_close = Some(bar.close);
            }
        }
        out
    }

    /// Foreign inflow for every holding observation, ordered by code then
    /// date.
    pub fn foreign_flows(&self, holdings: &[ForeignHolding]) -> Vec<HoldingFlow> {
        let mut out = Vec::with_capacity(holdings.len());
        for series in group_by_code(holdings, |h| (&h.code, h.trade_date)).into_values() {
            let mut diff = FirstDifference::new();
            for holding in series {
                out.push(HoldingFlow {
                    holding: holding.clone(),
                    inflow: diff.add(holding.hold_value),
                });
            }
        }
        out
    }

    /// One snapshot row per instrument with market bars, ordered by code.
    ///
    /// Funding sources are joined on code, each using its own latest row.
    pub fn snapshot(&self, window: &SourceWindow) -> Vec<SnapshotRow> {
        let indicators = self.bar_indicators(&window.market_bars);
        let bases = latest_by_code(&indicators, |i| (&i.bar.code, i.bar.trade_date));

        let margin = latest_by_code(&window.margin, |m| (&m.code, m.trade_date));
        let main_flow = latest_by_code(&window.main_fund_flows, |f| (&f.code, f.trade_date));
        let flows = self.foreign_flows(&window.foreign_holdings);
        let foreign = latest_by_code(&flows, |f| (&f.holding.code, f.holding.trade_date));

        let rows: Vec<SnapshotRow> = bases
            .into_iter()
            .map(|(code, base)| SnapshotRow {
                bar: base.bar.clone(),
                ma: base.ma,
                chg_pct: base.chg_pct,
                margin: margin.get(&code).map(|m| (*m).clone()),
                main_flow: main_flow.get(&code).map(|f| (*f).clone()),
                foreign: foreign.get(&code).map(|f| ForeignLatest {
                    trade_date: f.holding.trade_date,
                    hold_value: f.holding.hold_value,
                    inflow: f.inflow.unwrap_or(0.0),
                }),
            })
            .collect();

        debug!(
            instruments = rows.len(),
            with_margin = margin.len(),
            with_foreign = foreign.len(),
            "Built snapshot"
        );
        rows
    }
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use flow_core::{MainFundFlow, MarginRecord};

    fn d(day: u32) -> TradeDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn code(s: &str) -> StockCode {
        StockCode::parse(s).unwrap()
    }

    fn bar(c: &str, day: u32, close: f64) -> MarketBar {
        MarketBar {
            code: code(c),
            trade_date: d(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
            turnover_rate: 1.0,
        }
    }

    fn margin(c: &str, day: u32, net: f64) -> MarginRecord {
        MarginRecord {
            code: code(c),
            trade_date: d(day),
            financing_buy: net.max(0.0),
            financing_balance: 1e8,
            securities_sell: 0.0,
            securities_balance: 0.0,
            net_financing_buy: net,
        }
    }

    fn holding(c: &str, day: u32, value: f64) -> ForeignHolding {
        ForeignHolding {
            code: code(c),
            trade_date: d(day),
            hold_value: value,
        }
    }

    #[test]
    fn test_ma_and_pct_change_per_code() {
        let engine = FeatureEngine::with_ma_period(2);
        // Out of order on purpose.
        let bars = vec![
            bar("600000", 5, 12.0),
            bar("000001", 4, 5.0),
            bar("600000", 4, 10.0),
            bar("600000", 6, 9.0),
        ];
        let rows = engine.bar_indicators(&bars);
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].bar.code.as_str(), "000001");
        assert_eq!(rows[0].ma, 5.0);
        assert_eq!(rows[0].chg_pct, None);

        assert_eq!(rows[1].ma, 10.0);
        assert_eq!(rows[1].chg_pct, None);
        assert_relative_eq!(rows[2].ma, 11.0);
        assert_relative_eq!(rows[2].chg_pct.unwrap(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(rows[3].ma, 10.5);
        assert_relative_eq!(rows[3].chg_pct.unwrap(), -25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_first_ma_equals_close() {
        let engine = FeatureEngine::default();
        let rows = engine.bar_indicators(&[bar("600000", 1, 7.25), bar("000002", 3, 3.5)]);
        for row in rows {
            assert_eq!(row.ma, row.bar.close);
        }
    }

    #[test]
    fn test_foreign_flows() {
        let engine = FeatureEngine::default();
        let flows = engine.foreign_flows(&[
            holding("600000", 2, 130.0),
            holding("600000", 1, 100.0),
            holding("600000", 3, 120.0),
        ]);
        let inflows: Vec<Option<f64>> = flows.iter().map(|f| f.inflow).collect();
        assert_eq!(inflows, vec![None, Some(30.0), Some(-10.0)]);
    }

    #[test]
    fn test_snapshot_joins_by_code_not_date() {
        let window = SourceWindow {
            market_bars: vec![bar("600000", 7, 10.0), bar("600000", 8, 11.0)],
            // Margin lags market by two days.
            margin: vec![margin("600000", 5, -1.0), margin("600000", 6, 5e6)],
            foreign_holdings: vec![holding("600000", 6, 100.0), holding("600000", 7, 150.0)],
            main_fund_flows: vec![MainFundFlow {
                code: code("600000"),
                trade_date: d(3),
                net_inflow: 42.0,
            }],
            ..SourceWindow::default()
        };
        let rows = FeatureEngine::default().snapshot(&window);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.trade_date(), d(8));
        assert_eq!(row.close(), 11.0);
        assert_relative_eq!(row.ma, 10.5);
        assert_eq!(row.net_financing_buy(), 5e6);
        assert_eq!(row.main_net_inflow(), 42.0);
        assert_eq!(row.foreign_hold_value(), 150.0);
        assert_eq!(row.foreign_inflow(), 50.0);
    }

    #[test]
    fn test_snapshot_missing_sources_default_zero() {
        let window = SourceWindow {
            market_bars: vec![bar("600000", 8, 11.0), bar("000001", 8, 4.0)],
            foreign_holdings: vec![holding("000001", 8, 10.0)],
            ..SourceWindow::default()
        };
        let rows = FeatureEngine::default().snapshot(&window);
        let codes: Vec<&str> = rows.iter().map(|r| r.code().as_str()).collect();
        assert_eq!(codes, vec!["000001", "600000"]);

        // Single holding observation in the window: inflow is zero.
        assert_eq!(rows[0].foreign_hold_value(), 10.0);
        assert_eq!(rows[0].foreign_inflow(), 0.0);
        assert!(rows[1].margin.is_none());
        assert_eq!(rows[1].net_financing_buy(), 0.0);
        assert_eq!(rows[1].foreign_inflow(), 0.0);
    }

    #[test]
    fn test_snapshot_ignores_funding_without_bars() {
        let window = SourceWindow {
            market_bars: vec![bar("600000", 8, 11.0)],
            margin: vec![margin("000001", 8, 1.0)],
            ..SourceWindow::default()
        };
        let rows = FeatureEngine::default().snapshot(&window);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code().as_str(), "600000");
    }
}
