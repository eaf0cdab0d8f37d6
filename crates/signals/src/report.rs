//! Full-market analysis report.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use flow_core::{Config, Result, Signal, StockCode, TradeDate};
use flow_store::{LoadScope, SourceStore};
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::info;

use crate::pipeline::{evaluate, Evaluated};

/// One instrument in the report. Amounts are in raw currency units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub code: StockCode,
    pub name: String,
    /// Board display name.
    pub sector: String,
    pub industry: String,
    pub pe_ttm: f64,
    pub total_mv: f64,
    pub float_mv: f64,
    pub signal: Signal,
    pub label: &'static str,
    /// Date of the latest market bar.
    pub trade_date: TradeDate,
    pub close: f64,
    pub ma: f64,
    /// Percent change, zero when undefined.
    pub chg_pct: f64,
    pub turnover_rate: f64,
    pub financing_balance: f64,
    pub net_financing_buy: f64,
    /// Foreign cumulative holding value.
    pub nb_hold_value: f64,
    /// Foreign inflow (first difference of holding value).
    pub nb_inflow: f64,
    pub main_net_inflow: f64,
    pub fin_mv_pct: f64,
    pub nb_mv_pct: f64,
    pub fin_tmv_pct: f64,
    pub nb_tmv_pct: f64,
    pub financing_surge_pct: f64,
    pub surge_score: f64,
}

impl From<Evaluated> for AnalysisRow {
    fn from(e: Evaluated) -> Self {
        let Evaluated {
            snapshot,
            instrument,
            metrics,
            signal,
        } = e;
        Self {
            sector: instrument.board.display_name().to_string(),
            code: instrument.code,
            name: instrument.name,
            industry: instrument.industry,
            pe_ttm: instrument.pe_ttm,
            total_mv: instrument.total_mv,
            float_mv: instrument.float_mv,
            signal,
            label: signal.label(),
            trade_date: snapshot.trade_date(),
            close: snapshot.close(),
            ma: snapshot.ma,
            chg_pct: snapshot.chg_pct_or_zero(),
            turnover_rate: snapshot.bar.turnover_rate,
            financing_balance: snapshot.financing_balance(),
            net_financing_buy: snapshot.net_financing_buy(),
            nb_hold_value: snapshot.foreign_hold_value(),
            nb_inflow: snapshot.foreign_inflow(),
            main_net_inflow: snapshot.main_net_inflow(),
            fin_mv_pct: metrics.fin_mv_pct,
            nb_mv_pct: metrics.nb_mv_pct,
            fin_tmv_pct: metrics.fin_tmv_pct,
            nb_tmv_pct: metrics.nb_tmv_pct,
            financing_surge_pct: metrics.financing_surge_pct,
            surge_score: metrics.surge_score,
        }
    }
}

/// Numeric column to rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    SurgeScore,
    Close,
    ChgPct,
    TurnoverRate,
    PeTtm,
    TotalMv,
    FinancingBalance,
    NetFinancingBuy,
    NbHoldValue,
    NbInflow,
    MainNetInflow,
    FinMvPct,
    NbMvPct,
    FinTmvPct,
    NbTmvPct,
}

impl SortKey {
    pub const ALL: [SortKey; 15] = [
        SortKey::SurgeScore,
        SortKey::Close,
        SortKey::ChgPct,
        SortKey::TurnoverRate,
        SortKey::PeTtm,
        SortKey::TotalMv,
        SortKey::FinancingBalance,
        SortKey::NetFinancingBuy,
        SortKey::NbHoldValue,
        SortKey::NbInflow,
        SortKey::MainNetInflow,
        SortKey::FinMvPct,
        SortKey::NbMvPct,
        SortKey::FinTmvPct,
        SortKey::NbTmvPct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortKey::SurgeScore => "surge_score",
            SortKey::Close => "close",
            SortKey::ChgPct => "chg_pct",
            SortKey::TurnoverRate => "turnover_rate",
            SortKey::PeTtm => "pe_ttm",
            SortKey::TotalMv => "total_mv",
            SortKey::FinancingBalance => "financing_balance",
            SortKey::NetFinancingBuy => "net_financing_buy",
            SortKey::NbHoldValue => "nb_hold_value",
            SortKey::NbInflow => "nb_inflow",
            SortKey::MainNetInflow => "main_net_inflow",
            SortKey::FinMvPct => "fin_mv_pct",
            SortKey::NbMvPct => "nb_mv_pct",
            SortKey::FinTmvPct => "fin_tmv_pct",
            SortKey::NbTmvPct => "nb_tmv_pct",
        }
    }

    pub fn value(self, row: &AnalysisRow) -> f64 {
        match self {
            SortKey::SurgeScore => row.surge_score,
            SortKey::Close => row.close,
            SortKey::ChgPct => row.chg_pct,
            SortKey::TurnoverRate => row.turnover_rate,
            SortKey::PeTtm => row.pe_ttm,
            SortKey::TotalMv => row.total_mv,
            SortKey::FinancingBalance => row.financing_balance,
            SortKey::NetFinancingBuy => row.net_financing_buy,
            SortKey::NbHoldValue => row.nb_hold_value,
            SortKey::NbInflow => row.nb_inflow,
            SortKey::MainNetInflow => row.main_net_inflow,
            SortKey::FinMvPct => row.fin_mv_pct,
            SortKey::NbMvPct => row.nb_mv_pct,
            SortKey::FinTmvPct => row.fin_tmv_pct,
            SortKey::NbTmvPct => row.nb_tmv_pct,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SortKey::ALL
            .into_iter()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| format!("unknown sort column '{s}'"))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    Ascending,
    #[default]
    Descending,
}

/// Classified snapshot of every referenced instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Latest date every answering source table has committed.
    pub safe_date: Option<TradeDate>,
    /// Last date of the loaded market window.
    pub as_of: Option<TradeDate>,
    /// Rows, ordered by code unless re-sorted.
    pub rows: Vec<AnalysisRow>,
}

impl AnalysisReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, code: &StockCode) -> Option<&AnalysisRow> {
        self.rows.iter().find(|r| &r.code == code)
    }

    /// Stable sort by a numeric column. Ties keep their current order.
    pub fn sort_by(&mut self, key: SortKey, order: Order) {
        self.rows.sort_by(|a, b| {
            let ord: Ordering = OrderedFloat(key.value(a)).cmp(&OrderedFloat(key.value(b)));
            match order {
                Order::Ascending => ord,
                Order::Descending => ord.reverse(),
            }
        });
    }

    /// First `n` rows in current order.
    pub fn top_n(&self, n: usize) -> &[AnalysisRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the full-market report.
pub fn build_full_report<S: SourceStore + ?Sized>(store: &S, config: &Config) -> AnalysisReport {
    let started = Instant::now();
    let output = evaluate(store, config, LoadScope::All, config.window.lookback_days);
    let report = AnalysisReport {
        safe_date: output.safe_date,
        as_of: output.as_of,
        rows: output.rows.into_iter().map(AnalysisRow::from).collect(),
    };
    info!(
        rows = report.len(),
        safe_date = ?report.safe_date,
        as_of = ?report.as_of,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Generated analysis report"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(code: &str, surge: f64, close: f64) -> AnalysisRow {
        AnalysisRow {
            code: StockCode::parse(code).unwrap(),
            name: "Foo".to_string(),
            sector: "沪市主板".to_string(),
            industry: "Banking".to_string(),
            pe_ttm: 5.0,
            total_mv: 1e10,
            float_mv: 1e10,
            signal: Signal::Neutral,
            label: Signal::Neutral.label(),
            trade_date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            close,
            ma: close,
            chg_pct: 0.0,
            turnover_rate: 1.0,
            financing_balance: 0.0,
            net_financing_buy: 0.0,
            nb_hold_value: 0.0,
            nb_inflow: 0.0,
            main_net_inflow: 0.0,
            fin_mv_pct: 0.0,
            nb_mv_pct: 0.0,
            fin_tmv_pct: 0.0,
            nb_tmv_pct: 0.0,
            financing_surge_pct: surge / 1000.0,
            surge_score: surge,
        }
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            safe_date: None,
            as_of: None,
            rows: vec![
                row("000001", 0.5, 10.0),
                row("000002", -1.0, 30.0),
                row("600000", 0.5, 20.0),
                row("600001", 2.0, 5.0),
            ],
        }
    }

    fn codes(rows: &[AnalysisRow]) -> Vec<&str> {
        rows.iter().map(|r| r.code.as_str()).collect()
    }

    #[test]
    fn test_sort_descending_is_stable() {
        let mut report = report();
        report.sort_by(SortKey::SurgeScore, Order::Descending);
        assert_eq!(codes(&report.rows), vec!["600001", "000001", "600000", "000002"]);
    }

    #[test]
    fn test_sort_ascending() {
        let mut report = report();
        report.sort_by(SortKey::Close, Order::Ascending);
        assert_eq!(codes(&report.rows), vec!["600001", "000001", "600000", "000002"]);
    }

    #[test]
    fn test_top_n() {
        let mut report = report();
        report.sort_by(SortKey::SurgeScore, Order::Descending);
        assert_eq!(codes(report.top_n(2)), vec!["600001", "000001"]);
        assert_eq!(report.top_n(10).len(), 4);
    }

    #[test]
    fn test_sort_key_from_str() {
        assert_eq!("surge_score".parse::<SortKey>().unwrap(), SortKey::SurgeScore);
        assert_eq!("Fin-MV-Pct".parse::<SortKey>().unwrap(), SortKey::FinMvPct);
        assert!("volume".parse::<SortKey>().is_err());
        for key in SortKey::ALL {
            assert_eq!(key.to_string().parse::<SortKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_get_and_json() {
        let report = report();
        let code = StockCode::parse("600000").unwrap();
        assert_eq!(report.get(&code).unwrap().close, 20.0);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"surge_score\""));
        assert!(json.contains("\"600000\""));
    }
}
