//! PyO3 bindings for the flowsignal report engine.
//!
//! Exposes to Python:
//! - Full-market analysis report and targeted signals
//! - Source freshness diagnostics
//! - Market breadth
//! - A cached report service for long-running dashboards
//!
//! Results come back as lists of plain dicts. Every call opens the store
//! read-only, runs, and closes it.

use std::time::Duration;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use flow_core::{
    format_trade_date, Config as RustConfig, SourceTable, StoreBackend, StoreConfig,
};
use flow_signals::{
    build_full_report, market_breadth as rust_market_breadth,
    signals_for_codes as rust_signals_for_codes, AnalysisReport, AnalysisRow, Order,
    ReportCache, SortKey,
};
use flow_store::{
    latest_common_trade_date as rust_latest_common_trade_date, open_store, SourceStore,
};

fn to_py_err(e: flow_core::Error) -> PyErr {
    PyRuntimeError::new_err(e.to_string())
}

/// Configuration for a call. An explicit `db_path` wins over the
/// environment.
fn resolve_config(db_path: Option<String>, duckdb: bool) -> PyResult<RustConfig> {
    let store = match db_path {
        Some(path) => StoreConfig {
            backend: if duckdb {
                StoreBackend::DuckDb
            } else {
                StoreBackend::Sqlite
            },
            path: path.into(),
            ..StoreConfig::default()
        },
        None => StoreConfig::from_env().map_err(to_py_err)?,
    };
    Ok(RustConfig {
        store,
        ..RustConfig::default()
    })
}

fn open(config: &RustConfig) -> PyResult<Box<dyn SourceStore>> {
    open_store(&config.store).map_err(to_py_err)
}

fn row_to_dict<'py>(py: Python<'py>, row: &AnalysisRow) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new_bound(py);
    d.set_item("code", row.code.as_str())?;
    d.set_item("name", &row.name)?;
    d.set_item("sector", &row.sector)?;
    d.set_item("industry", &row.industry)?;
    d.set_item("pe_ttm", row.pe_ttm)?;
    d.set_item("total_mv", row.total_mv)?;
    d.set_item("float_mv", row.float_mv)?;
    d.set_item("signal", row.label)?;
    d.set_item("blacklisted", row.signal.is_blacklisted())?;
    d.set_item("trade_date", format_trade_date(row.trade_date))?;
    d.set_item("close", row.close)?;
    d.set_item("ma20", row.ma)?;
    d.set_item("chg_pct", row.chg_pct)?;
    d.set_item("turnover_rate", row.turnover_rate)?;
    d.set_item("financing_balance", row.financing_balance)?;
    d.set_item("net_financing_buy", row.net_financing_buy)?;
    d.set_item("nb_hold_value", row.nb_hold_value)?;
    d.set_item("nb_inflow", row.nb_inflow)?;
    d.set_item("main_net_inflow", row.main_net_inflow)?;
    d.set_item("fin_mv_pct", row.fin_mv_pct)?;
    d.set_item("nb_mv_pct", row.nb_mv_pct)?;
    d.set_item("fin_tmv_pct", row.fin_tmv_pct)?;
    d.set_item("nb_tmv_pct", row.nb_tmv_pct)?;
    d.set_item("financing_surge_pct", row.financing_surge_pct)?;
    d.set_item("surge_score", row.surge_score)?;
    Ok(d)
}

fn report_to_dicts<'py>(
    py: Python<'py>,
    mut report: AnalysisReport,
    sort_by: Option<&str>,
    ascending: bool,
    top: Option<usize>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    if let Some(key) = sort_by {
        let key: SortKey = key.parse().map_err(PyValueError::new_err)?;
        let order = if ascending {
            Order::Ascending
        } else {
            Order::Descending
        };
        report.sort_by(key, order);
    }
    let rows = match top {
        Some(n) => report.top_n(n),
        None => &report.rows[..],
    };
    rows.iter().map(|row| row_to_dict(py, row)).collect()
}

/// Full-market analysis report, one dict per instrument.
#[pyfunction]
#[pyo3(signature = (db_path=None, duckdb=false, sort_by=None, ascending=false, top=None))]
fn full_analysis_report<'py>(
    py: Python<'py>,
    db_path: Option<String>,
    duckdb: bool,
    sort_by: Option<&str>,
    ascending: bool,
    top: Option<usize>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let config = resolve_config(db_path, duckdb)?;
    let store = open(&config)?;
    let report = build_full_report(&store, &config);
    report_to_dicts(py, report, sort_by, ascending, top)
}

/// Signals for a list of codes, as dicts with code, signal and surge score.
#[pyfunction]
#[pyo3(signature = (codes, db_path=None, duckdb=false))]
fn signals_for_codes<'py>(
    py: Python<'py>,
    codes: Vec<String>,
    db_path: Option<String>,
    duckdb: bool,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let config = resolve_config(db_path, duckdb)?;
    let store = open(&config)?;
    let rows = rust_signals_for_codes(&store, &codes, &config);
    rows.iter()
        .map(|row| {
            let d = PyDict::new_bound(py);
            d.set_item("code", row.code.as_str())?;
            d.set_item("signal", row.label)?;
            d.set_item("surge_score", row.surge_score)?;
            Ok(d)
        })
        .collect()
}

/// Latest date per source table, `None` where unavailable.
#[pyfunction]
#[pyo3(signature = (db_path=None, duckdb=false))]
fn table_max_dates<'py>(
    py: Python<'py>,
    db_path: Option<String>,
    duckdb: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let config = resolve_config(db_path, duckdb)?;
    let store = open(&config)?;
    let d = PyDict::new_bound(py);
    for (table, date) in flow_store::table_max_dates(&store) {
        d.set_item(table.table_name(), date.map(format_trade_date))?;
    }
    Ok(d)
}

/// Safe analysis date, or `None` when no source table has data.
#[pyfunction]
#[pyo3(signature = (db_path=None, duckdb=false))]
fn latest_common_trade_date(db_path: Option<String>, duckdb: bool) -> PyResult<Option<String>> {
    let config = resolve_config(db_path, duckdb)?;
    let store = open(&config)?;
    Ok(rust_latest_common_trade_date(&store, &SourceTable::ALL).map(format_trade_date))
}

/// Up/down breadth on the latest trading day.
#[pyfunction]
#[pyo3(signature = (db_path=None, duckdb=false))]
fn market_breadth<'py>(
    py: Python<'py>,
    db_path: Option<String>,
    duckdb: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let config = resolve_config(db_path, duckdb)?;
    let store = open(&config)?;
    let breadth = rust_market_breadth(&store);
    let d = PyDict::new_bound(py);
    d.set_item("sentiment", breadth.sentiment.label())?;
    d.set_item("up", breadth.up)?;
    d.set_item("down", breadth.down)?;
    d.set_item("total", breadth.total)?;
    d.set_item("trade_date", breadth.trade_date.map(format_trade_date))?;
    Ok(d)
}

/// Report service holding a TTL cache across calls.
#[pyclass]
pub struct ReportService {
    config: RustConfig,
    cache: ReportCache<AnalysisReport>,
}

#[pymethods]
impl ReportService {
    #[new]
    #[pyo3(signature = (db_path=None, duckdb=false, ttl_secs=3600))]
    fn new(db_path: Option<String>, duckdb: bool, ttl_secs: u64) -> PyResult<Self> {
        let config = resolve_config(db_path, duckdb)?;
        Ok(ReportService {
            config,
            cache: ReportCache::new(Duration::from_secs(ttl_secs)),
        })
    }

    /// Cached full report; rebuilt once the TTL has passed.
    #[pyo3(signature = (sort_by=None, ascending=false, top=None))]
    fn report<'py>(
        &self,
        py: Python<'py>,
        sort_by: Option<&str>,
        ascending: bool,
        top: Option<usize>,
    ) -> PyResult<Vec<Bound<'py, PyDict>>> {
        let report = match self.cache.get() {
            Some(report) => report,
            None => {
                let store = open(&self.config)?;
                self.cache
                    .get_or_refresh(|| build_full_report(&store, &self.config))
            }
        };
        report_to_dicts(py, report, sort_by, ascending, top)
    }

    /// Drop the cached report.
    fn invalidate(&self) {
        self.cache.invalidate();
    }

    fn __repr__(&self) -> String {
        format!(
            "ReportService(store={}, ttl_secs={})",
            self.config.store.describe(),
            self.cache.ttl().as_secs()
        )
    }
}

/// Python module definition.
#[pymodule]
fn flowsignal_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(full_analysis_report, m)?)?;
    m.add_function(wrap_pyfunction!(signals_for_codes, m)?)?;
    m.add_function(wrap_pyfunction!(table_max_dates, m)?)?;
    m.add_function(wrap_pyfunction!(latest_common_trade_date, m)?)?;
    m.add_function(wrap_pyfunction!(market_breadth, m)?)?;
    m.add_class::<ReportService>()?;
    Ok(())
}
