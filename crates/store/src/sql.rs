//! SQL shared by the embedded backends.
//!
//! Queries are written once in the dialect subset SQLite and DuckDB agree on.
//! Trade dates are compared as their ISO text prefix so date and text
//! columns behave the same. Rows come back as [`RawRow`]: text columns first,
//! then numeric columns, converted into typed rows here.

use flow_core::code::CODE_LEN;
use flow_core::{
    format_trade_date, parse_trade_date, Board, ForeignHolding, Instrument, MainFundFlow,
    MarginRecord, MarketBar, SourceTable, StockCode, TradeDate, INSTRUMENT_TABLE,
};
use tracing::debug;

use crate::store::DateRange;

/// Trade date normalized to `YYYY-MM-DD` text.
const DATE_EXPR: &str = "substr(CAST(trade_date AS TEXT), 1, 10)";

/// A parameterized query and the shape of its result rows.
#[derive(Debug, Clone)]
pub struct Query {
    pub sql: String,
    pub params: Vec<String>,
    /// Leading text columns.
    pub text_cols: usize,
    /// Trailing numeric columns.
    pub num_cols: usize,
}

/// Untyped result row.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub texts: Vec<Option<String>>,
    pub values: Vec<Option<f64>>,
}

impl RawRow {
    fn text(&self, i: usize) -> Option<&str> {
        self.texts.get(i).and_then(|t| t.as_deref())
    }

    /// Numeric column; SQL NULL reads as zero.
    fn value(&self, i: usize) -> f64 {
        self.values.get(i).copied().flatten().unwrap_or(0.0)
    }

    /// Code and date keys shared by every time-series row.
    fn keys(&self) -> Option<(StockCode, TradeDate)> {
        let code = self.text(0).and_then(stored_code)?;
        let date = self.text(1).and_then(parse_trade_date)?;
        Some((code, date))
    }
}

/// Parse a stored code. Integer-typed columns lose leading zeros, so any
/// all-digit value of up to six digits is padded back.
fn stored_code(s: &str) -> Option<StockCode> {
    let s = s.trim();
    if !s.is_empty() && s.len() <= CODE_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
        return StockCode::parse(&format!("{:0>width$}", s, width = CODE_LEN));
    }
    StockCode::normalize(s)
}

/// `SELECT MAX(date)` for a table.
pub fn max_date_query(table: SourceTable) -> String {
    format!("SELECT MAX({DATE_EXPR}) FROM {}", table.table_name())
}

fn series_query(
    table: SourceTable,
    value_cols: &[&str],
    extra_filter: Option<&str>,
    range: &DateRange,
    codes: Option<&[StockCode]>,
) -> Query {
    let mut sql = format!(
        "SELECT CAST(code AS TEXT), {DATE_EXPR}, {} FROM {} WHERE 1 = 1",
        value_cols.join(", "),
        table.table_name()
    );
    let mut params = Vec::new();

    if let Some(filter) = extra_filter {
        sql.push_str(" AND ");
        sql.push_str(filter);
    }
    if let Some(start) = range.start {
        sql.push_str(&format!(" AND {DATE_EXPR} >= ?"));
        params.push(format_trade_date(start));
    }
    if let Some(end) = range.end {
        sql.push_str(&format!(" AND {DATE_EXPR} <= ?"));
        params.push(format_trade_date(end));
    }
    push_code_filter(&mut sql, &mut params, codes);
    sql.push_str(&format!(" ORDER BY 1, {DATE_EXPR}"));

    Query {
        sql,
        params,
        text_cols: 2,
        num_cols: value_cols.len(),
    }
}

/// Text forms a code may be stored under: the padded code, plus the
/// zero-stripped form an integer column holds. Matches what
/// [`stored_code`] reads back.
fn stored_forms(code: &StockCode) -> impl Iterator<Item = String> + '_ {
    let padded = code.as_str();
    let trimmed = padded.trim_start_matches('0');
    let unpadded = match trimmed {
        "" => "0",
        t => t,
    };
    std::iter::once(padded.to_string())
        .chain((unpadded != padded).then(|| unpadded.to_string()))
}

fn push_code_filter(sql: &mut String, params: &mut Vec<String>, codes: Option<&[StockCode]>) {
    if let Some(codes) = codes {
        let forms: Vec<String> = codes.iter().flat_map(stored_forms).collect();
        let placeholders = vec!["?"; forms.len()].join(", ");
        sql.push_str(&format!(" AND CAST(code AS TEXT) IN ({placeholders})"));
        params.extend(forms);
    }
}

pub fn market_bars_query(range: &DateRange, codes: Option<&[StockCode]>) -> Query {
    series_query(
        SourceTable::MarketBars,
        &["open", "high", "low", "close", "volume", "turnover_rate"],
        Some("close IS NOT NULL"),
        range,
        codes,
    )
}

pub fn margin_query(range: &DateRange, codes: Option<&[StockCode]>) -> Query {
    series_query(
        SourceTable::Margin,
        &[
            "financing_buy",
            "financing_balance",
            "securities_sell",
            "securities_balance",
            "net_financing_buy",
        ],
        None,
        range,
        codes,
    )
}

/// The foreign holding table keeps the cumulative value in its `net_inflow`
/// column.
pub fn foreign_query(range: &DateRange, codes: Option<&[StockCode]>) -> Query {
    series_query(SourceTable::ForeignHoldings, &["net_inflow"], None, range, codes)
}

pub fn main_flow_query(range: &DateRange, codes: Option<&[StockCode]>) -> Query {
    series_query(SourceTable::MainFundFlow, &["main_net_inflow"], None, range, codes)
}

pub fn instruments_query(codes: Option<&[StockCode]>) -> Query {
    let mut sql = format!(
        "SELECT CAST(code AS TEXT), name, sector, industry, float_mv, total_mv, pe_ttm \
         FROM {INSTRUMENT_TABLE} WHERE 1 = 1"
    );
    let mut params = Vec::new();
    push_code_filter(&mut sql, &mut params, codes);
    sql.push_str(" ORDER BY 1");

    Query {
        sql,
        params,
        text_cols: 4,
        num_cols: 3,
    }
}

fn convert<T>(rows: Vec<RawRow>, table: &str, f: impl Fn(&RawRow) -> Option<T>) -> Vec<T> {
    let total = rows.len();
    let out: Vec<T> = rows.iter().filter_map(f).collect();
    if out.len() < total {
        debug!(table, skipped = total - out.len(), "Dropped rows with malformed code or date");
    }
    out
}

pub fn to_market_bars(rows: Vec<RawRow>) -> Vec<MarketBar> {
    convert(rows, SourceTable::MarketBars.table_name(), |r| {
        let (code, trade_date) = r.keys()?;
        Some(MarketBar {
            code,
            trade_date,
            open: r.value(0),
            high: r.value(1),
            low: r.value(2),
            close: r.value(3),
            volume: r.value(4),
            turnover_rate: r.value(5),
        })
    })
}

pub fn to_margin_records(rows: Vec<RawRow>) -> Vec<MarginRecord> {
    convert(rows, SourceTable::Margin.table_name(), |r| {
        let (code, trade_date) = r.keys()?;
        Some(MarginRecord {
            code,
            trade_date,
            financing_buy: r.value(0),
            financing_balance: r.value(1),
            securities_sell: r.value(2),
            securities_balance: r.value(3),
            net_financing_buy: r.value(4),
        })
    })
}

pub fn to_foreign_holdings(rows: Vec<RawRow>) -> Vec<ForeignHolding> {
    convert(rows, SourceTable::ForeignHoldings.table_name(), |r| {
        let (code, trade_date) = r.keys()?;
        Some(ForeignHolding {
            code,
            trade_date,
            hold_value: r.value(0),
        })
    })
}

pub fn to_main_fund_flows(rows: Vec<RawRow>) -> Vec<MainFundFlow> {
    convert(rows, SourceTable::MainFundFlow.table_name(), |r| {
        let (code, trade_date) = r.keys()?;
        Some(MainFundFlow {
            code,
            trade_date,
            net_inflow: r.value(0),
        })
    })
}

pub fn to_instruments(rows: Vec<RawRow>) -> Vec<Instrument> {
    convert(rows, INSTRUMENT_TABLE, |r| {
        let code = r.text(0).and_then(stored_code)?;
        Some(Instrument {
            code,
            name: r.text(1).unwrap_or_default().to_string(),
            board: Board::from_category(r.text(2).unwrap_or_default()),
            industry: r.text(3).unwrap_or_default().to_string(),
            float_mv: r.value(0),
            total_mv: r.value(1),
            pe_ttm: r.value(2),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn code(s: &str) -> StockCode {
        StockCode::parse(s).unwrap()
    }

    #[test]
    fn test_series_query_params() {
        let range = DateRange::between(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        let codes = [code("600000"), code("000001")];
        let q = margin_query(&range, Some(&codes));

        assert!(q.sql.contains("FROM margin_data"));
        assert!(q.sql.contains("IN (?, ?, ?)"));
        assert_eq!(
            q.params,
            vec!["2024-01-01", "2024-03-01", "600000", "000001", "1"]
        );
        assert_eq!(q.text_cols, 2);
        assert_eq!(q.num_cols, 5);
    }

    #[test]
    fn test_unbounded_query_has_no_params() {
        let q = market_bars_query(&DateRange::all(), None);
        assert!(q.params.is_empty());
        assert!(q.sql.contains("close IS NOT NULL"));
        assert!(!q.sql.contains(" IN ("));
    }

    #[test]
    fn test_raw_row_defaults() {
        let rows = vec![
            RawRow {
                texts: vec![Some("600000".into()), Some("2024-03-01 00:00:00".into())],
                values: vec![Some(10.0), None, None, Some(11.0), None, None],
            },
            RawRow {
                texts: vec![Some("bad".into()), Some("2024-03-01".into())],
                values: vec![Some(1.0); 6],
            },
        ];
        let bars = to_market_bars(rows);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 11.0);
        assert_eq!(bars[0].high, 0.0);
        assert_eq!(bars[0].trade_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_stored_code_restores_leading_zeros() {
        assert_eq!(stored_code("1").unwrap().as_str(), "000001");
        assert_eq!(stored_code("600000").unwrap().as_str(), "600000");
        assert!(stored_code("").is_none());
        assert!(stored_code("1234567").is_none());
    }

    #[test]
    fn test_code_filter_matches_integer_storage() {
        let codes = [code("600000"), code("000001"), code("000000")];
        let q = instruments_query(Some(&codes));
        assert_eq!(q.params, vec!["600000", "000001", "1", "000000", "0"]);
        for form in &q.params {
            assert!(codes.contains(&stored_code(form).unwrap()));
        }
    }

    #[test]
    fn test_instrument_board_remap() {
        let rows = vec![RawRow {
            texts: vec![
                Some("688001".into()),
                Some("Example".into()),
                Some("STAR Market".into()),
                None,
            ],
            values: vec![Some(5e9), Some(8e9), None],
        }];
        let instruments = to_instruments(rows);
        assert_eq!(instruments[0].board, Board::Star);
        assert_eq!(instruments[0].industry, "");
        assert_eq!(instruments[0].pe_ttm, 0.0);
    }
}
