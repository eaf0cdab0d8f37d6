//! Core data types for the flowsignal system.

use crate::code::StockCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading date (exchange calendar day, no time component).
pub type TradeDate = NaiveDate;

/// Date format used by every source table.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored trade date, tolerating a trailing time component
/// (`"2024-03-01 00:00:00"`).
pub fn parse_trade_date(s: &str) -> Option<TradeDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Format a trade date the way source tables store it.
pub fn format_trade_date(date: TradeDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Time-series source tables feeding a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    /// Daily OHLCV bars. The spine every other computation hangs off.
    MarketBars,
    /// Margin financing records.
    Margin,
    /// Cumulative foreign ("northbound") holding values.
    ForeignHoldings,
    /// Main-fund net inflow.
    MainFundFlow,
}

impl SourceTable {
    /// Every time-series table, in report order.
    pub const ALL: [SourceTable; 4] = [
        SourceTable::MarketBars,
        SourceTable::Margin,
        SourceTable::ForeignHoldings,
        SourceTable::MainFundFlow,
    ];

    /// Physical table name in the store.
    pub fn table_name(self) -> &'static str {
        match self {
            SourceTable::MarketBars => "daily_market",
            SourceTable::Margin => "margin_data",
            SourceTable::ForeignHoldings => "northbound_data",
            SourceTable::MainFundFlow => "main_fund_flow",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Physical name of the instrument reference table.
pub const INSTRUMENT_TABLE: &str = "stock_basic";

/// Listing board, derived from the reference table's sector category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Board {
    ShanghaiMain,
    Star,
    ShenzhenMain,
    ChiNext,
    /// Category with no remap entry; shown as stored.
    Other(String),
}

impl Board {
    /// Map a stored sector category onto a board.
    pub fn from_category(category: &str) -> Self {
        match category {
            "Main Board" => Board::ShanghaiMain,
            "STAR Market" => Board::Star,
            "SZSE Main Board" => Board::ShenzhenMain,
            "ChiNext" => Board::ChiNext,
            other => Board::Other(other.to_string()),
        }
    }

    /// Display name for reports.
    pub fn display_name(&self) -> &str {
        match self {
            Board::ShanghaiMain => "沪市主板",
            Board::Star => "科创板",
            Board::ShenzhenMain => "深市主板",
            Board::ChiNext => "创业板",
            Board::Other(category) => category,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Instrument reference data. Read-only to this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub code: StockCode,
    /// Display name.
    pub name: String,
    /// Listing board.
    pub board: Board,
    /// Industry category.
    pub industry: String,
    /// Float market value.
    pub float_mv: f64,
    /// Total market value.
    pub total_mv: f64,
    /// Trailing PE ratio.
    pub pe_ttm: f64,
}

/// One daily market bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBar {
    pub code: StockCode,
    pub trade_date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Turnover rate in percent.
    pub turnover_rate: f64,
}

/// One daily margin financing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRecord {
    pub code: StockCode,
    pub trade_date: TradeDate,
    pub financing_buy: f64,
    pub financing_balance: f64,
    pub securities_sell: f64,
    pub securities_balance: f64,
    /// Signed net financing buy (positive = net buying).
    pub net_financing_buy: f64,
}

/// One cumulative foreign holding observation.
///
/// Inflow is not stored; it is the first difference of `hold_value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignHolding {
    pub code: StockCode,
    pub trade_date: TradeDate,
    /// Cumulative mark-to-market holding value.
    pub hold_value: f64,
}

/// One main-fund net flow observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainFundFlow {
    pub code: StockCode,
    pub trade_date: TradeDate,
    /// Signed net inflow.
    pub net_inflow: f64,
}

/// Why an instrument was excluded from classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistReason {
    /// Name carries the special-treatment marker.
    SpecialTreatment,
    /// Total market value below the minimum capitalization.
    MicroCap,
}

impl BlacklistReason {
    /// Human-readable reason.
    pub fn reason(self) -> &'static str {
        match self {
            BlacklistReason::SpecialTreatment => "special treatment",
            BlacklistReason::MicroCap => "micro cap",
        }
    }
}

/// Discrete trading signal attached to every snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Failed the fundamentals filter.
    Blacklisted(BlacklistReason),
    /// Above MA with financing and foreign inflow both positive.
    StrongBuy,
    /// Below MA but some fund inflow (bottom fishing).
    Watch,
    /// Below MA with funds leaving.
    StopLoss,
    /// Financing outflow beyond the capital flight threshold.
    CapitalFlight,
    /// Above MA without fund resonance.
    Uptrend,
    /// Nothing else matched.
    Neutral,
}

impl Signal {
    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Signal::Blacklisted(BlacklistReason::SpecialTreatment) => "Blacklist (ST)",
            Signal::Blacklisted(BlacklistReason::MicroCap) => "Blacklist (Micro Cap)",
            Signal::StrongBuy => "Strong Buy",
            Signal::Watch => "Watch (Bottom Activity)",
            Signal::StopLoss => "Stop Loss",
            Signal::CapitalFlight => "Capital Flight",
            Signal::Uptrend => "Uptrend",
            Signal::Neutral => "Neutral",
        }
    }

    /// Whether the instrument was filtered out before rule evaluation.
    pub fn is_blacklisted(self) -> bool {
        matches!(self, Signal::Blacklisted(_))
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
