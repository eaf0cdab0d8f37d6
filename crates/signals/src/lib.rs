//! Signal generation for the flowsignal system.
//!
//! This crate provides:
//! - Fundamentals blacklist and priority-ordered signal classification
//! - Full-market analysis report with ranking
//! - Targeted signals for a small code set, consistent with the report
//! - Market breadth and single-instrument history views
//! - A caller-side TTL cache for the report

pub mod breadth;
pub mod cache;
pub mod classifier;
pub mod history;
pub mod pipeline;
pub mod report;
pub mod targeted;

pub use breadth::{market_breadth, MarketBreadth, Sentiment};
pub use cache::ReportCache;
pub use classifier::{ClassifierInput, Rule, SignalClassifier};
pub use history::{instrument_history, HistoryRow, InstrumentHistory};
pub use pipeline::{evaluate, Evaluated, PipelineOutput};
pub use report::{build_full_report, AnalysisReport, AnalysisRow, Order, SortKey};
pub use targeted::{signals_for_codes, SignalRow};
