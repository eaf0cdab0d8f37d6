//! Source store access for the flowsignal system.
//!
//! This crate handles:
//! - The read-only store interface over the source tables
//! - SQLite and DuckDB backends, selected at runtime
//! - An in-memory store for tests and fixtures
//! - Freshness resolution (safe analysis date)
//! - Trailing window loading (bulk and targeted)

pub mod backend;
pub mod freshness;
pub mod loader;
pub mod memory;
pub mod sql;
pub mod store;

pub use backend::{open_store, DuckDbStore, SqlStore, SqliteStore};
pub use freshness::{latest_common_trade_date, table_max_dates};
pub use loader::{LoadScope, SourceWindow, WindowLoader};
pub use memory::MemoryStore;
pub use store::{DateRange, SourceStore};
