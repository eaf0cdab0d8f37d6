//! Core types and configuration for the flowsignal system.
//!
//! This crate provides shared types used across all other crates:
//! - Source table rows (market bars, margin, foreign holdings, main fund flow)
//! - Instrument reference data and board remapping
//! - Instrument code normalization
//! - Signal labels
//! - Configuration structures
//! - Common error types

pub mod code;
pub mod config;
pub mod error;
pub mod types;

pub use code::{normalize_codes, StockCode};
pub use config::{CacheConfig, ClassifierConfig, Config, StoreBackend, StoreConfig, WindowConfig};
pub use error::{Error, Result};
pub use types::*;
