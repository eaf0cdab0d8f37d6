//! Feature computation for the flowsignal system.
//!
//! This crate handles:
//! - Rolling close moving average and percent change
//! - Foreign holding inflow (first difference of cumulative holdings)
//! - Latest-observation snapshot per instrument, joined by code
//! - Flow normalization against float and total market value

pub mod engine;
pub mod indicators;
pub mod normalizer;
pub mod snapshot;

pub use engine::FeatureEngine;
pub use indicators::{pct_change, FirstDifference, RollingMean};
pub use normalizer::FlowMetrics;
pub use snapshot::{ForeignLatest, SnapshotRow};
