//! Shared evaluation pipeline.
//!
//! Freshness check, window load, snapshot, normalization and classification.
//! The bulk report and the targeted path both run through `evaluate`, which
//! is what keeps their labels and scores identical for a shared code.

use std::collections::BTreeMap;

use flow_core::{Config, Instrument, Signal, SourceTable, StockCode, TradeDate};
use flow_features::{FeatureEngine, FlowMetrics, SnapshotRow};
use flow_store::{latest_common_trade_date, LoadScope, SourceStore, WindowLoader};
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierInput, SignalClassifier};

/// One classified instrument.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub snapshot: SnapshotRow,
    pub instrument: Instrument,
    pub metrics: FlowMetrics,
    pub signal: Signal,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Latest date every answering table has committed.
    pub safe_date: Option<TradeDate>,
    /// End of the loaded window.
    pub as_of: Option<TradeDate>,
    /// Classified rows, ordered by code.
    pub rows: Vec<Evaluated>,
}

/// Run the pipeline for `scope` over `lookback_days`.
///
/// Any missing prerequisite (no safe date, no market data, no instrument
/// reference) yields an empty output rather than an error.
pub fn evaluate<S: SourceStore + ?Sized>(
    store: &S,
    config: &Config,
    scope: LoadScope<'_>,
    lookback_days: i64,
) -> PipelineOutput {
    let safe_date = latest_common_trade_date(store, &SourceTable::ALL);
    let Some(safe) = safe_date else {
        info!("No source table has data, returning empty result");
        return PipelineOutput::default();
    };

    // Market bars are loaded up to their own latest date so the indicator
    // history stays dense.
    let end = match store.max_trade_date(SourceTable::MarketBars) {
        Ok(Some(end)) => end,
        Ok(None) => {
            info!("Market bar table is empty, returning empty result");
            return PipelineOutput::default();
        }
        Err(e) => {
            warn!(error = %e, "Market bar table unavailable, returning empty result");
            return PipelineOutput::default();
        }
    };

    let codes = match scope {
        LoadScope::All => None,
        LoadScope::Codes(codes) => Some(codes),
    };
    let instruments: BTreeMap<StockCode, Instrument> = match store.instruments(codes) {
        Ok(rows) => rows.into_iter().map(|i| (i.code.clone(), i)).collect(),
        Err(e) => {
            warn!(error = %e, "Instrument reference unavailable, returning empty result");
            return PipelineOutput::default();
        }
    };
    if instruments.is_empty() {
        info!("No instrument reference rows, returning empty result");
        return PipelineOutput::default();
    }

    let window = WindowLoader::new(lookback_days).load(store, end, scope);
    if window.is_empty() {
        info!(end = %end, "No market bars in window, returning empty result");
        return PipelineOutput::default();
    }

    let snapshots = FeatureEngine::new(config).snapshot(&window);
    let classifier = SignalClassifier::new(&config.classifier);
    let scale = config.classifier.surge_score_scale;

    let mut unreferenced = 0usize;
    let rows: Vec<Evaluated> = snapshots
        .into_iter()
        .filter_map(|snapshot| {
            let Some(instrument) = instruments.get(snapshot.code()) else {
                unreferenced += 1;
                return None;
            };
            let metrics =
                FlowMetrics::compute(&snapshot, instrument.float_mv, instrument.total_mv, scale);
            let signal = classifier.classify(instrument, &ClassifierInput::new(&snapshot, &metrics));
            Some(Evaluated {
                snapshot,
                instrument: instrument.clone(),
                metrics,
                signal,
            })
        })
        .collect();

    debug!(
        safe_date = %safe,
        as_of = %end,
        rows = rows.len(),
        unreferenced,
        degraded = ?window.degraded,
        "Pipeline complete"
    );

    PipelineOutput {
        safe_date,
        as_of: Some(end),
        rows,
    }
}
