//! Freshness resolution.
//!
//! The source tables update on independent schedules: market bars usually
//! land before margin and foreign holdings. The safe analysis date is the
//! latest date every answering table has committed, so a fresh market day is
//! never read as "no funding activity" just because funding has not posted.

use std::collections::BTreeMap;

use flow_core::{SourceTable, TradeDate};
use tracing::{debug, warn};

use crate::store::SourceStore;

fn table_max_date<S: SourceStore + ?Sized>(store: &S, table: SourceTable) -> Option<TradeDate> {
    match store.max_trade_date(table) {
        Ok(date) => date,
        Err(e) => {
            warn!(table = %table, error = %e, "Max date unavailable, excluding table");
            None
        }
    }
}

/// Raw per-table max dates, for display. Failing or empty tables map to
/// `None`.
pub fn table_max_dates<S: SourceStore + ?Sized>(store: &S) -> BTreeMap<SourceTable, Option<TradeDate>> {
    SourceTable::ALL
        .iter()
        .map(|&table| (table, table_max_date(store, table)))
        .collect()
}

/// Minimum of the per-table max dates across `tables`.
///
/// Tables that fail or are empty are left out. `None` means no table
/// answered: the data is not ready and callers must produce an empty report.
pub fn latest_common_trade_date<S: SourceStore + ?Sized>(
    store: &S,
    tables: &[SourceTable],
) -> Option<TradeDate> {
    let safe = tables
        .iter()
        .filter_map(|&table| table_max_date(store, table))
        .min();
    debug!(safe_date = ?safe, "Resolved safe analysis date");
    safe
}
