//! Write-through cache for report emission totals.
//!
//! The cached total is the only mutable shared state in the engine. Its
//! lifecycle is `UNSET -> COMPUTED -> (STALE -> COMPUTED) ...`: a read of an
//! unset entry forces a computation, and any source mutation must trigger a
//! synchronous [`ReportCache::invalidate_and_recompute`] before the next
//! read. Staleness is eliminated eagerly, never served.

use crate::errors::EngineResult;
use crate::report::total_emissions;
use crate::store::EntityStore;
use crate::{ReportId, Year};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Cache of lifetime-weighted total emissions, keyed by report.
///
/// Writes are atomic relative to reads: a reader never observes a
/// half-updated value. Writers are serialized by the lock; the store is
/// expected to trigger refreshes serially from committed mutations.
#[derive(Debug, Default)]
pub struct ReportCache {
    entries: RwLock<HashMap<ReportId, Decimal>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached total without forcing a computation. `None` means UNSET.
    pub fn peek(&self, report_id: ReportId) -> Option<Decimal> {
        self.entries
            .read()
            .expect("report cache lock poisoned")
            .get(&report_id)
            .copied()
    }

    /// Serves the cached total, computing it first when unset.
    pub fn get_or_compute(
        &self,
        store: &dyn EntityStore,
        report_id: ReportId,
        evaluation_year: Year,
    ) -> EngineResult<Decimal> {
        if let Some(total) = self.peek(report_id) {
            return Ok(total);
        }
        self.invalidate_and_recompute(store, report_id, evaluation_year)
    }

    /// Recomputes the report's lifetime-weighted total, writes it through to
    /// the store and replaces the cached entry.
    ///
    /// The store calls this synchronously after every committed source
    /// mutation; it is the explicit `on_source_changed` handler.
    pub fn invalidate_and_recompute(
        &self,
        store: &dyn EntityStore,
        report_id: ReportId,
        evaluation_year: Year,
    ) -> EngineResult<Decimal> {
        // Surfaces NotFound before any state changes.
        store.get_report(report_id)?;
        let sources = store.get_sources(report_id)?;
        let total = total_emissions(&sources, None, evaluation_year);

        store.set_cached_total(report_id, total)?;
        self.entries
            .write()
            .expect("report cache lock poisoned")
            .insert(report_id, total);

        debug!(report = report_id, total = %total, "report total recomputed");
        Ok(total)
    }

    /// Drops a report's entry, e.g. when the report itself is deleted.
    pub fn remove(&self, report_id: ReportId) {
        self.entries
            .write()
            .expect("report cache lock poisoned")
            .remove(&report_id);
    }
}
