//! Contract with the entity-store collaborator.
//!
//! The engine never fetches, persists or watches entities itself. A store
//! hands it immutable snapshots, already honouring (or letting the engine
//! impose) `(start_year, order)` modification order, and accepts the cached
//! report total written back by [`crate::cache::ReportCache`].
//!
//! Change notification is explicit: after committing a source mutation the
//! store calls [`crate::cache::ReportCache::invalidate_and_recompute`]
//! directly. There is no implicit registration.

use crate::errors::EngineResult;
use crate::modification::Modification;
use crate::report::{Report, ReductionStrategy};
use crate::source::Source;
use crate::{ReportId, SourceId, StrategyId};
use rust_decimal::Decimal;

/// Read/write surface the engine requires from an entity store.
///
/// Absent entities surface as the `*NotFound` variants of
/// [`crate::errors::EngineError`].
pub trait EntityStore {
    /// Fetches a report by id.
    fn get_report(&self, report_id: ReportId) -> EngineResult<Report>;

    /// All sources belonging to a report.
    fn get_sources(&self, report_id: ReportId) -> EngineResult<Vec<Source>>;

    /// A single source by id.
    fn get_source(&self, source_id: SourceId) -> EngineResult<Source>;

    /// Modifications of a strategy, optionally narrowed to one source,
    /// in ascending `(start_year, order)`.
    fn get_modifications(
        &self,
        strategy_id: StrategyId,
        source_id: Option<SourceId>,
    ) -> EngineResult<Vec<Modification>>;

    /// Strategies attached to a report.
    fn get_reduction_strategies(&self, report_id: ReportId)
        -> EngineResult<Vec<ReductionStrategy>>;

    /// Reports a strategy is attached to.
    fn get_reports_for_strategy(&self, strategy_id: StrategyId) -> EngineResult<Vec<Report>>;

    /// Write-back hook for the derived report total.
    fn set_cached_total(&self, report_id: ReportId, value: Decimal) -> EngineResult<()>;
}
