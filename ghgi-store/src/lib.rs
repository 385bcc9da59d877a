//! In-memory entity store for the ghgi engine.
//!
//! This crate plays the role the specification assigns to the external
//! entity-store collaborator: it owns the entity tables, enforces the
//! uniqueness constraints, assigns modification order, and fires the
//! explicit source-change notification that keeps every report's cached
//! total fresh. The engine itself stays pure; everything stateful lives
//! here.
//!
//! Mutations are write-through: after a committed source change the store
//! synchronously calls
//! [`ReportCache::invalidate_and_recompute`](ghgi_core::cache::ReportCache),
//! so a reader can never observe a stale cached total.

use ghgi_core::cache::ReportCache;
use ghgi_core::errors::{EngineError, EngineResult};
use ghgi_core::modification::Modification;
use ghgi_core::report::{Report, ReductionStrategy};
use ghgi_core::source::Source;
use ghgi_core::store::EntityStore;
use ghgi_core::{ModificationId, ReportId, SourceId, StrategyId, Year};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Tables {
    reports: HashMap<ReportId, Report>,
    sources: HashMap<SourceId, Source>,
    strategies: HashMap<StrategyId, ReductionStrategy>,
    modifications: HashMap<ModificationId, Modification>,
    next_id: u64,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Entity tables behind a single lock, plus the report-total cache.
///
/// The lock is released before any cache refresh so that the refresh can
/// read back through [`EntityStore`] without deadlocking.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    cache: ReportCache,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a report. `(name, date)` must be unique.
    pub fn insert_report(&self, name: &str, date: &str) -> EngineResult<Report> {
        let mut tables = self.write();
        if tables
            .reports
            .values()
            .any(|r| r.name == name && r.date == date)
        {
            return Err(EngineError::DuplicateReport {
                name: name.to_string(),
                date: date.to_string(),
            });
        }
        let id = tables.allocate_id();
        let report = Report {
            id,
            name: name.to_string(),
            date: date.to_string(),
            strategy_ids: Vec::new(),
            cached_total: None,
        };
        tables.reports.insert(id, report.clone());
        debug!(report = id, name, date, "report created");
        Ok(report)
    }

    /// Deletes a report, cascading to its sources and their modifications.
    pub fn delete_report(&self, report_id: ReportId) -> EngineResult<()> {
        let mut tables = self.write();
        tables
            .reports
            .remove(&report_id)
            .ok_or(EngineError::ReportNotFound(report_id))?;
        let removed: Vec<SourceId> = tables
            .sources
            .values()
            .filter(|s| s.report_id == report_id)
            .map(|s| s.id)
            .collect();
        tables.sources.retain(|_, s| s.report_id != report_id);
        tables
            .modifications
            .retain(|_, m| !removed.contains(&m.source_id));
        drop(tables);
        self.cache.remove(report_id);
        Ok(())
    }

    /// Creates a reduction strategy.
    pub fn insert_strategy(&self, name: &str) -> EngineResult<ReductionStrategy> {
        let mut tables = self.write();
        let id = tables.allocate_id();
        let strategy = ReductionStrategy {
            id,
            name: name.to_string(),
        };
        tables.strategies.insert(id, strategy.clone());
        Ok(strategy)
    }

    /// Attaches a strategy to a report (many-to-many; idempotent).
    pub fn attach_strategy(&self, report_id: ReportId, strategy_id: StrategyId) -> EngineResult<()> {
        let mut tables = self.write();
        if !tables.strategies.contains_key(&strategy_id) {
            return Err(EngineError::StrategyNotFound(strategy_id));
        }
        let report = tables
            .reports
            .get_mut(&report_id)
            .ok_or(EngineError::ReportNotFound(report_id))?;
        if !report.strategy_ids.contains(&strategy_id) {
            report.strategy_ids.push(strategy_id);
        }
        Ok(())
    }

    pub fn detach_strategy(&self, report_id: ReportId, strategy_id: StrategyId) -> EngineResult<()> {
        let mut tables = self.write();
        let report = tables
            .reports
            .get_mut(&report_id)
            .ok_or(EngineError::ReportNotFound(report_id))?;
        report.strategy_ids.retain(|id| *id != strategy_id);
        Ok(())
    }

    /// Validates and inserts a source, then refreshes the owning report's
    /// cached total as of `evaluation_year`.
    pub fn insert_source(&self, mut source: Source, evaluation_year: Year) -> EngineResult<Source> {
        let mut tables = self.write();
        if !tables.reports.contains_key(&source.report_id) {
            return Err(EngineError::ReportNotFound(source.report_id));
        }
        source.id = tables.allocate_id();
        source.validate()?;
        let report_id = source.report_id;
        tables.sources.insert(source.id, source.clone());
        drop(tables);

        self.on_source_changed(report_id, evaluation_year)?;
        Ok(source)
    }

    /// Validates and replaces an existing source, refreshing the cached
    /// total of every report involved (the source may have moved).
    pub fn update_source(&self, source: Source, evaluation_year: Year) -> EngineResult<Source> {
        source.validate()?;
        let mut tables = self.write();
        let previous = tables
            .sources
            .get(&source.id)
            .cloned()
            .ok_or(EngineError::SourceNotFound(source.id))?;
        if !tables.reports.contains_key(&source.report_id) {
            return Err(EngineError::ReportNotFound(source.report_id));
        }
        tables.sources.insert(source.id, source.clone());
        drop(tables);

        if previous.report_id != source.report_id {
            self.on_source_changed(previous.report_id, evaluation_year)?;
        }
        self.on_source_changed(source.report_id, evaluation_year)?;
        Ok(source)
    }

    pub fn delete_source(&self, source_id: SourceId, evaluation_year: Year) -> EngineResult<()> {
        let mut tables = self.write();
        let source = tables
            .sources
            .remove(&source_id)
            .ok_or(EngineError::SourceNotFound(source_id))?;
        tables
            .modifications
            .retain(|_, m| m.source_id != source_id);
        drop(tables);

        self.on_source_changed(source.report_id, evaluation_year)
    }

    /// Validates and inserts a modification. A zero `order` is auto-assigned
    /// `max(existing order for the same strategy, source and start year) + 1`;
    /// the `(strategy, source, start_year, order)` tuple must be unique.
    pub fn insert_modification(&self, mut modification: Modification) -> EngineResult<Modification> {
        let mut tables = self.write();
        if !tables.strategies.contains_key(&modification.strategy_id) {
            return Err(EngineError::StrategyNotFound(modification.strategy_id));
        }
        if !tables.sources.contains_key(&modification.source_id) {
            return Err(EngineError::SourceNotFound(modification.source_id));
        }

        if modification.order == 0 {
            modification.order = tables
                .modifications
                .values()
                .filter(|m| {
                    m.strategy_id == modification.strategy_id
                        && m.source_id == modification.source_id
                        && m.start_year == modification.start_year
                })
                .map(|m| m.order)
                .max()
                .unwrap_or(0)
                + 1;
        } else if tables.modifications.values().any(|m| {
            m.strategy_id == modification.strategy_id
                && m.source_id == modification.source_id
                && m.start_year == modification.start_year
                && m.order == modification.order
        }) {
            return Err(EngineError::DuplicateModification {
                strategy: modification.strategy_id,
                source_id: modification.source_id,
                start_year: modification.start_year,
                order: modification.order,
            });
        }

        modification.id = tables.allocate_id();
        modification.validate()?;
        tables
            .modifications
            .insert(modification.id, modification.clone());
        Ok(modification)
    }

    pub fn delete_modification(&self, modification_id: ModificationId) -> EngineResult<()> {
        let mut tables = self.write();
        tables
            .modifications
            .remove(&modification_id)
            .ok_or(EngineError::ModificationNotFound(modification_id))?;
        Ok(())
    }

    /// Cached total for a report, computed on first read.
    pub fn get_total_emissions(
        &self,
        report_id: ReportId,
        evaluation_year: Year,
    ) -> EngineResult<Decimal> {
        self.cache.get_or_compute(self, report_id, evaluation_year)
    }

    /// The report-total cache, for callers that drive refreshes directly.
    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// Explicit change notification: called synchronously after every
    /// committed source mutation, with the entity lock released.
    fn on_source_changed(&self, report_id: ReportId, evaluation_year: Year) -> EngineResult<()> {
        self.cache
            .invalidate_and_recompute(self, report_id, evaluation_year)?;
        Ok(())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().expect("store lock poisoned")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().expect("store lock poisoned")
    }
}

impl EntityStore for InMemoryStore {
    fn get_report(&self, report_id: ReportId) -> EngineResult<Report> {
        self.read()
            .reports
            .get(&report_id)
            .cloned()
            .ok_or(EngineError::ReportNotFound(report_id))
    }

    fn get_sources(&self, report_id: ReportId) -> EngineResult<Vec<Source>> {
        let tables = self.read();
        if !tables.reports.contains_key(&report_id) {
            return Err(EngineError::ReportNotFound(report_id));
        }
        let mut sources: Vec<Source> = tables
            .sources
            .values()
            .filter(|s| s.report_id == report_id)
            .cloned()
            .collect();
        sources.sort_by_key(|s| s.id);
        Ok(sources)
    }

    fn get_source(&self, source_id: SourceId) -> EngineResult<Source> {
        self.read()
            .sources
            .get(&source_id)
            .cloned()
            .ok_or(EngineError::SourceNotFound(source_id))
    }

    fn get_modifications(
        &self,
        strategy_id: StrategyId,
        source_id: Option<SourceId>,
    ) -> EngineResult<Vec<Modification>> {
        let tables = self.read();
        if !tables.strategies.contains_key(&strategy_id) {
            return Err(EngineError::StrategyNotFound(strategy_id));
        }
        let mut modifications: Vec<Modification> = tables
            .modifications
            .values()
            .filter(|m| {
                m.strategy_id == strategy_id && source_id.map_or(true, |id| m.source_id == id)
            })
            .cloned()
            .collect();
        modifications.sort_by_key(|m| m.sort_key());
        Ok(modifications)
    }

    fn get_reduction_strategies(
        &self,
        report_id: ReportId,
    ) -> EngineResult<Vec<ReductionStrategy>> {
        let tables = self.read();
        let report = tables
            .reports
            .get(&report_id)
            .ok_or(EngineError::ReportNotFound(report_id))?;
        Ok(report
            .strategy_ids
            .iter()
            .filter_map(|id| tables.strategies.get(id).cloned())
            .collect())
    }

    fn get_reports_for_strategy(&self, strategy_id: StrategyId) -> EngineResult<Vec<Report>> {
        let tables = self.read();
        if !tables.strategies.contains_key(&strategy_id) {
            return Err(EngineError::StrategyNotFound(strategy_id));
        }
        let mut reports: Vec<Report> = tables
            .reports
            .values()
            .filter(|r| r.strategy_ids.contains(&strategy_id))
            .cloned()
            .collect();
        reports.sort_by_key(|r| r.id);
        Ok(reports)
    }

    fn set_cached_total(&self, report_id: ReportId, value: Decimal) -> EngineResult<()> {
        let mut tables = self.write();
        let report = tables
            .reports
            .get_mut(&report_id)
            .ok_or(EngineError::ReportNotFound(report_id))?;
        report.cached_total = Some(value);
        Ok(())
    }
}
