//! Reduction attribution across sources, years and reports.
//!
//! The aggregator compares "with strategy" against "without strategy"
//! emissions, summed over a year window, through the single chained pipeline
//! in [`crate::modification::apply_chain`]. Sharing that code path keeps the
//! pipeline and the aggregator in bit-for-bit agreement.

use crate::errors::EngineResult;
use crate::modification::apply_chain;
use crate::store::EntityStore;
use crate::{ReportId, StrategyId, Year};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reference and reduced emission totals over a year window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionSummary {
    pub start_year: Year,
    pub end_year: Year,
    /// Emissions over the window with no strategy applied.
    pub reference_emissions: Decimal,
    /// Emissions over the window with the strategy applied.
    pub strategy_emissions: Decimal,
    pub total_reduction: Decimal,
    /// Reduction as a percentage of the reference, zero when the reference
    /// is zero.
    pub reduction_percentage: Decimal,
}

/// Total emission reduction a strategy achieves over a year window.
///
/// Omitted bounds default to `evaluation_year` (a single-year reduction);
/// the evaluation year is always explicit, never a wall clock. With
/// `report_id` present only that report is considered, otherwise every
/// report the strategy is attached to contributes.
pub fn total_reduction(
    store: &dyn EntityStore,
    strategy_id: StrategyId,
    start_year: Option<Year>,
    end_year: Option<Year>,
    report_id: Option<ReportId>,
    evaluation_year: Year,
) -> EngineResult<Decimal> {
    aggregate(store, strategy_id, start_year, end_year, report_id, evaluation_year)
        .map(|totals| totals.reduction)
}

/// Like [`total_reduction`], additionally reporting the reference and
/// reduced totals and the reduction percentage.
pub fn reduction_summary(
    store: &dyn EntityStore,
    strategy_id: StrategyId,
    start_year: Option<Year>,
    end_year: Option<Year>,
    report_id: Option<ReportId>,
    evaluation_year: Year,
) -> EngineResult<ReductionSummary> {
    let start = start_year.unwrap_or(evaluation_year);
    let end = end_year.unwrap_or(start);
    let totals = aggregate(store, strategy_id, start_year, end_year, report_id, evaluation_year)?;
    let reduction_percentage = if totals.reference.is_zero() {
        Decimal::ZERO
    } else {
        totals.reduction / totals.reference * Decimal::ONE_HUNDRED
    };
    Ok(ReductionSummary {
        start_year: start,
        end_year: end,
        reference_emissions: totals.reference,
        strategy_emissions: totals.reference - totals.reduction,
        total_reduction: totals.reduction,
        reduction_percentage,
    })
}

struct WindowTotals {
    reference: Decimal,
    reduction: Decimal,
}

impl std::iter::Sum for WindowTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(
            WindowTotals {
                reference: Decimal::ZERO,
                reduction: Decimal::ZERO,
            },
            |acc, t| WindowTotals {
                reference: acc.reference + t.reference,
                reduction: acc.reduction + t.reduction,
            },
        )
    }
}

fn aggregate(
    store: &dyn EntityStore,
    strategy_id: StrategyId,
    start_year: Option<Year>,
    end_year: Option<Year>,
    report_id: Option<ReportId>,
    evaluation_year: Year,
) -> EngineResult<WindowTotals> {
    let start = start_year.unwrap_or(evaluation_year);
    let end = end_year.unwrap_or(start);

    let reports = match report_id {
        Some(id) => vec![store.get_report(id)?],
        None => store.get_reports_for_strategy(strategy_id)?,
    };
    let modifications = store.get_modifications(strategy_id, None)?;

    let mut totals = WindowTotals {
        reference: Decimal::ZERO,
        reduction: Decimal::ZERO,
    };
    for report in &reports {
        let sources = store.get_sources(report.id)?;

        // Sources are immutable snapshots; fan the per-source work out and
        // reduce by exact-decimal summation, which is order-independent.
        // Per-source modification ordering lives inside apply_chain and is
        // unaffected by the fan-out.
        let report_totals: WindowTotals = sources
            .par_iter()
            .map(|source| -> EngineResult<WindowTotals> {
                let mut reference = Decimal::ZERO;
                let mut reduction = Decimal::ZERO;
                for year in start..=end {
                    let original = source.emission_for_year(year);
                    if original.is_zero() {
                        continue;
                    }
                    let modified = apply_chain(original, source, &modifications, year)?;
                    reference += original;
                    reduction += original - modified;
                }
                Ok(WindowTotals {
                    reference,
                    reduction,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?
            .into_iter()
            .sum();

        totals.reference += report_totals.reference;
        totals.reduction += report_totals.reduction;
    }

    debug!(
        strategy = strategy_id,
        start,
        end,
        reduction = %totals.reduction,
        "aggregated strategy reduction"
    );
    Ok(totals)
}
