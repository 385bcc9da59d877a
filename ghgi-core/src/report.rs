//! Reports, reduction strategies and report-level aggregation.
//!
//! A report is a named, dated bundle of sources; a reduction strategy is a
//! reusable bundle of modifications attachable to many reports. Aggregation
//! here is pure: the caller supplies entity snapshots and explicit years.

use crate::errors::EngineResult;
use crate::modification::{apply_chain, Modification};
use crate::source::Source;
use crate::{ReportId, StrategyId, Year};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A named, reusable bundle of modifications.
///
/// Strategies relate to reports many-to-many; the report side holds the
/// attachment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionStrategy {
    pub id: StrategyId,
    pub name: String,
}

/// A named, dated aggregate of sources plus attached reduction strategies.
///
/// `cached_total` is derived, never authoritative: it must equal the
/// lifetime-weighted total recomputed at the moment of the last update (see
/// [`crate::cache::ReportCache`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub name: String,
    /// ISO date the report covers. Uniqueness is per `(name, date)`.
    pub date: String,
    #[serde(default)]
    pub strategy_ids: Vec<StrategyId>,
    #[serde(default)]
    pub cached_total: Option<Decimal>,
}

/// Total emissions over a report's sources.
///
/// With `year` present this is the sum of each source's emission for that
/// year. With `year` absent it is the lifetime-weighted total as of
/// `evaluation_year` (the engine never reads a wall clock; the evaluation
/// year is always explicit).
pub fn total_emissions(sources: &[Source], year: Option<Year>, evaluation_year: Year) -> Decimal {
    match year {
        Some(year) => sources.iter().map(|s| s.emission_for_year(year)).sum(),
        None => sources
            .iter()
            .map(|s| s.lifetime_total_emission(evaluation_year))
            .sum(),
    }
}

/// Outcome of comparing a report's emissions between two years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionComparison {
    pub year1: Year,
    pub year2: Year,
    pub emissions1: Decimal,
    pub emissions2: Decimal,
    pub difference: Decimal,
    pub percentage_change: Decimal,
}

/// Compares total emissions between two years.
///
/// `percentage_change` is zero when the first year has no emissions.
pub fn compare_emissions(sources: &[Source], year1: Year, year2: Year) -> EmissionComparison {
    let emissions1 = total_emissions(sources, Some(year1), year1);
    let emissions2 = total_emissions(sources, Some(year2), year2);
    let difference = emissions2 - emissions1;
    let percentage_change = if emissions1.is_zero() {
        Decimal::ZERO
    } else {
        difference / emissions1 * Decimal::ONE_HUNDRED
    };
    EmissionComparison {
        year1,
        year2,
        emissions1,
        emissions2,
        difference,
        percentage_change,
    }
}

/// Projected total emissions for one year under a set of strategies.
///
/// Each source's base emission for the year is chained through every
/// strategy's modifications in turn (per-strategy, in `(start_year, order)`
/// sequence) before summing. Sources are independent snapshots, so the
/// per-source work fans out across the rayon pool; exact decimal summation
/// is order-independent, so the parallel reduction matches a sequential one.
pub fn projected_total_emissions(
    sources: &[Source],
    strategy_modifications: &[Vec<Modification>],
    year: Year,
) -> EngineResult<Decimal> {
    sources
        .par_iter()
        .map(|source| {
            let mut emission = source.emission_for_year(year);
            for modifications in strategy_modifications {
                emission = apply_chain(emission, source, modifications, year)?;
            }
            Ok(emission)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modification::ModificationKind;
    use crate::source::{Category, Method, ValueUnit};
    use rust_decimal_macros::dec;

    fn source(id: u64, acquisition_year: Year, lifetime: u32) -> Source {
        Source {
            id,
            report_id: 1,
            name: format!("source-{id}"),
            description: String::new(),
            category: Category::Energy,
            method: Method::Consumption,
            emission_factor: dec!(0.5),
            value: dec!(200),
            value_unit: ValueUnit::KWh,
            quantity: 2,
            lifetime,
            acquisition_year,
            uncertainty: dec!(10),
            year: None,
        }
    }

    #[test]
    fn yearly_total_only_counts_active_sources() {
        // Annual emission per source: 0.5 * 200 * 2 = 200
        let sources = vec![source(1, 2020, 5), source(2, 2024, 5)];
        assert_eq!(total_emissions(&sources, Some(2022), 2022), dec!(200));
        assert_eq!(total_emissions(&sources, Some(2024), 2024), dec!(400));
        assert_eq!(total_emissions(&sources, Some(2019), 2019), Decimal::ZERO);
    }

    #[test]
    fn lifetime_total_weights_by_years_active() {
        let sources = vec![source(1, 2020, 5), source(2, 2024, 5)];
        // As of 2025: source 1 capped at 5 years, source 2 active 2 years.
        assert_eq!(total_emissions(&sources, None, 2025), dec!(1400));
    }

    #[test]
    fn comparison_reports_difference_and_percentage() {
        let sources = vec![source(1, 2020, 5), source(2, 2024, 5)];
        let comparison = compare_emissions(&sources, 2022, 2024);
        assert_eq!(comparison.emissions1, dec!(200));
        assert_eq!(comparison.emissions2, dec!(400));
        assert_eq!(comparison.difference, dec!(200));
        assert_eq!(comparison.percentage_change, dec!(100));
    }

    #[test]
    fn comparison_with_zero_base_has_zero_percentage() {
        let sources = vec![source(1, 2020, 5)];
        let comparison = compare_emissions(&sources, 2019, 2020);
        assert_eq!(comparison.emissions1, Decimal::ZERO);
        assert_eq!(comparison.percentage_change, Decimal::ZERO);
    }

    #[test]
    fn projected_total_applies_each_strategy_chain() {
        let sources = vec![source(1, 2020, 5), source(2, 2024, 5)];
        let strategy_a = vec![Modification {
            id: 1,
            strategy_id: 1,
            source_id: 1,
            kind: ModificationKind::Value,
            value: dec!(0.9),
            order: 1,
            start_year: 2024,
            end_year: None,
            is_progressive: false,
            target_value: None,
        }];
        let strategy_b = vec![Modification {
            id: 2,
            strategy_id: 2,
            source_id: 2,
            kind: ModificationKind::Ef,
            value: dec!(0.25),
            order: 1,
            start_year: 2024,
            end_year: None,
            is_progressive: false,
            target_value: None,
        }];

        // Source 1: 200 * 0.9 = 180; source 2: 200 / 0.5 * 0.25 = 100.
        let total =
            projected_total_emissions(&sources, &[strategy_a.clone(), strategy_b], 2024).unwrap();
        assert_eq!(total, dec!(280));

        // Modifications starting after the year are no-ops.
        let total = projected_total_emissions(&sources, &[strategy_a], 2023).unwrap();
        assert_eq!(total, dec!(200));
    }

    #[test]
    fn projected_total_without_strategies_is_the_plain_total() {
        let sources = vec![source(1, 2020, 5), source(2, 2024, 5)];
        let total = projected_total_emissions(&sources, &[], 2024).unwrap();
        assert_eq!(total, total_emissions(&sources, Some(2024), 2024));
    }
}
