//! Reduction modifications and the chained application pipeline.
//!
//! A [`Modification`] is one step of a reduction strategy applied to a
//! single source: either a direct multiplier on the emission (VALUE), a
//! replacement of the effective emission factor (EF), or a progressive
//! linear interpolation of the usage value towards a target. Modifications
//! affecting the same source are applied strictly in ascending
//! `(start_year, order)` sequence, each output feeding the next.

use crate::errors::{EngineError, EngineResult};
use crate::source::Source;
use crate::{ModificationId, SourceId, StrategyId, Year};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of change a modification makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationKind {
    /// Multiplier on the emission (or interpolation of the usage value when
    /// progressive).
    Value,
    /// Replacement of the effective emission factor.
    Ef,
}

impl std::fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModificationKind::Value => write!(f, "VALUE"),
            ModificationKind::Ef => write!(f, "EF"),
        }
    }
}

impl FromStr for ModificationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALUE" => Ok(ModificationKind::Value),
            "EF" => Ok(ModificationKind::Ef),
            other => Err(EngineError::UnsupportedModificationKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// One step applied to a source under a reduction strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub id: ModificationId,
    pub strategy_id: StrategyId,
    pub source_id: SourceId,
    pub kind: ModificationKind,
    /// Multiplier (VALUE) or replacement emission factor (EF).
    pub value: Decimal,
    /// Tie-break within the same `start_year`. The store assigns
    /// `max(existing) + 1` when left at zero.
    #[serde(default)]
    pub order: u32,
    pub start_year: Year,
    #[serde(default)]
    pub end_year: Option<Year>,
    #[serde(default)]
    pub is_progressive: bool,
    /// Usage value the source trends towards; required when progressive.
    #[serde(default)]
    pub target_value: Option<Decimal>,
}

impl Modification {
    /// Checks the modification invariants.
    pub fn validate(&self) -> EngineResult<()> {
        if self.order == 0 {
            return Err(EngineError::NonPositiveOrder { id: self.id });
        }
        if let Some(end_year) = self.end_year {
            if end_year < self.start_year {
                return Err(EngineError::InvertedWindow {
                    id: self.id,
                    start_year: self.start_year,
                    end_year,
                });
            }
        }
        if self.is_progressive {
            if self.target_value.is_none() {
                return Err(EngineError::IncompleteProgressive {
                    id: self.id,
                    missing: "target_value",
                });
            }
            if self.end_year.is_none() {
                return Err(EngineError::IncompleteProgressive {
                    id: self.id,
                    missing: "end_year",
                });
            }
        }
        Ok(())
    }

    /// Sort key for chained application.
    pub fn sort_key(&self) -> (Year, u32) {
        (self.start_year, self.order)
    }

    /// Whether `year` lies in `[start_year, end_year]` (open-ended when
    /// `end_year` is absent).
    pub fn in_window(&self, year: Year) -> bool {
        year >= self.start_year && self.end_year.map_or(true, |end| year <= end)
    }

    /// Whether this modification affects the chained emission for `year`.
    ///
    /// Progressive modifications stay applicable past `end_year`: the
    /// interpolation clamps at full progress, holding the source at the
    /// target value thereafter.
    pub fn applies_to(&self, year: Year) -> bool {
        if self.is_progressive {
            year >= self.start_year
        } else {
            self.in_window(year)
        }
    }

    /// Interpolated usage value for a progressive modification.
    ///
    /// `progress = min(year - start_year + 1, total_years) / total_years`,
    /// so the first window year already carries one year of progress and the
    /// final window year lands exactly on `target_value`.
    pub fn interpolated_value(&self, source: &Source, year: Year) -> EngineResult<Decimal> {
        let end_year = self
            .end_year
            .ok_or(EngineError::IncompleteProgressive {
                id: self.id,
                missing: "end_year",
            })?;
        let target_value = self
            .target_value
            .ok_or(EngineError::IncompleteProgressive {
                id: self.id,
                missing: "target_value",
            })?;
        let total_years = end_year - self.start_year + 1;
        let years_passed = (year - self.start_year + 1).min(total_years);
        let progress = Decimal::from(years_passed) / Decimal::from(total_years);
        Ok(source.value + (target_value - source.value) * progress)
    }

    /// Applies this modification to a base emission for `year`.
    ///
    /// Outside the applicable window the base passes through unchanged.
    /// The progressive path multiplies before dividing so that every caller
    /// of this function computes bit-for-bit identical results.
    pub fn apply(&self, base_emission: Decimal, source: &Source, year: Year) -> EngineResult<Decimal> {
        if !self.applies_to(year) {
            return Ok(base_emission);
        }
        match self.kind {
            ModificationKind::Value if self.is_progressive => {
                if source.value.is_zero() {
                    return Err(EngineError::DivisionByZero {
                        modification: self.id,
                        source_id: source.id,
                        year,
                    });
                }
                let current_value = self.interpolated_value(source, year)?;
                Ok(base_emission * current_value / source.value)
            }
            ModificationKind::Value => Ok(base_emission * self.value),
            ModificationKind::Ef => {
                if source.emission_factor.is_zero() {
                    // Source validation rejects a zero factor, but the
                    // division is still guarded.
                    return Err(EngineError::DivisionByZero {
                        modification: self.id,
                        source_id: source.id,
                        year,
                    });
                }
                Ok(base_emission / source.emission_factor * self.value)
            }
        }
    }
}

/// Applies an ordered chain of modifications to a base emission for `year`.
///
/// Modifications for other sources are skipped. The chain sorts by
/// `(start_year, order)` at its own boundary rather than trusting storage
/// order; each modification's output becomes the next one's input.
pub fn apply_chain(
    base_emission: Decimal,
    source: &Source,
    modifications: &[Modification],
    year: Year,
) -> EngineResult<Decimal> {
    let mut ordered: Vec<&Modification> = modifications
        .iter()
        .filter(|m| m.source_id == source.id)
        .collect();
    ordered.sort_by_key(|m| m.sort_key());

    let mut emission = base_emission;
    for modification in ordered {
        emission = modification.apply(emission, source, year)?;
    }
    Ok(emission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Category, Method, ValueUnit};
    use rust_decimal_macros::dec;

    fn fleet() -> Source {
        Source {
            id: 1,
            report_id: 1,
            name: "Delivery vans".to_string(),
            description: String::new(),
            category: Category::Transport,
            method: Method::Distance,
            emission_factor: dec!(0.1),
            value: dec!(1000),
            value_unit: ValueUnit::Km,
            quantity: 1,
            lifetime: 5,
            acquisition_year: 2023,
            uncertainty: dec!(5),
            year: None,
        }
    }

    fn value_mod(id: u64, value: Decimal, start_year: Year) -> Modification {
        Modification {
            id,
            strategy_id: 1,
            source_id: 1,
            kind: ModificationKind::Value,
            value,
            order: id as u32,
            start_year,
            end_year: None,
            is_progressive: false,
            target_value: None,
        }
    }

    fn progressive_mod(
        id: u64,
        start_year: Year,
        end_year: Year,
        target_value: Decimal,
    ) -> Modification {
        Modification {
            id,
            strategy_id: 1,
            source_id: 1,
            kind: ModificationKind::Value,
            value: Decimal::ZERO,
            order: id as u32,
            start_year,
            end_year: Some(end_year),
            is_progressive: true,
            target_value: Some(target_value),
        }
    }

    #[test]
    fn value_modification_is_a_direct_multiplier() {
        let source = fleet();
        let modification = value_mod(1, dec!(0.9), 2024);
        let result = modification.apply(dec!(100), &source, 2025).unwrap();
        assert_eq!(result, dec!(90));
    }

    #[test]
    fn modification_is_a_no_op_before_start_and_after_end() {
        let source = fleet();
        let mut modification = value_mod(1, dec!(0.9), 2024);
        modification.end_year = Some(2026);

        assert_eq!(modification.apply(dec!(100), &source, 2023).unwrap(), dec!(100));
        assert_eq!(modification.apply(dec!(100), &source, 2026).unwrap(), dec!(90));
        assert_eq!(modification.apply(dec!(100), &source, 2027).unwrap(), dec!(100));
    }

    #[test]
    fn ef_modification_replaces_the_effective_factor() {
        let source = fleet();
        let mut modification = value_mod(1, dec!(0.05), 2024);
        modification.kind = ModificationKind::Ef;
        // base / 0.1 * 0.05 halves the emission
        let result = modification.apply(dec!(100), &source, 2024).unwrap();
        assert_eq!(result, dec!(50));
    }

    #[test]
    fn ef_modification_guards_division_by_zero() {
        let mut source = fleet();
        source.emission_factor = Decimal::ZERO;
        let mut modification = value_mod(1, dec!(0.05), 2024);
        modification.kind = ModificationKind::Ef;
        assert_eq!(
            modification.apply(dec!(100), &source, 2024),
            Err(EngineError::DivisionByZero {
                modification: 1,
                source_id: 1,
                year: 2024,
            })
        );
    }

    #[test]
    fn progressive_modification_fails_on_zero_source_value() {
        let mut source = fleet();
        source.value = Decimal::ZERO;
        let modification = progressive_mod(1, 2024, 2026, dec!(2000));
        assert!(matches!(
            modification.apply(dec!(100), &source, 2024),
            Err(EngineError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn progressive_interpolation_is_linear() {
        let source = fleet();
        let modification = progressive_mod(1, 2024, 2026, dec!(2000));

        // The first window year carries one year of progress (1/3), the
        // final window year lands exactly on the target.
        let first = modification.interpolated_value(&source, 2024).unwrap();
        let mid = modification.interpolated_value(&source, 2025).unwrap();
        let last = modification.interpolated_value(&source, 2026).unwrap();
        assert_eq!(first.round_dp(6), dec!(1333.333333));
        assert_eq!(mid.round_dp(6), dec!(1666.666667));
        assert_eq!(last, dec!(2000));

        // Steps between consecutive years are equal.
        assert_eq!((mid - first).round_dp(6), (last - mid).round_dp(6));
    }

    #[test]
    fn progressive_modification_holds_at_full_progress_past_end_year() {
        let source = fleet();
        let modification = progressive_mod(1, 2024, 2026, dec!(2000));
        let at_end = modification.apply(dec!(100), &source, 2026).unwrap();
        let after_end = modification.apply(dec!(100), &source, 2030).unwrap();
        assert_eq!(at_end, dec!(200));
        assert_eq!(after_end, dec!(200));
    }

    #[test]
    fn progressive_scales_the_emission_by_the_value_ratio() {
        let source = fleet();
        let modification = progressive_mod(1, 2024, 2026, dec!(2000));
        // base 100 scaled by 2000/1000 at the end of the window
        let result = modification.apply(dec!(100), &source, 2026).unwrap();
        assert_eq!(result, dec!(200));
    }

    #[test]
    fn chain_applies_in_start_year_then_order_sequence() {
        let source = fleet();
        // Deliberately supplied out of order; the chain must sort.
        let mods = vec![
            value_mod(2, dec!(0.5), 2025),
            value_mod(1, dec!(0.9), 2024),
        ];
        let result = apply_chain(dec!(100), &source, &mods, 2025).unwrap();
        assert_eq!(result, dec!(45));
    }

    #[test]
    fn chain_skips_modifications_for_other_sources() {
        let source = fleet();
        let mut other = value_mod(1, dec!(0.5), 2024);
        other.source_id = 99;
        let result = apply_chain(dec!(100), &source, &[other], 2025).unwrap();
        assert_eq!(result, dec!(100));
    }

    #[test]
    fn value_value_pairs_commute_under_exact_arithmetic() {
        let source = fleet();
        let a = value_mod(1, dec!(0.9), 2024);
        let b = value_mod(2, dec!(0.5), 2024);
        let ab = apply_chain(dec!(100), &source, &[a.clone(), b.clone()], 2025).unwrap();
        let mut b_first = b;
        b_first.order = 1;
        let mut a_second = a;
        a_second.order = 2;
        let ba = apply_chain(dec!(100), &source, &[b_first, a_second], 2025).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn unknown_kind_string_is_rejected() {
        let err = "OFFSET".parse::<ModificationKind>().unwrap_err();
        assert_eq!(
            err,
            EngineError::UnsupportedModificationKind {
                kind: "OFFSET".to_string()
            }
        );
        assert_eq!("VALUE".parse::<ModificationKind>().unwrap(), ModificationKind::Value);
        assert_eq!("EF".parse::<ModificationKind>().unwrap(), ModificationKind::Ef);
    }

    #[test]
    fn validation_requires_progressive_fields() {
        let mut modification = progressive_mod(1, 2024, 2026, dec!(2000));
        modification.target_value = None;
        assert_eq!(
            modification.validate(),
            Err(EngineError::IncompleteProgressive {
                id: 1,
                missing: "target_value"
            })
        );

        let mut modification = progressive_mod(1, 2024, 2026, dec!(2000));
        modification.end_year = None;
        assert_eq!(
            modification.validate(),
            Err(EngineError::IncompleteProgressive {
                id: 1,
                missing: "end_year"
            })
        );
    }

    #[test]
    fn validation_rejects_inverted_window_and_zero_order() {
        let mut modification = value_mod(1, dec!(0.9), 2026);
        modification.end_year = Some(2024);
        assert_eq!(
            modification.validate(),
            Err(EngineError::InvertedWindow {
                id: 1,
                start_year: 2026,
                end_year: 2024,
            })
        );

        let mut modification = value_mod(1, dec!(0.9), 2024);
        modification.order = 0;
        assert_eq!(
            modification.validate(),
            Err(EngineError::NonPositiveOrder { id: 1 })
        );
    }
}
