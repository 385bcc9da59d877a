//! Year-by-year emission projection for a single source.
//!
//! Projection runs in the amortized mode: a running modified usage value is
//! carried across years (progressive modifications overwrite it, one-shot
//! modifications multiply it exactly once, on their start year) and the
//! per-year emission spreads the acquisition over the lifetime:
//! `emission_factor * modified_value * quantity / lifetime`.
//!
//! This deliberately differs from the chained mode of
//! [`crate::modification::apply_chain`], which re-applies the full chain
//! against each year's fresh base. The two modes answer different questions
//! (amortized asset footprint vs. reduction accounting) and are kept as
//! separately named code paths.

use crate::errors::EngineResult;
use crate::modification::Modification;
use crate::source::Source;
use crate::Year;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Default cap on the projection horizon, in years past the start year.
pub const DEFAULT_MAX_HORIZON_YEARS: u16 = 50;

/// Policy bounding how far a projection may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionPolicy {
    /// Maximum number of years past `start_year` a caller may request.
    pub max_horizon_years: u16,
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        Self {
            max_horizon_years: DEFAULT_MAX_HORIZON_YEARS,
        }
    }
}

impl ProjectionPolicy {
    /// Latest end year allowed for a projection starting at `start_year`.
    pub fn max_allowed_end_year(&self, start_year: Year) -> Year {
        start_year + self.max_horizon_years as Year
    }
}

/// Result of projecting one source across a year range.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub start_year: Year,
    /// End year actually used, after capping.
    pub end_year: Year,
    pub max_allowed_end_year: Year,
    /// Ordered year -> emission series.
    pub emissions: BTreeMap<Year, Decimal>,
}

impl Projection {
    /// Renders the projection for the boundary: years become strings and
    /// decimals serialize as exact strings, never binary floats.
    pub fn into_response(self) -> ProjectionResponse {
        ProjectionResponse {
            projections: self
                .emissions
                .into_iter()
                .map(|(year, emission)| (year.to_string(), emission))
                .collect(),
            start_year: self.start_year,
            end_year: self.end_year,
            max_allowed_end_year: self.max_allowed_end_year,
        }
    }
}

/// Boundary representation of a [`Projection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResponse {
    pub projections: BTreeMap<String, Decimal>,
    pub start_year: Year,
    pub end_year: Year,
    pub max_allowed_end_year: Year,
}

/// Projects a source's emissions across `[start_year, end_year]` under a set
/// of modifications.
///
/// The requested end year is capped at the policy horizon; the cap is a
/// policy, not a failure, and the effective bound is echoed in the result.
/// When `end_year` is `None` the projection runs to the cap. Years outside
/// the source's active window yield zero regardless of modifications.
pub fn project(
    source: &Source,
    modifications: &[Modification],
    start_year: Year,
    end_year: Option<Year>,
    policy: &ProjectionPolicy,
) -> EngineResult<Projection> {
    let max_allowed_end_year = policy.max_allowed_end_year(start_year);
    let effective_end_year = match end_year {
        Some(requested) if requested > max_allowed_end_year => {
            debug!(
                source = source.id,
                requested,
                capped_to = max_allowed_end_year,
                "projection end year capped"
            );
            max_allowed_end_year
        }
        Some(requested) => requested,
        None => max_allowed_end_year,
    };

    let mut ordered: Vec<&Modification> = modifications
        .iter()
        .filter(|m| m.source_id == source.id)
        .collect();
    ordered.sort_by_key(|m| m.sort_key());

    let lifetime = Decimal::from(source.lifetime);
    let quantity = Decimal::from(source.quantity);
    let mut modified_value = source.value;
    let mut emissions = BTreeMap::new();

    for year in start_year..=effective_end_year {
        if !source.is_active_in(year) {
            emissions.insert(year, Decimal::ZERO);
            continue;
        }

        for modification in &ordered {
            if !modification.in_window(year) {
                continue;
            }
            if modification.is_progressive {
                modified_value = modification.interpolated_value(source, year)?;
            } else if year == modification.start_year {
                // One-shot: captured into the running value and carried
                // forward, never re-applied on later years.
                modified_value *= modification.value;
            }
        }

        emissions.insert(
            year,
            source.emission_factor * modified_value * quantity / lifetime,
        );
    }

    Ok(Projection {
        start_year,
        end_year: effective_end_year,
        max_allowed_end_year,
        emissions,
    })
}

/// Unmodified per-year emission series for a source, per the active-window
/// rule. A reporting convenience; no horizon cap applies because the bounds
/// are explicit.
pub fn emissions_by_year(
    source: &Source,
    start_year: Year,
    end_year: Year,
) -> BTreeMap<Year, Decimal> {
    (start_year..=end_year)
        .map(|year| (year, source.emission_for_year(year)))
        .collect()
}
