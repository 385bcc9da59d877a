//! Emission sources and the per-year emission calculator.
//!
//! A [`Source`] is one emission-generating asset (a vehicle fleet, a server
//! room, a boiler). Its emission in any year is either zero (outside the
//! active lifetime window) or the exact product
//! `emission_factor * value * quantity`. All arithmetic is fixed-point
//! [`Decimal`]; nothing here rounds.

use crate::errors::{EngineError, EngineResult};
use crate::{ReportId, SourceId, Year};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broad category of the asset generating emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Vehicles and other transportation means
    Transport,
    /// Energy
    Energy,
    /// IT and electronic material
    It,
    /// Furniture and other manufactured goods
    Furniture,
    /// Tools and machinery
    Tools,
}

/// Accounting method used to quantify the source's usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    /// Distance-based
    Distance,
    /// Consumption-based
    Consumption,
    /// Fuel-based
    Fuel,
    /// Spend-based
    Spend,
}

/// Unit of the usage `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueUnit {
    /// Kilometers
    #[serde(rename = "km")]
    Km,
    /// Kilowatt hours
    #[serde(rename = "kWh")]
    KWh,
    /// Liters
    #[serde(rename = "L")]
    Liters,
    /// Kilograms
    #[serde(rename = "kg")]
    Kg,
    /// US dollars
    #[serde(rename = "USD")]
    Usd,
}

fn default_quantity() -> u32 {
    1
}

/// One emission-generating asset.
///
/// A source is active from `acquisition_year` for `lifetime` years, unless
/// `year` pins it to a single specific year. The `uncertainty` percentage is
/// informational only; the engine never consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub report_id: ReportId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub method: Method,
    /// Emission factor converting one unit of usage into kg CO2e.
    pub emission_factor: Decimal,
    /// Annual usage for a single unit, expressed in `value_unit`.
    pub value: Decimal,
    pub value_unit: ValueUnit,
    /// Number of items (e.g. number of vehicles).
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Lifetime in years.
    pub lifetime: u32,
    pub acquisition_year: Year,
    /// Uncertainty percentage (margin of error). Not used by the engine.
    #[serde(default)]
    pub uncertainty: Decimal,
    /// Specific year this record applies to. When set, emissions are only
    /// calculated for that year and the lifetime window is not otherwise
    /// consulted.
    #[serde(default)]
    pub year: Option<Year>,
}

impl Source {
    /// Checks the source invariants.
    pub fn validate(&self) -> EngineResult<()> {
        if self.value <= Decimal::ZERO {
            return Err(EngineError::NonPositiveField {
                id: self.id,
                field: "value",
            });
        }
        if self.emission_factor <= Decimal::ZERO {
            return Err(EngineError::NonPositiveField {
                id: self.id,
                field: "emission_factor",
            });
        }
        if self.quantity == 0 {
            return Err(EngineError::NonPositiveField {
                id: self.id,
                field: "quantity",
            });
        }
        if self.lifetime == 0 {
            return Err(EngineError::NonPositiveField {
                id: self.id,
                field: "lifetime",
            });
        }
        if let Some(year) = self.year {
            if year < self.acquisition_year || year >= self.lifetime_end() {
                return Err(EngineError::YearOutsideLifetime {
                    id: self.id,
                    year,
                    acquisition_year: self.acquisition_year,
                    window_end: self.lifetime_end(),
                });
            }
        }
        Ok(())
    }

    /// First year after the active lifetime window.
    pub fn lifetime_end(&self) -> Year {
        self.acquisition_year + self.lifetime as Year
    }

    /// Whether the source emits in `year`, honouring the pin when present.
    pub fn is_active_in(&self, year: Year) -> bool {
        if let Some(pinned) = self.year {
            if pinned != year {
                return false;
            }
        }
        year >= self.acquisition_year && year < self.lifetime_end()
    }

    /// Undiscounted emission for one active year:
    /// `emission_factor * value * quantity`.
    pub fn annual_emission(&self) -> Decimal {
        self.emission_factor * self.value * Decimal::from(self.quantity)
    }

    /// Emission for a specific year, zero outside the active window.
    pub fn emission_for_year(&self, year: Year) -> Decimal {
        if self.is_active_in(year) {
            self.annual_emission()
        } else {
            Decimal::ZERO
        }
    }

    /// Cumulative emission up to and including `as_of_year`, capped at the
    /// full lifetime. A pinned source contributes its single year once
    /// `as_of_year` reaches the pin.
    pub fn lifetime_total_emission(&self, as_of_year: Year) -> Decimal {
        if let Some(pinned) = self.year {
            return if as_of_year >= pinned {
                self.annual_emission()
            } else {
                Decimal::ZERO
            };
        }
        let years_active =
            (as_of_year - self.acquisition_year + 1).clamp(0, self.lifetime as Year);
        self.annual_emission() * Decimal::from(years_active)
    }
}
