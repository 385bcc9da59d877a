use crate::{ModificationId, ReportId, SourceId, StrategyId, Year};
use thiserror::Error;

/// Error type for invalid operations.
///
/// Nothing in the engine is fatal or retried; every failure propagates
/// synchronously to the caller with the entity id and year needed to
/// diagnose it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("source {id}: {field} must be greater than zero")]
    NonPositiveField { id: SourceId, field: &'static str },
    #[error(
        "source {id}: pinned year {year} is outside the lifetime window \
         [{acquisition_year}, {window_end})"
    )]
    YearOutsideLifetime {
        id: SourceId,
        year: Year,
        acquisition_year: Year,
        window_end: Year,
    },
    #[error("modification {id}: progressive modification requires {missing}")]
    IncompleteProgressive {
        id: ModificationId,
        missing: &'static str,
    },
    #[error("modification {id}: end year {end_year} precedes start year {start_year}")]
    InvertedWindow {
        id: ModificationId,
        start_year: Year,
        end_year: Year,
    },
    #[error("modification {id}: order must be greater than zero")]
    NonPositiveOrder { id: ModificationId },
    #[error("unsupported modification kind '{kind}'")]
    UnsupportedModificationKind { kind: String },
    #[error("division by zero applying modification {modification} to source {source_id} in {year}")]
    DivisionByZero {
        modification: ModificationId,
        source_id: SourceId,
        year: Year,
    },
    #[error("report {0} not found")]
    ReportNotFound(ReportId),
    #[error("source {0} not found")]
    SourceNotFound(SourceId),
    #[error("reduction strategy {0} not found")]
    StrategyNotFound(StrategyId),
    #[error("modification {0} not found")]
    ModificationNotFound(ModificationId),
    #[error("report '{name}' dated {date} already exists")]
    DuplicateReport { name: String, date: String },
    #[error(
        "modification for strategy {strategy}, source {source_id}, start year {start_year}, \
         order {order} already exists"
    )]
    DuplicateModification {
        strategy: StrategyId,
        source_id: SourceId,
        start_year: Year,
        order: u32,
    },
    #[error("invalid engine configuration: {0}")]
    Config(String),
}

/// Convenience type for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;
