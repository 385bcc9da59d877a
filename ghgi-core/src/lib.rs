//! Core engine for greenhouse-gas inventory calculations.
//!
//! The engine is a pure computation layer: every function takes entity
//! snapshots and explicit year bounds and returns exact decimal emission
//! figures. Persistence, transport and change notification belong to an
//! external collaborator implementing [`store::EntityStore`].

pub mod cache;
pub mod config;
pub mod modification;
pub mod projection;
pub mod reduction;
pub mod report;
pub mod source;
pub mod store;

pub mod errors;

/// Calendar year. Signed so that year arithmetic never wraps.
pub type Year = i32;

/// Identifier of a [`report::Report`].
pub type ReportId = u64;
/// Identifier of a [`source::Source`].
pub type SourceId = u64;
/// Identifier of a [`report::ReductionStrategy`].
pub type StrategyId = u64;
/// Identifier of a [`modification::Modification`].
pub type ModificationId = u64;
