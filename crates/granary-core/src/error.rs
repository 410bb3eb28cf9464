//! Error taxonomy for the load engine.
//!
//! Per-row errors (`MissingReference`, `InvalidMeasure`) are isolated by the
//! coordinator; `VersionConflict` is retried a bounded number of times before
//! surfacing; `CommitFailure` aborts the in-flight unit of work and leaves
//! the batch safely re-runnable.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No version of the natural key is valid at the requested date.
  #[error("no version of {dimension}/{natural_key} is valid at {as_of}")]
  UnknownKey {
    dimension:   String,
    natural_key: String,
    as_of:       NaiveDate,
  },

  /// A fact row references a dimension member the resolver cannot find.
  #[error(
    "fact references {dimension}/{natural_key}, which has no version valid \
     at {as_of}"
  )]
  MissingReference {
    dimension:   String,
    natural_key: String,
    as_of:       NaiveDate,
  },

  #[error("invalid measure: {field} = {value}")]
  InvalidMeasure { field: &'static str, value: f64 },

  /// A concurrent writer raced us on the same natural key's current version
  /// and retries are exhausted.
  #[error("version conflict on {dimension}/{natural_key} after {attempts} attempts")]
  VersionConflict {
    dimension:   String,
    natural_key: String,
    attempts:    u32,
  },

  /// A change arrived with an effective date at or before the open version's
  /// `valid_from`. Backfill is a pending product decision; we reject rather
  /// than guess.
  #[error(
    "effective date {effective} is not after the open version of \
     {dimension}/{natural_key} (valid from {valid_from})"
  )]
  OutOfOrderEffectiveDate {
    dimension:   String,
    natural_key: String,
    effective:   NaiveDate,
    valid_from:  NaiveDate,
  },

  /// The durable store failed mid-unit-of-work. Nothing half-committed is
  /// visible; the batch may be re-run.
  #[error("store commit failure: {0}")]
  CommitFailure(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
