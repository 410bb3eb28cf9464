//! Error type for `granary-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date parse error: {0}")]
  DateParse(String),

  /// A fact insert referenced a `date_id` with no calendar row. The
  /// calendar must cover every business date before facts are loaded.
  #[error("no calendar row for date_id {0}")]
  CalendarGap(i32),
}

/// Per-natural-key conflicts surface as [`TransitionOutcome::Conflict`]
/// values, so everything that reaches this conversion is a storage failure:
/// the unit of work rolled back and the batch is safely re-runnable.
///
/// [`TransitionOutcome::Conflict`]: granary_core::store::TransitionOutcome::Conflict
impl From<Error> for granary_core::Error {
  fn from(err: Error) -> Self {
    granary_core::Error::CommitFailure(err.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
