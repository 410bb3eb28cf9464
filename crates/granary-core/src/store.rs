//! The `WarehouseStore` trait — the durable-store seam.
//!
//! The trait is implemented by storage backends (e.g. `granary-store-sqlite`).
//! The engine layer depends on this abstraction, not on any concrete
//! backend. Correctness requires only that the backend provides atomic
//! multi-row commits and conflict detection on a per-natural-key basis.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  dimension::{DimensionVersion, NewVersion, SurrogateKey},
  fact::{FactRecord, NewFactRecord},
};

/// Result of an atomic version write ([`WarehouseStore::insert_version`] or
/// [`WarehouseStore::transition_version`]).
///
/// A conflict is a value, not an error: the caller re-reads the current
/// version and re-runs change detection against the post-conflict state.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
  /// The write committed; this is the new open version.
  Applied(DimensionVersion),
  /// A concurrent writer got there first. Nothing was written.
  Conflict,
}

/// Abstraction over a warehouse storage backend.
///
/// Mutation discipline: inserts only, plus the single close-out update on
/// the one open version per natural key. No other mutation path exists.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait WarehouseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Version reads ─────────────────────────────────────────────────────

  /// The open (`is_current`) version for a natural key, if any.
  fn current_version<'a>(
    &'a self,
    dimension: &'a str,
    natural_key: &'a str,
  ) -> impl Future<Output = Result<Option<DimensionVersion>, Self::Error>>
  + Send
  + 'a;

  /// The version whose validity interval contains `as_of`, if any.
  /// This is the point-in-time primitive behind surrogate key resolution.
  fn version_as_of<'a>(
    &'a self,
    dimension: &'a str,
    natural_key: &'a str,
    as_of: NaiveDate,
  ) -> impl Future<Output = Result<Option<DimensionVersion>, Self::Error>>
  + Send
  + 'a;

  /// Full version history for a natural key, ordered by `valid_from`.
  fn versions<'a>(
    &'a self,
    dimension: &'a str,
    natural_key: &'a str,
  ) -> impl Future<Output = Result<Vec<DimensionVersion>, Self::Error>>
  + Send
  + 'a;

  // ── Version writes ────────────────────────────────────────────────────

  /// Open a first version for a natural key. Returns
  /// [`TransitionOutcome::Conflict`] if an open version already exists
  /// (a concurrent writer created one between our read and this write).
  fn insert_version(
    &self,
    open: NewVersion,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  /// Atomically close the version identified by `close` (set
  /// `valid_to = open.valid_from − 1 day`, clear `is_current`) and insert
  /// `open` as the new current version. Both steps commit together or not
  /// at all.
  ///
  /// Returns [`TransitionOutcome::Conflict`] if `close` is no longer the
  /// current version; in that case nothing was written.
  fn transition_version(
    &self,
    close: SurrogateKey,
    open: NewVersion,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Look up a fact by its natural business key. Used for idempotent
  /// replay: a row that already exists is skipped, not duplicated.
  fn find_fact<'a>(
    &'a self,
    order_id: &'a str,
    line_number: u32,
  ) -> impl Future<Output = Result<Option<FactRecord>, Self::Error>> + Send + 'a;

  /// Insert a fact row together with its dimension references, atomically.
  /// The fact id and timestamps are assigned by the store.
  fn insert_fact(
    &self,
    input: NewFactRecord,
  ) -> impl Future<Output = Result<FactRecord, Self::Error>> + Send + '_;

  // ── Calendar ──────────────────────────────────────────────────────────

  /// Populate the date dimension for every date in `[from, to]`,
  /// idempotently. Returns the number of rows actually inserted.
  fn ensure_calendar(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
