//! The load coordinator — runs a whole source batch as dimension settlement
//! followed by fact loading, with per-row error isolation and idempotent
//! replay semantics.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use granary_core::{
  Error, Result,
  detect::ChangeDecision,
  feed::{DimensionRow, SourceBatch},
  store::WarehouseStore,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Engine, loader::LoadOutcome};

// ─── Report types ────────────────────────────────────────────────────────────

/// Which phase a rejected row belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedKind {
  Dimension,
  Fact,
}

/// One row the batch could not settle or load. The row is skipped; the rest
/// of the batch proceeds.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
  pub kind:   RejectedKind,
  /// `dimension/natural_key` for dimension rows, `order_id#line` for facts.
  pub key:    String,
  pub reason: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
  pub batch_id:              Uuid,
  pub effective_date:        NaiveDate,
  pub versions_created:      usize,
  pub versions_transitioned: usize,
  pub versions_unchanged:    usize,
  pub facts_loaded:          usize,
  pub facts_skipped:         usize,
  pub rejected:              Vec<RejectedRow>,
}

impl BatchReport {
  fn new(effective_date: NaiveDate) -> Self {
    Self {
      batch_id: Uuid::new_v4(),
      effective_date,
      versions_created: 0,
      versions_transitioned: 0,
      versions_unchanged: 0,
      facts_loaded: 0,
      facts_skipped: 0,
      rejected: Vec::new(),
    }
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

impl<S> Engine<S>
where
  S: WarehouseStore,
  S::Error: Into<Error>,
{
  /// Run one batch: all dimension changes settle first, then every fact row
  /// is loaded against the post-batch dimension state.
  ///
  /// Re-running the identical batch produces the identical end state:
  /// settled dimensions come back as `NoChange` and already-loaded facts are
  /// skipped on their business key. Per-row errors are recorded in the
  /// report and never abort the batch; only a storage failure does, and the
  /// batch is then safely re-runnable.
  pub async fn run_batch(
    &self,
    batch: &SourceBatch,
    effective_date: NaiveDate,
  ) -> Result<BatchReport> {
    let mut report = BatchReport::new(effective_date);
    info!(
      batch_id = %report.batch_id,
      %effective_date,
      dimensions = batch.dimensions.len(),
      facts = batch.facts.len(),
      "batch started"
    );

    // Phase 1: dimensions. The last row per natural key wins within one
    // batch; keys settle independently, one bad key never blocks another.
    let mut latest: BTreeMap<(&str, &str), &DimensionRow> = BTreeMap::new();
    for row in &batch.dimensions {
      latest.insert((row.dimension.as_str(), row.natural_key.as_str()), row);
    }

    for row in latest.into_values() {
      match self.apply_dimension(row, effective_date).await {
        Ok(outcome) => match outcome.decision {
          ChangeDecision::NewEntity => report.versions_created += 1,
          ChangeDecision::Changed => report.versions_transitioned += 1,
          ChangeDecision::NoChange => report.versions_unchanged += 1,
        },
        Err(err) => {
          warn!(
            dimension = %row.dimension,
            natural_key = %row.natural_key,
            %err,
            "dimension row rejected"
          );
          report.rejected.push(RejectedRow {
            kind:   RejectedKind::Dimension,
            key:    format!("{}/{}", row.dimension, row.natural_key),
            reason: err.to_string(),
          });
        }
      }
    }

    // Calendar coverage for the fact phase. A store failure here aborts the
    // batch as a whole; nothing fact-related has been written yet.
    let dates = batch.facts.iter().map(|f| f.business_date);
    if let (Some(min), Some(max)) = (dates.clone().min(), dates.max()) {
      self
        .store
        .ensure_calendar(min, max)
        .await
        .map_err(Into::into)?;
    }

    // Phase 2: facts. One bad row never aborts the batch.
    for fact in &batch.facts {
      match self.load_fact(fact).await {
        Ok(LoadOutcome::Loaded(_)) => report.facts_loaded += 1,
        Ok(LoadOutcome::Skipped { .. }) => report.facts_skipped += 1,
        Err(err) => {
          warn!(
            order_id = %fact.order_id,
            line = fact.line_number,
            %err,
            "fact row rejected"
          );
          report.rejected.push(RejectedRow {
            kind:   RejectedKind::Fact,
            key:    format!("{}#{}", fact.order_id, fact.line_number),
            reason: err.to_string(),
          });
        }
      }
    }

    info!(
      batch_id = %report.batch_id,
      created = report.versions_created,
      transitioned = report.versions_transitioned,
      unchanged = report.versions_unchanged,
      loaded = report.facts_loaded,
      skipped = report.facts_skipped,
      rejected = report.rejected.len(),
      "batch finished"
    );
    Ok(report)
  }
}
