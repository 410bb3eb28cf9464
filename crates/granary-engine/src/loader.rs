//! The fact loader — validates a source fact row, resolves its dimension
//! references point-in-time, derives the monetary measures, and inserts the
//! row idempotently.

use granary_core::{
  Error, Result,
  calendar::date_id,
  fact::{FactRecord, NewFactRecord, ResolvedRef, SourceFact, derive_measures},
  store::WarehouseStore,
};
use tracing::debug;

use crate::Engine;

/// Result of loading one source fact row.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
  Loaded(FactRecord),
  /// The natural business key already exists; nothing was written.
  Skipped { fact_id: i64 },
}

impl<S> Engine<S>
where
  S: WarehouseStore,
  S::Error: Into<Error>,
{
  /// Load one fact row. Replay-safe: a row whose business key
  /// `(order_id, line_number)` already exists is skipped, never duplicated.
  pub async fn load_fact(&self, source: &SourceFact) -> Result<LoadOutcome> {
    source.validate()?;

    if let Some(existing) = self
      .store
      .find_fact(&source.order_id, source.line_number)
      .await
      .map_err(Into::into)?
    {
      debug!(
        order_id = %source.order_id,
        line = source.line_number,
        fact_id = existing.fact_id,
        "business key already loaded, skipping"
      );
      return Ok(LoadOutcome::Skipped { fact_id: existing.fact_id });
    }

    // References resolve against the business date, not load time, so
    // historical facts bind to the dimension attributes true at that time.
    let mut refs = Vec::with_capacity(source.refs.len());
    for r in &source.refs {
      let surrogate_key = self
        .resolve(&r.dimension, &r.natural_key, source.business_date)
        .await
        .map_err(|err| match err {
          Error::UnknownKey { dimension, natural_key, as_of } => {
            Error::MissingReference { dimension, natural_key, as_of }
          }
          other => other,
        })?;
      refs.push(ResolvedRef {
        dimension: r.dimension.clone(),
        surrogate_key,
      });
    }

    let measures = derive_measures(
      source.gross_amount,
      source.discount_amount,
      source.cost_amount,
    );

    let record = self
      .store
      .insert_fact(NewFactRecord {
        order_id:        source.order_id.clone(),
        line_number:     source.line_number,
        date_id:         date_id(source.business_date),
        refs,
        quantity:        source.quantity,
        gross_amount:    source.gross_amount,
        discount_amount: source.discount_amount,
        cost_amount:     source.cost_amount,
        measures,
      })
      .await
      .map_err(Into::into)?;

    debug!(
      order_id = %record.order_id,
      line = record.line_number,
      fact_id = record.fact_id,
      "fact loaded"
    );
    Ok(LoadOutcome::Loaded(record))
  }
}
