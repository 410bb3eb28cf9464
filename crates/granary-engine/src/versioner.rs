//! The dimension versioner — settles one source dimension row into the
//! Type-2 version log.

use chrono::NaiveDate;
use granary_core::{
  Error, Result,
  detect::{ChangeDecision, detect},
  dimension::{NewVersion, SurrogateKey},
  feed::DimensionRow,
  store::{TransitionOutcome, WarehouseStore},
};
use tracing::{debug, warn};

use crate::Engine;

/// What the versioner did for one dimension row.
#[derive(Debug, Clone, Copy)]
pub struct VersionOutcome {
  /// The open version's surrogate key after settlement.
  pub surrogate_key: SurrogateKey,
  pub decision:      ChangeDecision,
}

impl<S> Engine<S>
where
  S: WarehouseStore,
  S::Error: Into<Error>,
{
  /// Settle one dimension row: run change detection against the current
  /// version, then create, transition, or no-op.
  ///
  /// A concurrent writer racing us on the same natural key is detected by
  /// the store (the write comes back as a conflict, nothing committed) and
  /// the whole decision is re-run against the post-conflict state, a
  /// bounded number of times.
  pub async fn apply_dimension(
    &self,
    row: &DimensionRow,
    effective_date: NaiveDate,
  ) -> Result<VersionOutcome> {
    let mut attempts = 0u32;
    loop {
      let current = self
        .store
        .current_version(&row.dimension, &row.natural_key)
        .await
        .map_err(Into::into)?;
      let decision = detect(current.as_ref().map(|v| &v.payload), &row.payload);

      let open = NewVersion {
        dimension:   row.dimension.clone(),
        natural_key: row.natural_key.clone(),
        payload:     row.payload.clone(),
        valid_from:  effective_date,
      };

      let written = match (&current, decision) {
        (Some(cur), ChangeDecision::NoChange) => {
          debug!(
            dimension = %row.dimension,
            natural_key = %row.natural_key,
            surrogate_key = %cur.surrogate_key,
            "no change"
          );
          return Ok(VersionOutcome {
            surrogate_key: cur.surrogate_key,
            decision,
          });
        }
        (None, _) => {
          self.store.insert_version(open).await.map_err(Into::into)?
        }
        (Some(cur), _) => {
          // Transitions must commit in increasing valid_from order.
          // Backfill of earlier effective dates is a pending product
          // decision; reject rather than guess.
          if effective_date <= cur.valid_from {
            return Err(Error::OutOfOrderEffectiveDate {
              dimension:   row.dimension.clone(),
              natural_key: row.natural_key.clone(),
              effective:   effective_date,
              valid_from:  cur.valid_from,
            });
          }
          self
            .store
            .transition_version(cur.surrogate_key, open)
            .await
            .map_err(Into::into)?
        }
      };

      match written {
        TransitionOutcome::Applied(version) => {
          debug!(
            dimension = %row.dimension,
            natural_key = %row.natural_key,
            surrogate_key = %version.surrogate_key,
            ?decision,
            "version written"
          );
          return Ok(VersionOutcome {
            surrogate_key: version.surrogate_key,
            decision,
          });
        }
        TransitionOutcome::Conflict => {
          attempts += 1;
          if attempts > self.config.max_conflict_retries {
            return Err(Error::VersionConflict {
              dimension:   row.dimension.clone(),
              natural_key: row.natural_key.clone(),
              attempts,
            });
          }
          warn!(
            dimension = %row.dimension,
            natural_key = %row.natural_key,
            attempt = attempts,
            "version conflict, retrying against fresh state"
          );
        }
      }
    }
  }
}
