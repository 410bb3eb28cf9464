//! Surrogate key resolution — natural key plus as-of date to the surrogate
//! key of the version valid at that date.
//!
//! This is what makes Type-2 history meaningful: two facts for the same
//! natural key at different dates may resolve to different surrogate keys
//! if the dimension changed between them.

use chrono::NaiveDate;
use granary_core::{
  Error, Result, dimension::SurrogateKey, store::WarehouseStore,
};

use crate::Engine;

impl<S> Engine<S>
where
  S: WarehouseStore,
  S::Error: Into<Error>,
{
  /// Resolve a natural key at a date to the surrogate key of the version
  /// whose validity interval contains that date. Never silently defaults:
  /// an uncovered date is an [`Error::UnknownKey`].
  pub async fn resolve(
    &self,
    dimension: &str,
    natural_key: &str,
    as_of: NaiveDate,
  ) -> Result<SurrogateKey> {
    match self
      .store
      .version_as_of(dimension, natural_key, as_of)
      .await
      .map_err(Into::into)?
    {
      Some(version) => Ok(version.surrogate_key),
      None => Err(Error::UnknownKey {
        dimension:   dimension.to_owned(),
        natural_key: natural_key.to_owned(),
        as_of,
      }),
    }
  }
}
