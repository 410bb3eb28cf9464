//! Dimension version types — the unit of Type-2 history.
//!
//! A dimension member is identified by a stable natural key and carries an
//! append-only sequence of versions. A version is never mutated after
//! creation except for the single close-out (set `valid_to`, clear
//! `is_current`) that happens when a newer version opens.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Surrogate key ───────────────────────────────────────────────────────────

/// Store-assigned identifier for one dimension version. Monotonically
/// assigned, immutable once created. Facts reference versions only through
/// this key.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct SurrogateKey(pub i64);

impl std::fmt::Display for SurrogateKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// A single attribute in a dimension payload.
///
/// `Null` is a first-class value so that comparisons can use SQL
/// `IS DISTINCT FROM` semantics rather than standard tri-state equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
  Null,
  Flag(bool),
  Number(f64),
  Text(String),
}

/// The typed attribute set carried by a dimension version, e.g.
/// `{name, category, brand, standard_cost, list_price}` for a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub BTreeMap<String, AttributeValue>);

impl Payload {
  /// Look up an attribute; an absent key reads as [`AttributeValue::Null`].
  pub fn get(&self, key: &str) -> &AttributeValue {
    self.0.get(key).unwrap_or(&AttributeValue::Null)
  }

  /// Attribute-wise comparison with `IS DISTINCT FROM` semantics: null
  /// against null is *not* distinct, null against any value is.
  pub fn is_distinct_from(&self, other: &Payload) -> bool {
    self
      .0
      .keys()
      .chain(other.0.keys())
      .any(|key| self.get(key) != other.get(key))
  }
}

impl FromIterator<(String, AttributeValue)> for Payload {
  fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(
    iter: I,
  ) -> Self {
    Self(iter.into_iter().collect())
  }
}

// ─── Versions ────────────────────────────────────────────────────────────────

/// One row of Type-2 history for a `(dimension, natural_key)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionVersion {
  pub surrogate_key: SurrogateKey,
  pub dimension:     String,
  pub natural_key:   String,
  pub payload:       Payload,
  pub is_current:    bool,
  pub valid_from:    NaiveDate,
  /// `None` means the version is still open ("valid until further notice").
  pub valid_to:      Option<NaiveDate>,
}

impl DimensionVersion {
  /// Whether this version's validity interval contains `as_of`.
  pub fn valid_at(&self, as_of: NaiveDate) -> bool {
    self.valid_from <= as_of && self.valid_to.is_none_or(|to| as_of <= to)
  }
}

/// Input to [`crate::store::WarehouseStore::insert_version`] and
/// [`crate::store::WarehouseStore::transition_version`]. The surrogate key
/// is always assigned by the store; new versions always open current and
/// open-ended.
#[derive(Debug, Clone)]
pub struct NewVersion {
  pub dimension:   String,
  pub natural_key: String,
  pub payload:     Payload,
  pub valid_from:  NaiveDate,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
