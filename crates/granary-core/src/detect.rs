//! Change detection — a pure comparison of an incoming source payload
//! against the current dimension version.

use serde::{Deserialize, Serialize};

use crate::dimension::Payload;

/// The outcome of comparing an incoming source record with the current
/// version (if any) for its natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDecision {
  /// No current version exists for the natural key.
  NewEntity,
  /// At least one compared attribute differs.
  Changed,
  /// The payload matches the current version attribute for attribute.
  NoChange,
}

/// Decide whether `incoming` requires a new version.
///
/// Side-effect free. Null-safe: a null attribute compared against a null
/// attribute counts as equal; null against a concrete value counts as
/// different (`IS DISTINCT FROM` semantics).
pub fn detect(current: Option<&Payload>, incoming: &Payload) -> ChangeDecision {
  match current {
    None => ChangeDecision::NewEntity,
    Some(cur) if cur.is_distinct_from(incoming) => ChangeDecision::Changed,
    Some(_) => ChangeDecision::NoChange,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dimension::AttributeValue;

  fn payload(pairs: &[(&str, AttributeValue)]) -> Payload {
    pairs
      .iter()
      .map(|(k, v)| ((*k).to_owned(), v.clone()))
      .collect()
  }

  #[test]
  fn no_current_version_is_new_entity() {
    let incoming = payload(&[("name", AttributeValue::Text("Widget".into()))]);
    assert_eq!(detect(None, &incoming), ChangeDecision::NewEntity);
  }

  #[test]
  fn identical_payload_is_no_change() {
    let p = payload(&[
      ("name", AttributeValue::Text("Widget".into())),
      ("cost", AttributeValue::Number(10.0)),
    ]);
    assert_eq!(detect(Some(&p), &p.clone()), ChangeDecision::NoChange);
  }

  #[test]
  fn differing_attribute_is_changed() {
    let cur = payload(&[("cost", AttributeValue::Number(10.0))]);
    let inc = payload(&[("cost", AttributeValue::Number(12.0))]);
    assert_eq!(detect(Some(&cur), &inc), ChangeDecision::Changed);
  }

  #[test]
  fn null_against_null_is_no_change() {
    let cur = payload(&[("category", AttributeValue::Null)]);
    let inc = payload(&[("category", AttributeValue::Null)]);
    assert_eq!(detect(Some(&cur), &inc), ChangeDecision::NoChange);
  }

  #[test]
  fn null_against_value_is_changed() {
    let cur = payload(&[("category", AttributeValue::Null)]);
    let inc = payload(&[("category", AttributeValue::Text("X".into()))]);
    assert_eq!(detect(Some(&cur), &inc), ChangeDecision::Changed);
  }

  #[test]
  fn value_dropped_to_null_is_changed() {
    let cur = payload(&[("category", AttributeValue::Text("X".into()))]);
    let inc = payload(&[("category", AttributeValue::Null)]);
    assert_eq!(detect(Some(&cur), &inc), ChangeDecision::Changed);
  }
}
