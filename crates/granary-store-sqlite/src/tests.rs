//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use granary_core::{
  dimension::{AttributeValue, NewVersion, Payload, SurrogateKey},
  fact::{NewFactRecord, ResolvedRef, derive_measures},
  store::{TransitionOutcome, WarehouseStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn payload(pairs: &[(&str, AttributeValue)]) -> Payload {
  pairs
    .iter()
    .map(|(k, v)| ((*k).to_owned(), v.clone()))
    .collect()
}

fn product(natural_key: &str, cost: f64, valid_from: NaiveDate) -> NewVersion {
  NewVersion {
    dimension:   "product".into(),
    natural_key: natural_key.into(),
    payload:     payload(&[("standard_cost", AttributeValue::Number(cost))]),
    valid_from,
  }
}

async fn open_version(s: &SqliteStore, input: NewVersion) -> SurrogateKey {
  match s.insert_version(input).await.unwrap() {
    TransitionOutcome::Applied(v) => v.surrogate_key,
    TransitionOutcome::Conflict => panic!("unexpected conflict"),
  }
}

// ─── Version writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_first_version() {
  let s = store().await;
  let sk = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;

  let current = s.current_version("product", "P1").await.unwrap().unwrap();
  assert_eq!(current.surrogate_key, sk);
  assert!(current.is_current);
  assert_eq!(current.valid_from, date(2024, 1, 1));
  assert_eq!(current.valid_to, None);
}

#[tokio::test]
async fn insert_second_open_version_conflicts() {
  let s = store().await;
  open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;

  let outcome = s
    .insert_version(product("P1", 12.0, date(2024, 2, 1)))
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Conflict));

  // The losing writer changed nothing.
  let history = s.versions("product", "P1").await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn transition_closes_and_opens_atomically() {
  let s = store().await;
  let v1 = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;

  let outcome = s
    .transition_version(v1, product("P1", 12.0, date(2024, 3, 1)))
    .await
    .unwrap();
  let v2 = match outcome {
    TransitionOutcome::Applied(v) => v,
    TransitionOutcome::Conflict => panic!("expected applied"),
  };
  assert_ne!(v2.surrogate_key, v1);

  let history = s.versions("product", "P1").await.unwrap();
  assert_eq!(history.len(), 2);

  // Closed version: concrete valid_to, one day before the new valid_from.
  assert_eq!(history[0].surrogate_key, v1);
  assert!(!history[0].is_current);
  assert_eq!(history[0].valid_to, Some(date(2024, 2, 29)));

  // Open version: current, open-ended.
  assert_eq!(history[1].surrogate_key, v2.surrogate_key);
  assert!(history[1].is_current);
  assert_eq!(history[1].valid_from, date(2024, 3, 1));
  assert_eq!(history[1].valid_to, None);
}

#[tokio::test]
async fn transition_on_stale_version_conflicts() {
  let s = store().await;
  let v1 = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;

  // First transition wins.
  let outcome = s
    .transition_version(v1, product("P1", 12.0, date(2024, 3, 1)))
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Applied(_)));

  // Second transition still naming v1 must be detected, not applied.
  let outcome = s
    .transition_version(v1, product("P1", 14.0, date(2024, 4, 1)))
    .await
    .unwrap();
  assert!(matches!(outcome, TransitionOutcome::Conflict));

  // The conflicting write left no trace.
  let history = s.versions("product", "P1").await.unwrap();
  assert_eq!(history.len(), 2);
  let current: Vec<_> = history.iter().filter(|v| v.is_current).collect();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].valid_from, date(2024, 3, 1));
}

#[tokio::test]
async fn surrogate_keys_are_monotonic() {
  let s = store().await;
  let a = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;
  let b = open_version(&s, product("P2", 20.0, date(2024, 1, 1))).await;
  let outcome = s
    .transition_version(a, product("P1", 11.0, date(2024, 2, 1)))
    .await
    .unwrap();
  let c = match outcome {
    TransitionOutcome::Applied(v) => v.surrogate_key,
    TransitionOutcome::Conflict => panic!("expected applied"),
  };
  assert!(a < b && b < c);
}

// ─── Version reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn version_as_of_resolves_point_in_time() {
  let s = store().await;
  let v1 = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;
  s.transition_version(v1, product("P1", 12.0, date(2024, 3, 1)))
    .await
    .unwrap();

  // A date inside the closed interval resolves to the old version, even
  // though the dimension has since changed.
  let old = s
    .version_as_of("product", "P1", date(2024, 2, 10))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(old.surrogate_key, v1);

  // Boundary days.
  let first = s
    .version_as_of("product", "P1", date(2024, 1, 1))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(first.surrogate_key, v1);
  let last = s
    .version_as_of("product", "P1", date(2024, 2, 29))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(last.surrogate_key, v1);

  // After the transition the open version answers.
  let new = s
    .version_as_of("product", "P1", date(2024, 4, 1))
    .await
    .unwrap()
    .unwrap();
  assert_ne!(new.surrogate_key, v1);
  assert!(new.is_current);
}

#[tokio::test]
async fn version_as_of_before_first_version_is_none() {
  let s = store().await;
  open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;

  let before = s
    .version_as_of("product", "P1", date(2023, 12, 31))
    .await
    .unwrap();
  assert!(before.is_none());
}

#[tokio::test]
async fn payload_round_trips_with_nulls() {
  let s = store().await;
  open_version(
    &s,
    NewVersion {
      dimension:   "product".into(),
      natural_key: "P1".into(),
      payload:     payload(&[
        ("name", AttributeValue::Text("Widget".into())),
        ("category", AttributeValue::Null),
        ("active", AttributeValue::Flag(true)),
        ("standard_cost", AttributeValue::Number(10.5)),
      ]),
      valid_from:  date(2024, 1, 1),
    },
  )
  .await;

  let current = s.current_version("product", "P1").await.unwrap().unwrap();
  assert_eq!(
    *current.payload.get("name"),
    AttributeValue::Text("Widget".into())
  );
  assert_eq!(*current.payload.get("category"), AttributeValue::Null);
  assert_eq!(*current.payload.get("active"), AttributeValue::Flag(true));
  assert_eq!(
    *current.payload.get("standard_cost"),
    AttributeValue::Number(10.5)
  );
}

#[tokio::test]
async fn dimensions_are_namespaced() {
  let s = store().await;
  open_version(&s, product("K1", 10.0, date(2024, 1, 1))).await;

  // Same natural key under another dimension is a separate timeline.
  let customer = s.current_version("customer", "K1").await.unwrap();
  assert!(customer.is_none());
}

// ─── Facts ───────────────────────────────────────────────────────────────────

fn fact_input(order_id: &str, line: u32, sk: SurrogateKey) -> NewFactRecord {
  NewFactRecord {
    order_id:        order_id.into(),
    line_number:     line,
    date_id:         2024_02_10,
    refs:            vec![ResolvedRef {
      dimension:     "product".into(),
      surrogate_key: sk,
    }],
    quantity:        2.0,
    gross_amount:    100.0,
    discount_amount: 10.0,
    cost_amount:     60.0,
    measures:        derive_measures(100.0, 10.0, 60.0),
  }
}

#[tokio::test]
async fn insert_and_find_fact() {
  let s = store().await;
  let sk = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;
  s.ensure_calendar(date(2024, 2, 1), date(2024, 2, 29))
    .await
    .unwrap();

  let fact = s.insert_fact(fact_input("O1", 1, sk)).await.unwrap();
  assert_eq!(fact.net_amount, 90.0);
  assert_eq!(fact.margin_amount, 30.0);

  let found = s.find_fact("O1", 1).await.unwrap().unwrap();
  assert_eq!(found.fact_id, fact.fact_id);
  assert_eq!(found.date_id, 2024_02_10);
  assert_eq!(found.refs.len(), 1);
  assert_eq!(found.refs[0].surrogate_key, sk);
  let pct = found.margin_percent.unwrap();
  assert!((pct - 33.333333).abs() < 0.0001);
}

#[tokio::test]
async fn find_fact_missing_returns_none() {
  let s = store().await;
  let found = s.find_fact("O1", 1).await.unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn insert_fact_without_calendar_row_fails() {
  let s = store().await;
  let sk = open_version(&s, product("P1", 10.0, date(2024, 1, 1))).await;

  let err = s.insert_fact(fact_input("O1", 1, sk)).await.unwrap_err();
  assert!(matches!(err, crate::Error::CalendarGap(2024_02_10)));

  // The failed insert left nothing behind.
  assert!(s.find_fact("O1", 1).await.unwrap().is_none());
}

// ─── Calendar ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_calendar_is_idempotent() {
  let s = store().await;

  let first = s
    .ensure_calendar(date(2024, 2, 1), date(2024, 3, 31))
    .await
    .unwrap();
  assert_eq!(first, 29 + 31); // leap February plus March

  let second = s
    .ensure_calendar(date(2024, 2, 1), date(2024, 3, 31))
    .await
    .unwrap();
  assert_eq!(second, 0);

  // Overlapping extension only fills the uncovered tail.
  let third = s
    .ensure_calendar(date(2024, 3, 15), date(2024, 4, 2))
    .await
    .unwrap();
  assert_eq!(third, 2);
}
