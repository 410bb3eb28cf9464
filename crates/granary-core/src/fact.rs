//! Fact types and derived-measure arithmetic.
//!
//! Facts are insert-only: the loader creates them and never deletes or
//! edits them. Corrections are modelled as new facts or explicit reversal
//! rows, preserving auditability.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, dimension::SurrogateKey};

// ─── Dimension references ────────────────────────────────────────────────────

/// A reference from a source fact row to a dimension member, by natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRef {
  pub dimension:   String,
  pub natural_key: String,
}

/// A dimension reference resolved to the surrogate key of the version valid
/// at the fact's business date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRef {
  pub dimension:     String,
  pub surrogate_key: SurrogateKey,
}

// ─── Source rows ─────────────────────────────────────────────────────────────

/// One fact row as it arrives from the source feed. The pair
/// `(order_id, line_number)` is the natural business key that makes loading
/// idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFact {
  pub order_id:        String,
  pub line_number:     u32,
  pub business_date:   NaiveDate,
  pub refs:            Vec<DimensionRef>,
  pub quantity:        f64,
  pub gross_amount:    f64,
  #[serde(default)]
  pub discount_amount: f64,
  pub cost_amount:     f64,
}

impl SourceFact {
  /// Business-rule validation of the raw measures. Negative inputs are
  /// rejected before any store access happens.
  pub fn validate(&self) -> Result<()> {
    let checks = [
      ("quantity", self.quantity),
      ("gross_amount", self.gross_amount),
      ("discount_amount", self.discount_amount),
      ("cost_amount", self.cost_amount),
    ];
    for (field, value) in checks {
      if value < 0.0 {
        return Err(Error::InvalidMeasure { field, value });
      }
    }
    Ok(())
  }
}

// ─── Derived measures ────────────────────────────────────────────────────────

/// Monetary measures derived from the raw amounts. `margin_percent` is
/// `None` when the net amount is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measures {
  pub net_amount:     f64,
  pub margin_amount:  f64,
  pub margin_percent: Option<f64>,
}

/// `net = gross − discount`, `margin = net − cost`,
/// `percent = margin / net × 100`.
///
/// Total over all inputs: a zero net amount yields a null percent rather
/// than a division by zero.
pub fn derive_measures(gross: f64, discount: f64, cost: f64) -> Measures {
  let net = gross - discount;
  let margin = net - cost;
  let margin_percent = (net != 0.0).then(|| margin / net * 100.0);
  Measures {
    net_amount: net,
    margin_amount: margin,
    margin_percent,
  }
}

// ─── Persisted facts ─────────────────────────────────────────────────────────

/// A persisted fact row, with every dimension reference resolved to a
/// surrogate key and all derived measures computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRecord {
  pub fact_id:         i64,
  pub order_id:        String,
  pub line_number:     u32,
  pub date_id:         i32,
  pub refs:            Vec<ResolvedRef>,
  pub quantity:        f64,
  pub gross_amount:    f64,
  pub discount_amount: f64,
  pub net_amount:      f64,
  pub cost_amount:     f64,
  pub margin_amount:   f64,
  pub margin_percent:  Option<f64>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// Input to [`crate::store::WarehouseStore::insert_fact`]. The fact id and
/// timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFactRecord {
  pub order_id:        String,
  pub line_number:     u32,
  pub date_id:         i32,
  pub refs:            Vec<ResolvedRef>,
  pub quantity:        f64,
  pub gross_amount:    f64,
  pub discount_amount: f64,
  pub cost_amount:     f64,
  pub measures:        Measures,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn measures_worked_example() {
    // gross 100, discount 10, cost 60 => net 90, margin 30, percent 33.33…
    let m = derive_measures(100.0, 10.0, 60.0);
    assert_eq!(m.net_amount, 90.0);
    assert_eq!(m.margin_amount, 30.0);
    let pct = m.margin_percent.unwrap();
    assert!((pct - 33.333333).abs() < 0.0001);
  }

  #[test]
  fn zero_net_amount_yields_null_percent() {
    let m = derive_measures(10.0, 10.0, 4.0);
    assert_eq!(m.net_amount, 0.0);
    assert_eq!(m.margin_amount, -4.0);
    assert_eq!(m.margin_percent, None);
  }

  fn source(quantity: f64, gross: f64, discount: f64, cost: f64) -> SourceFact {
    SourceFact {
      order_id:        "O1".into(),
      line_number:     1,
      business_date:   NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
      refs:            vec![],
      quantity,
      gross_amount:    gross,
      discount_amount: discount,
      cost_amount:     cost,
    }
  }

  #[test]
  fn negative_quantity_is_invalid() {
    let err = source(-1.0, 100.0, 0.0, 60.0).validate().unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidMeasure { field: "quantity", .. }
    ));
  }

  #[test]
  fn negative_discount_is_invalid() {
    let err = source(1.0, 100.0, -5.0, 60.0).validate().unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidMeasure { field: "discount_amount", .. }
    ));
  }

  #[test]
  fn non_negative_measures_pass() {
    assert!(source(2.0, 100.0, 10.0, 60.0).validate().is_ok());
  }
}
