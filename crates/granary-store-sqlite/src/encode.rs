//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Validity dates are stored as ISO 8601 `YYYY-MM-DD` strings, which order
//! lexicographically the same way they order temporally, so SQL range
//! predicates over them are correct. Timestamps are RFC 3339. Payloads are
//! compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use granary_core::{
  dimension::{DimensionVersion, Payload, SurrogateKey},
  fact::{FactRecord, ResolvedRef},
};

use crate::{Error, Result};

// ─── Dates ───────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Payload ─────────────────────────────────────────────────────────────────

pub fn encode_payload(p: &Payload) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_payload(s: &str) -> Result<Payload> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns read directly from a `dim_versions` row.
pub struct RawVersion {
  pub surrogate_key: i64,
  pub dimension:     String,
  pub natural_key:   String,
  pub payload:       String,
  pub is_current:    bool,
  pub valid_from:    String,
  pub valid_to:      Option<String>,
}

impl RawVersion {
  pub fn into_version(self) -> Result<DimensionVersion> {
    Ok(DimensionVersion {
      surrogate_key: SurrogateKey(self.surrogate_key),
      dimension:     self.dimension,
      natural_key:   self.natural_key,
      payload:       decode_payload(&self.payload)?,
      is_current:    self.is_current,
      valid_from:    decode_date(&self.valid_from)?,
      valid_to:      self.valid_to.as_deref().map(decode_date).transpose()?,
    })
  }
}

/// Raw columns read directly from a `facts` row; refs are read separately
/// from `fact_refs`.
pub struct RawFact {
  pub fact_id:         i64,
  pub order_id:        String,
  pub line_number:     u32,
  pub date_id:         i32,
  pub quantity:        f64,
  pub gross_amount:    f64,
  pub discount_amount: f64,
  pub net_amount:      f64,
  pub cost_amount:     f64,
  pub margin_amount:   f64,
  pub margin_percent:  Option<f64>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawFact {
  pub fn into_fact(self, refs: Vec<ResolvedRef>) -> Result<FactRecord> {
    Ok(FactRecord {
      fact_id:         self.fact_id,
      order_id:        self.order_id,
      line_number:     self.line_number,
      date_id:         self.date_id,
      refs,
      quantity:        self.quantity,
      gross_amount:    self.gross_amount,
      discount_amount: self.discount_amount,
      net_amount:      self.net_amount,
      cost_amount:     self.cost_amount,
      margin_amount:   self.margin_amount,
      margin_percent:  self.margin_percent,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}
