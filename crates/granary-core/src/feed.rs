//! Source feed records — the engine's input surface.
//!
//! The feed is a sequence of tagged records. The engine does not care how
//! they were produced (batch extract, change-data-capture stream, manual
//! fixture); it only sees dimension rows and fact rows.

use serde::{Deserialize, Serialize};

use crate::{dimension::Payload, fact::SourceFact};

/// One dimension row from the source feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionRow {
  pub dimension:   String,
  pub natural_key: String,
  pub payload:     Payload,
}

/// A tagged record from the source feed, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum FeedRecord {
  Dimension(DimensionRow),
  Fact(SourceFact),
}

/// A batch of source records, split by kind. Dimension rows always settle
/// before any fact loads, so facts resolve against post-batch dimension
/// state.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
  pub dimensions: Vec<DimensionRow>,
  pub facts:      Vec<SourceFact>,
}

impl SourceBatch {
  pub fn is_empty(&self) -> bool {
    self.dimensions.is_empty() && self.facts.is_empty()
  }
}

impl FromIterator<FeedRecord> for SourceBatch {
  fn from_iter<I: IntoIterator<Item = FeedRecord>>(iter: I) -> Self {
    let mut batch = Self::default();
    for record in iter {
      match record {
        FeedRecord::Dimension(row) => batch.dimensions.push(row),
        FeedRecord::Fact(row) => batch.facts.push(row),
      }
    }
    batch
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn feed_record_json_shape() {
    let line = r#"{"record":"dimension","dimension":"product","natural_key":"P1","payload":{"name":"Widget","category":null,"standard_cost":10.0}}"#;
    let record: FeedRecord = serde_json::from_str(line).unwrap();
    match record {
      FeedRecord::Dimension(row) => {
        assert_eq!(row.dimension, "product");
        assert_eq!(row.natural_key, "P1");
        assert_eq!(row.payload.0.len(), 3);
      }
      FeedRecord::Fact(_) => panic!("expected a dimension record"),
    }
  }

  #[test]
  fn fact_record_json_shape() {
    let line = r#"{"record":"fact","order_id":"O1","line_number":1,"business_date":"2024-02-10","refs":[{"dimension":"product","natural_key":"P1"}],"quantity":2.0,"gross_amount":100.0,"discount_amount":10.0,"cost_amount":60.0}"#;
    let record: FeedRecord = serde_json::from_str(line).unwrap();
    match record {
      FeedRecord::Fact(row) => {
        assert_eq!(row.order_id, "O1");
        assert_eq!(row.refs.len(), 1);
      }
      FeedRecord::Dimension(_) => panic!("expected a fact record"),
    }
  }

  #[test]
  fn batch_splits_by_kind() {
    let records = vec![
      serde_json::from_str::<FeedRecord>(
        r#"{"record":"dimension","dimension":"product","natural_key":"P1","payload":{}}"#,
      )
      .unwrap(),
      serde_json::from_str::<FeedRecord>(
        r#"{"record":"fact","order_id":"O1","line_number":1,"business_date":"2024-02-10","refs":[],"quantity":1.0,"gross_amount":10.0,"cost_amount":4.0}"#,
      )
      .unwrap(),
    ];
    let batch: SourceBatch = records.into_iter().collect();
    assert_eq!(batch.dimensions.len(), 1);
    assert_eq!(batch.facts.len(), 1);
    // discount_amount defaults to zero when the feed omits it.
    assert_eq!(batch.facts[0].discount_amount, 0.0);
  }
}
