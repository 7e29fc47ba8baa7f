//! Datasets and their versioned queries.
//!
//! A query is addressed by `(dataset_id, position_id, version)`. The position
//! is a caller-assigned slot that stays stable across revisions; each content
//! change produces a new version and flags the previous one obsolete.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error,
  ground_truth::{GroundTruth, GroundTruthInput},
};

// ─── Dataset ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
  pub id:            i64,
  pub dataset_name:  String,
  pub data_creation: NaiveDate,
  /// Stamped whenever a reconciliation writes anything.
  pub data_update:   Option<NaiveDate>,
}

// ─── Complexity ──────────────────────────────────────────────────────────────

/// What kind of reasoning a query demands of the retrieval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
  #[serde(rename = "Textual_Description")]
  TextualDescription,
  #[serde(rename = "Image_Analysis")]
  ImageAnalysis,
  #[serde(rename = "Table_Analysis")]
  TableAnalysis,
  Reasoning,
}

impl Complexity {
  /// Wire and storage name; matches the serde representation.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::TextualDescription => "Textual_Description",
      Self::ImageAnalysis => "Image_Analysis",
      Self::TableAnalysis => "Table_Analysis",
      Self::Reasoning => "Reasoning",
    }
  }
}

impl fmt::Display for Complexity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Complexity {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Textual_Description" => Ok(Self::TextualDescription),
      "Image_Analysis" => Ok(Self::ImageAnalysis),
      "Table_Analysis" => Ok(Self::TableAnalysis),
      "Reasoning" => Ok(Self::Reasoning),
      other => Err(Error::UnknownComplexity(other.to_owned())),
    }
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// A desired query as supplied in a dataset batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryInput {
  pub position_id:   u32,
  pub prompt:        String,
  #[serde(default)]
  pub device:        Option<String>,
  #[serde(default)]
  pub customer:      Option<String>,
  pub complexity:    Complexity,
  #[serde(default)]
  pub ground_truths: Vec<GroundTruthInput>,
}

impl QueryInput {
  /// Convenience constructor with no device, customer, or ground truths.
  pub fn new(
    position_id: u32,
    prompt: impl Into<String>,
    complexity: Complexity,
  ) -> Self {
    Self {
      position_id,
      prompt: prompt.into(),
      device: None,
      customer: None,
      complexity,
      ground_truths: Vec::new(),
    }
  }
}

/// One stored version of a query. Immutable except for `obsolete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
  pub id:            i64,
  pub dataset_id:    i64,
  pub position_id:   u32,
  pub version:       u32,
  pub prompt:        String,
  pub device:        Option<String>,
  pub customer:      Option<String>,
  pub complexity:    Complexity,
  pub obsolete:      bool,
  pub created_at:    DateTime<Utc>,
  /// Populated by single-query reads; left empty by list endpoints.
  #[serde(default)]
  pub ground_truths: Vec<GroundTruth>,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Outcome of [`crate::store::ExperimentStore::reconcile_dataset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
  pub dataset_id:              i64,
  pub queries_added:           u32,
  pub queries_updated:         u32,
  pub queries_marked_obsolete: u32,
  /// Ground-truth rows newly inserted; reused rows are not counted.
  pub ground_truths_added:     u32,
}

impl DatasetStats {
  pub fn new(dataset_id: i64) -> Self {
    Self { dataset_id, ..Self::default() }
  }

  /// True if the reconciliation wrote any query version.
  pub fn wrote(&self) -> bool {
    self.queries_added > 0 || self.queries_updated > 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn complexity_wire_names_round_trip_through_serde() {
    let json = r#"["Textual_Description","Image_Analysis","Table_Analysis","Reasoning"]"#;
    let parsed: Vec<Complexity> = serde_json::from_str(json).unwrap();
    let names: Vec<&str> = parsed.iter().map(Complexity::as_str).collect();
    assert_eq!(
      names,
      ["Textual_Description", "Image_Analysis", "Table_Analysis", "Reasoning"]
    );
    assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
  }

  #[test]
  fn unknown_complexity_is_rejected() {
    assert!(serde_json::from_str::<Complexity>(r#""Textual""#).is_err());
    assert!(matches!(
      "Textual".parse::<Complexity>(),
      Err(Error::UnknownComplexity(_))
    ));
  }

  #[test]
  fn query_input_defaults_optional_fields() {
    let q: QueryInput = serde_json::from_str(
      r#"{"position_id":1,"prompt":"How do I reset?","complexity":"Reasoning"}"#,
    )
    .unwrap();
    assert_eq!(q, QueryInput::new(1, "How do I reset?", Complexity::Reasoning));
  }
}
