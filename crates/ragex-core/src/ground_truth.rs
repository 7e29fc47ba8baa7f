//! Ground truths: the documents (and optional sections) a query is expected
//! to retrieve.
//!
//! Ground truths and their hierarchical metadata are content-addressed: the
//! store never mutates a row, it only reuses an identical one or inserts a
//! new one. See [`crate::signature`] for the canonical content tuple.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  Error,
  signature::{GroundTruthKey, MetadataKey},
};

// ─── Confidence ──────────────────────────────────────────────────────────────

/// How confident the annotator is that the ground truth answers the query.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Confidence {
  Low,
  Medium,
  High,
}

impl Confidence {
  /// Wire and storage name; matches the serde representation.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Low => "Low",
      Self::Medium => "Medium",
      Self::High => "High",
    }
  }
}

impl fmt::Display for Confidence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Confidence {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Low" => Ok(Self::Low),
      "Medium" => Ok(Self::Medium),
      "High" => Ok(Self::High),
      other => Err(Error::UnknownConfidence(other.to_owned())),
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Optional structured locator inside a ground-truth document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalMetadataInput {
  #[serde(default)]
  pub id_section:    Option<String>,
  #[serde(default)]
  pub section_title: Option<String>,
  #[serde(default)]
  pub depth:         Option<i64>,
}

impl HierarchicalMetadataInput {
  /// `None` when every field is absent; such metadata carries no content.
  pub fn key(&self) -> Option<MetadataKey> {
    if self.id_section.is_none()
      && self.section_title.is_none()
      && self.depth.is_none()
    {
      return None;
    }
    Some(MetadataKey {
      id_section:    self.id_section.clone(),
      section_title: self.section_title.clone(),
      depth:         self.depth,
    })
  }
}

/// A desired ground truth as supplied in a dataset batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthInput {
  pub filename:              String,
  pub confidence:            Confidence,
  #[serde(default)]
  pub hierarchical_metadata: Option<HierarchicalMetadataInput>,
}

impl GroundTruthInput {
  /// The canonical content tuple for this ground truth.
  pub fn key(&self) -> GroundTruthKey {
    GroundTruthKey {
      filename:   self.filename.clone(),
      confidence: self.confidence,
      metadata:   self
        .hierarchical_metadata
        .as_ref()
        .and_then(HierarchicalMetadataInput::key),
    }
  }
}

// ─── Stored rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalMetadata {
  pub id:            i64,
  pub id_section:    Option<String>,
  pub section_title: Option<String>,
  pub depth:         Option<i64>,
}

/// A stored ground truth. Shared by every query version that references
/// identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
  pub id:                    i64,
  pub filename:              String,
  pub confidence:            Confidence,
  pub hierarchical_metadata: Option<HierarchicalMetadata>,
}
