//! Knowledge bases and their versioned documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
  pub id:         i64,
  pub name:       String,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// A desired document as supplied in a knowledge-base batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInput {
  pub filename: String,
  #[serde(rename = "type")]
  pub doc_type: String,
  /// Content hash; a change produces a new document version.
  pub hash:     String,
}

impl DocumentInput {
  pub fn new(
    filename: impl Into<String>,
    doc_type: impl Into<String>,
    hash: impl Into<String>,
  ) -> Self {
    Self {
      filename: filename.into(),
      doc_type: doc_type.into(),
      hash:     hash.into(),
    }
  }
}

/// One stored version of a document. Immutable except for the two flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub id:                i64,
  pub knowledge_base_id: i64,
  pub filename:          String,
  pub version:           f64,
  #[serde(rename = "type")]
  pub doc_type:          String,
  pub hash:              String,
  /// Superseded by a newer version.
  pub obsolete:          bool,
  /// Absent from the most recent reconciliation input.
  pub deleted:           bool,
  pub created_at:        DateTime<Utc>,
}

impl Document {
  pub fn is_active(&self) -> bool { !self.obsolete && !self.deleted }
}

/// Outcome of [`crate::store::ExperimentStore::reconcile_knowledge_base`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseStats {
  pub knowledge_base_id:         i64,
  pub documents_added:           u32,
  pub documents_updated:         u32,
  pub documents_marked_obsolete: u32,
  pub documents_marked_deleted:  u32,
}

impl KnowledgeBaseStats {
  pub fn new(knowledge_base_id: i64) -> Self {
    Self { knowledge_base_id, ..Self::default() }
  }

  /// True if anything was added, updated, or deleted.
  pub fn modified(&self) -> bool {
    self.documents_added > 0
      || self.documents_updated > 0
      || self.documents_marked_deleted > 0
  }
}
