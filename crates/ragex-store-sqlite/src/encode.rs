//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. Enums are stored under their wire names.

use chrono::{DateTime, NaiveDate, Utc};
use ragex_core::{
  dataset::{Complexity, Dataset, Query},
  ground_truth::{Confidence, GroundTruth, HierarchicalMetadata},
  knowledge_base::{Document, KnowledgeBase},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_complexity(s: &str) -> Result<Complexity> { Ok(s.parse()?) }

pub fn decode_confidence(s: &str) -> Result<Confidence> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `datasets` row.
pub struct RawDataset {
  pub id:            i64,
  pub dataset_name:  String,
  pub data_creation: String,
  pub data_update:   Option<String>,
}

impl RawDataset {
  pub const COLUMNS: &'static str = "id, dataset_name, data_creation, data_update";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      dataset_name:  row.get(1)?,
      data_creation: row.get(2)?,
      data_update:   row.get(3)?,
    })
  }

  pub fn into_dataset(self) -> Result<Dataset> {
    Ok(Dataset {
      id:            self.id,
      dataset_name:  self.dataset_name,
      data_creation: decode_date(&self.data_creation)?,
      data_update:   self.data_update.as_deref().map(decode_date).transpose()?,
    })
  }
}

/// Raw values read directly from a `queries` row.
pub struct RawQuery {
  pub id:          i64,
  pub dataset_id:  i64,
  pub position_id: u32,
  pub version:     u32,
  pub prompt:      String,
  pub device:      Option<String>,
  pub customer:    Option<String>,
  pub complexity:  String,
  pub obsolete:    bool,
  pub created_at:  String,
}

impl RawQuery {
  pub const COLUMNS: &'static str = "id, dataset_id, position_id, version, prompt, \
                                     device, customer, complexity, obsolete, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      dataset_id:  row.get(1)?,
      position_id: row.get(2)?,
      version:     row.get(3)?,
      prompt:      row.get(4)?,
      device:      row.get(5)?,
      customer:    row.get(6)?,
      complexity:  row.get(7)?,
      obsolete:    row.get(8)?,
      created_at:  row.get(9)?,
    })
  }

  pub fn into_query(self, ground_truths: Vec<GroundTruth>) -> Result<Query> {
    Ok(Query {
      id: self.id,
      dataset_id: self.dataset_id,
      position_id: self.position_id,
      version: self.version,
      prompt: self.prompt,
      device: self.device,
      customer: self.customer,
      complexity: decode_complexity(&self.complexity)?,
      obsolete: self.obsolete,
      created_at: decode_dt(&self.created_at)?,
      ground_truths,
    })
  }
}

/// A `ground_truths` row left-joined with its `hierarchical_metadata` row.
pub struct RawGroundTruth {
  pub id:            i64,
  pub filename:      String,
  pub confidence:    String,
  pub metadata_id:   Option<i64>,
  pub id_section:    Option<String>,
  pub section_title: Option<String>,
  pub depth:         Option<i64>,
}

impl RawGroundTruth {
  /// Select list for `ground_truths g LEFT JOIN hierarchical_metadata m`.
  pub const COLUMNS: &'static str =
    "g.id, g.filename, g.confidence, m.id, m.id_section, m.section_title, m.depth";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      filename:      row.get(1)?,
      confidence:    row.get(2)?,
      metadata_id:   row.get(3)?,
      id_section:    row.get(4)?,
      section_title: row.get(5)?,
      depth:         row.get(6)?,
    })
  }

  pub fn into_ground_truth(self) -> Result<GroundTruth> {
    let hierarchical_metadata = self.metadata_id.map(|id| HierarchicalMetadata {
      id,
      id_section: self.id_section,
      section_title: self.section_title,
      depth: self.depth,
    });
    Ok(GroundTruth {
      id: self.id,
      filename: self.filename,
      confidence: decode_confidence(&self.confidence)?,
      hierarchical_metadata,
    })
  }
}

/// Raw values read directly from a `knowledge_bases` row.
pub struct RawKnowledgeBase {
  pub id:         i64,
  pub name:       String,
  pub created_at: String,
  pub updated_at: Option<String>,
}

impl RawKnowledgeBase {
  pub const COLUMNS: &'static str = "id, name, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      created_at: row.get(2)?,
      updated_at: row.get(3)?,
    })
  }

  pub fn into_knowledge_base(self) -> Result<KnowledgeBase> {
    Ok(KnowledgeBase {
      id:         self.id,
      name:       self.name,
      created_at: decode_dt(&self.created_at)?,
      updated_at: self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read directly from a `documents` row.
pub struct RawDocument {
  pub id:                i64,
  pub knowledge_base_id: i64,
  pub filename:          String,
  pub version:           f64,
  pub doc_type:          String,
  pub hash:              String,
  pub obsolete:          bool,
  pub deleted:           bool,
  pub created_at:        String,
}

impl RawDocument {
  pub const COLUMNS: &'static str = "id, knowledge_base_id, filename, version, type, \
                                     hash, obsolete, deleted, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      knowledge_base_id: row.get(1)?,
      filename:          row.get(2)?,
      version:           row.get(3)?,
      doc_type:          row.get(4)?,
      hash:              row.get(5)?,
      obsolete:          row.get(6)?,
      deleted:           row.get(7)?,
      created_at:        row.get(8)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      id:                self.id,
      knowledge_base_id: self.knowledge_base_id,
      filename:          self.filename,
      version:           self.version,
      doc_type:          self.doc_type,
      hash:              self.hash,
      obsolete:          self.obsolete,
      deleted:           self.deleted,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}
