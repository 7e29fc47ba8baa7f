//! Transactional reconcilers.
//!
//! Each entry point opens one transaction on the connection, reads the current
//! state, applies the decisions from [`ragex_core::reconcile`], and commits.
//! Any error drops the transaction, which rolls every write back.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ragex_core::{
  dataset::{DatasetStats, QueryInput},
  ground_truth::GroundTruthInput,
  knowledge_base::{Document, DocumentInput, KnowledgeBaseStats},
  reconcile::{
    DocumentAction, Incumbent, QueryAction, missing_documents, plan_document,
    plan_query,
  },
  signature::{MetadataKey, distinct_keys},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::debug;

use crate::{
  Result,
  encode::{RawDocument, decode_complexity, encode_date, encode_dt},
};

// ─── Datasets ────────────────────────────────────────────────────────────────

/// Reconcile the dataset called `name` against `queries`.
///
/// The batch must already have passed
/// [`ragex_core::reconcile::validate_dataset_batch`].
pub fn dataset(
  conn: &mut Connection,
  name: &str,
  queries: &[QueryInput],
  now: DateTime<Utc>,
) -> Result<DatasetStats> {
  let tx = conn.transaction()?;

  let (dataset_id, _) = get_or_create_dataset(&tx, name, now)?;
  let mut stats = DatasetStats::new(dataset_id);

  for desired in queries {
    let incumbent = load_incumbent(&tx, dataset_id, desired.position_id)?;

    match plan_query(incumbent.as_ref(), desired) {
      QueryAction::Create => {
        let query_id = insert_query(&tx, dataset_id, desired, 1, now)?;
        stats.ground_truths_added +=
          attach_ground_truths(&tx, query_id, &desired.ground_truths)?;
        stats.queries_added += 1;
        debug!(position_id = desired.position_id, "query added");
      }
      QueryAction::Supersede {
        incumbent_id,
        next_version,
      } => {
        // Flag first: the partial unique index allows one current version.
        tx.execute(
          "UPDATE queries SET obsolete = 1 WHERE id = ?1",
          params![incumbent_id],
        )?;
        stats.queries_marked_obsolete += 1;

        let query_id = insert_query(&tx, dataset_id, desired, next_version, now)?;
        stats.ground_truths_added +=
          attach_ground_truths(&tx, query_id, &desired.ground_truths)?;
        stats.queries_updated += 1;
        debug!(
          position_id = desired.position_id,
          version = next_version,
          "query superseded"
        );
      }
      QueryAction::Unchanged => {}
    }
  }

  if stats.wrote() {
    tx.execute(
      "UPDATE datasets SET data_update = ?1 WHERE id = ?2",
      params![encode_date(now.date_naive()), dataset_id],
    )?;
  }

  tx.commit()?;
  Ok(stats)
}

/// Return `(id, created)` for the dataset called `name`.
pub fn get_or_create_dataset(
  conn: &Connection,
  name: &str,
  now: DateTime<Utc>,
) -> Result<(i64, bool)> {
  let existing: Option<i64> = conn
    .query_row(
      "SELECT id FROM datasets WHERE dataset_name = ?1",
      params![name],
      |r| r.get(0),
    )
    .optional()?;

  if let Some(id) = existing {
    return Ok((id, false));
  }

  conn.execute(
    "INSERT INTO datasets (dataset_name, data_creation, data_update)
     VALUES (?1, ?2, NULL)",
    params![name, encode_date(now.date_naive())],
  )?;
  Ok((conn.last_insert_rowid(), true))
}

/// The highest version stored at a position, with its ground-truth
/// signatures.
fn load_incumbent(
  conn: &Connection,
  dataset_id: i64,
  position_id: u32,
) -> Result<Option<Incumbent>> {
  let row = conn
    .query_row(
      "SELECT id, version, prompt, device, customer, complexity
       FROM queries
       WHERE dataset_id = ?1 AND position_id = ?2
       ORDER BY version DESC
       LIMIT 1",
      params![dataset_id, position_id],
      |r| {
        Ok((
          r.get::<_, i64>(0)?,
          r.get::<_, u32>(1)?,
          r.get::<_, String>(2)?,
          r.get::<_, Option<String>>(3)?,
          r.get::<_, Option<String>>(4)?,
          r.get::<_, String>(5)?,
        ))
      },
    )
    .optional()?;

  let Some((query_id, version, prompt, device, customer, complexity)) = row
  else {
    return Ok(None);
  };

  let mut stmt = conn.prepare(
    "SELECT g.signature
     FROM query_ground_truths qg
     JOIN ground_truths g ON g.id = qg.ground_truth_id
     WHERE qg.query_id = ?1",
  )?;
  let ground_truth_signatures = stmt
    .query_map(params![query_id], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<BTreeSet<_>>>()?;

  Ok(Some(Incumbent {
    query_id,
    version,
    prompt,
    device,
    customer,
    complexity: decode_complexity(&complexity)?,
    ground_truth_signatures,
  }))
}

fn insert_query(
  conn: &Connection,
  dataset_id: i64,
  q: &QueryInput,
  version: u32,
  now: DateTime<Utc>,
) -> Result<i64> {
  conn.execute(
    "INSERT INTO queries (
       dataset_id, position_id, version, prompt, device, customer,
       complexity, obsolete, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
    params![
      dataset_id,
      q.position_id,
      version,
      q.prompt,
      q.device,
      q.customer,
      q.complexity.as_str(),
      encode_dt(now),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Link the distinct ground truths of a batch to `query_id`, creating any
/// content not seen before. Returns the number of ground-truth rows created.
fn attach_ground_truths(
  conn: &Connection,
  query_id: i64,
  ground_truths: &[GroundTruthInput],
) -> Result<u32> {
  let mut created = 0;

  for key in distinct_keys(ground_truths) {
    let signature = key.signature();

    let existing: Option<i64> = conn
      .query_row(
        "SELECT id FROM ground_truths WHERE signature = ?1",
        params![signature],
        |r| r.get(0),
      )
      .optional()?;

    let ground_truth_id = match existing {
      Some(id) => id,
      None => {
        let metadata_id = key
          .metadata
          .as_ref()
          .map(|m| resolve_metadata(conn, m))
          .transpose()?;
        conn.execute(
          "INSERT INTO ground_truths
             (filename, confidence, hierarchical_metadata_id, signature)
           VALUES (?1, ?2, ?3, ?4)",
          params![key.filename, key.confidence.as_str(), metadata_id, signature],
        )?;
        created += 1;
        conn.last_insert_rowid()
      }
    };

    conn.execute(
      "INSERT INTO query_ground_truths (query_id, ground_truth_id) VALUES (?1, ?2)",
      params![query_id, ground_truth_id],
    )?;
  }

  Ok(created)
}

/// Find the metadata row with identical content, or insert it.
fn resolve_metadata(conn: &Connection, key: &MetadataKey) -> Result<i64> {
  let signature = key.signature();

  let existing: Option<i64> = conn
    .query_row(
      "SELECT id FROM hierarchical_metadata WHERE signature = ?1",
      params![signature],
      |r| r.get(0),
    )
    .optional()?;

  if let Some(id) = existing {
    return Ok(id);
  }

  conn.execute(
    "INSERT INTO hierarchical_metadata (id_section, section_title, depth, signature)
     VALUES (?1, ?2, ?3, ?4)",
    params![key.id_section, key.section_title, key.depth, signature],
  )?;
  Ok(conn.last_insert_rowid())
}

// ─── Knowledge bases ─────────────────────────────────────────────────────────

/// Reconcile the knowledge base called `name` against `documents`.
///
/// The batch must already have passed
/// [`ragex_core::reconcile::validate_knowledge_base_batch`].
pub fn knowledge_base(
  conn: &mut Connection,
  name: &str,
  documents: &[DocumentInput],
  now: DateTime<Utc>,
) -> Result<KnowledgeBaseStats> {
  let tx = conn.transaction()?;

  let (kb_id, created) = get_or_create_knowledge_base(&tx, name, now)?;
  let mut stats = KnowledgeBaseStats::new(kb_id);

  for desired in documents {
    let active = active_document(&tx, kb_id, &desired.filename)?;
    let max_version = max_document_version(&tx, kb_id, &desired.filename)?;

    match plan_document(active.as_ref(), max_version, desired) {
      DocumentAction::Create { version } => {
        insert_document(&tx, kb_id, desired, version, now)?;
        stats.documents_added += 1;
        debug!(filename = %desired.filename, version, "document added");
      }
      DocumentAction::Supersede { active_id, version } => {
        tx.execute(
          "UPDATE documents SET obsolete = 1 WHERE id = ?1",
          params![active_id],
        )?;
        stats.documents_marked_obsolete += 1;

        insert_document(&tx, kb_id, desired, version, now)?;
        stats.documents_updated += 1;
        debug!(filename = %desired.filename, version, "document superseded");
      }
      DocumentAction::Unchanged => {}
    }
  }

  // A knowledge base created by this call has nothing to delete.
  if !created {
    let active = active_documents(&tx, kb_id)?;
    for doc in missing_documents(&active, documents) {
      tx.execute(
        "UPDATE documents SET deleted = 1 WHERE id = ?1",
        params![doc.id],
      )?;
      stats.documents_marked_deleted += 1;
      debug!(filename = %doc.filename, version = doc.version, "document marked deleted");
    }
  }

  if stats.modified() {
    touch_knowledge_base(&tx, kb_id, now)?;
  }

  tx.commit()?;
  Ok(stats)
}

/// Return `(id, created)` for the knowledge base called `name`.
pub fn get_or_create_knowledge_base(
  conn: &Connection,
  name: &str,
  now: DateTime<Utc>,
) -> Result<(i64, bool)> {
  let existing: Option<i64> = conn
    .query_row(
      "SELECT id FROM knowledge_bases WHERE name = ?1",
      params![name],
      |r| r.get(0),
    )
    .optional()?;

  if let Some(id) = existing {
    return Ok((id, false));
  }

  conn.execute(
    "INSERT INTO knowledge_bases (name, created_at, updated_at) VALUES (?1, ?2, NULL)",
    params![name, encode_dt(now)],
  )?;
  Ok((conn.last_insert_rowid(), true))
}

pub fn touch_knowledge_base(
  conn: &Connection,
  kb_id: i64,
  now: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "UPDATE knowledge_bases SET updated_at = ?1 WHERE id = ?2",
    params![encode_dt(now), kb_id],
  )?;
  Ok(())
}

fn active_document(
  conn: &Connection,
  kb_id: i64,
  filename: &str,
) -> Result<Option<Document>> {
  let sql = format!(
    "SELECT {} FROM documents
     WHERE knowledge_base_id = ?1 AND filename = ?2
       AND obsolete = 0 AND deleted = 0
     ORDER BY version DESC
     LIMIT 1",
    RawDocument::COLUMNS
  );
  conn
    .query_row(&sql, params![kb_id, filename], RawDocument::from_row)
    .optional()?
    .map(RawDocument::into_document)
    .transpose()
}

fn active_documents(conn: &Connection, kb_id: i64) -> Result<Vec<Document>> {
  let sql = format!(
    "SELECT {} FROM documents
     WHERE knowledge_base_id = ?1 AND obsolete = 0 AND deleted = 0
     ORDER BY filename",
    RawDocument::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![kb_id], RawDocument::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawDocument::into_document).collect()
}

/// Highest version ever stored for `filename`, whatever its flags.
fn max_document_version(
  conn: &Connection,
  kb_id: i64,
  filename: &str,
) -> Result<Option<f64>> {
  Ok(conn.query_row(
    "SELECT MAX(version) FROM documents WHERE knowledge_base_id = ?1 AND filename = ?2",
    params![kb_id, filename],
    |r| r.get::<_, Option<f64>>(0),
  )?)
}

fn insert_document(
  conn: &Connection,
  kb_id: i64,
  d: &DocumentInput,
  version: f64,
  now: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "INSERT INTO documents (
       knowledge_base_id, filename, version, type, hash,
       obsolete, deleted, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
    params![kb_id, d.filename, version, d.doc_type, d.hash, encode_dt(now)],
  )?;
  Ok(())
}
