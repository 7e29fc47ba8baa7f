//! Reconciliation decisions: incoming batch vs. current state → actions.
//!
//! Everything here is pure. A store backend reads the current state inside its
//! transaction, asks these functions what to do for each record, and performs
//! the resulting writes.

use std::collections::{BTreeSet, HashSet};

use crate::{
  Error, Result,
  dataset::{Complexity, QueryInput},
  knowledge_base::{Document, DocumentInput},
  signature::signature_set,
};

// ─── Validation ──────────────────────────────────────────────────────────────

/// Reject a dataset batch that must not touch the store.
///
/// Fails on an empty name, a zero `position_id`, or any `position_id` that
/// appears more than once.
pub fn validate_dataset_batch(name: &str, queries: &[QueryInput]) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::EmptyName);
  }
  let mut seen = HashSet::with_capacity(queries.len());
  for q in queries {
    if q.position_id == 0 {
      return Err(Error::InvalidPosition);
    }
    if !seen.insert(q.position_id) {
      return Err(Error::DuplicatePosition(q.position_id));
    }
  }
  Ok(())
}

/// Reject a knowledge-base batch that must not touch the store.
///
/// Each filename is reconciled independently, so a filename may appear at
/// most once per batch.
pub fn validate_knowledge_base_batch(
  name: &str,
  documents: &[DocumentInput],
) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::EmptyName);
  }
  let mut seen = HashSet::with_capacity(documents.len());
  for d in documents {
    if d.filename.is_empty() {
      return Err(Error::EmptyFilename);
    }
    if !seen.insert(d.filename.as_str()) {
      return Err(Error::DuplicateFilename(d.filename.clone()));
    }
  }
  Ok(())
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// The latest stored version at a position, reduced to what comparison needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incumbent {
  pub query_id:                i64,
  pub version:                 u32,
  pub prompt:                  String,
  pub device:                  Option<String>,
  pub customer:                Option<String>,
  pub complexity:              Complexity,
  pub ground_truth_signatures: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
  /// Nothing stored at this position yet: insert version 1.
  Create,
  /// Content differs: flag the incumbent obsolete and insert `next_version`.
  Supersede { incumbent_id: i64, next_version: u32 },
  Unchanged,
}

/// True if any attribute or the ground-truth set differs.
pub fn query_changed(incumbent: &Incumbent, desired: &QueryInput) -> bool {
  incumbent.prompt != desired.prompt
    || incumbent.device != desired.device
    || incumbent.customer != desired.customer
    || incumbent.complexity != desired.complexity
    || incumbent.ground_truth_signatures != signature_set(&desired.ground_truths)
}

pub fn plan_query(incumbent: Option<&Incumbent>, desired: &QueryInput) -> QueryAction {
  match incumbent {
    None => QueryAction::Create,
    Some(inc) if query_changed(inc, desired) => QueryAction::Supersede {
      incumbent_id: inc.query_id,
      next_version: inc.version + 1,
    },
    Some(_) => QueryAction::Unchanged,
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DocumentAction {
  /// No active document with this filename: insert at `version`.
  Create { version: f64 },
  /// Hash differs: flag `active_id` obsolete and insert at `version`.
  Supersede { active_id: i64, version: f64 },
  Unchanged,
}

/// Decide what to do with one incoming document.
///
/// `max_version` is the highest version ever stored for the filename,
/// including obsolete and deleted rows, so version numbers are never reused.
pub fn plan_document(
  active: Option<&Document>,
  max_version: Option<f64>,
  desired: &DocumentInput,
) -> DocumentAction {
  let next = |floor: f64| max_version.map_or(floor, |m| m.max(floor)) + 1.0;
  match active {
    None => DocumentAction::Create { version: next(0.0) },
    Some(doc) if doc.hash != desired.hash => DocumentAction::Supersede {
      active_id: doc.id,
      version:   next(doc.version),
    },
    Some(_) => DocumentAction::Unchanged,
  }
}

/// Active documents whose filename is absent from the batch.
pub fn missing_documents<'a>(
  active: &'a [Document],
  input: &[DocumentInput],
) -> Vec<&'a Document> {
  let wanted: HashSet<&str> = input.iter().map(|d| d.filename.as_str()).collect();
  active
    .iter()
    .filter(|doc| doc.is_active() && !wanted.contains(doc.filename.as_str()))
    .collect()
}
