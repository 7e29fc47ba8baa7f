//! Canonical content tuples and their signatures.
//!
//! Two ground truths are the same iff their `(filename, confidence,
//! id_section, section_title, depth)` tuples are equal. The signature is a
//! SHA-256 digest over a length-prefixed encoding of that tuple, so equal
//! tuples always produce equal signatures and distinct tuples cannot collide
//! through field concatenation.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::ground_truth::{Confidence, GroundTruthInput};

/// Content of a hierarchical-metadata locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetadataKey {
  pub id_section:    Option<String>,
  pub section_title: Option<String>,
  pub depth:         Option<i64>,
}

impl MetadataKey {
  pub fn signature(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"metadata");
    self.feed(&mut hasher);
    hex::encode(hasher.finalize())
  }

  fn feed(&self, hasher: &mut Sha256) {
    feed_opt_str(hasher, self.id_section.as_deref());
    feed_opt_str(hasher, self.section_title.as_deref());
    match self.depth {
      Some(d) => {
        hasher.update([1u8]);
        hasher.update(d.to_le_bytes());
      }
      None => hasher.update([0u8]),
    }
  }
}

/// The canonical tuple identifying a ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroundTruthKey {
  pub filename:   String,
  pub confidence: Confidence,
  pub metadata:   Option<MetadataKey>,
}

impl GroundTruthKey {
  pub fn signature(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"ground_truth");
    feed_str(&mut hasher, &self.filename);
    feed_str(&mut hasher, self.confidence.as_str());
    // A missing locator hashes exactly like one whose fields are all absent.
    match &self.metadata {
      Some(m) => m.feed(&mut hasher),
      None => {
        hasher.update([0u8, 0, 0]);
      }
    }
    hex::encode(hasher.finalize())
  }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
  hasher.update((s.len() as u64).to_le_bytes());
  hasher.update(s.as_bytes());
}

fn feed_opt_str(hasher: &mut Sha256, s: Option<&str>) {
  match s {
    Some(s) => {
      hasher.update([1u8]);
      feed_str(hasher, s);
    }
    None => hasher.update([0u8]),
  }
}

/// The distinct ground-truth keys of a batch, in first-seen order.
pub fn distinct_keys(ground_truths: &[GroundTruthInput]) -> Vec<GroundTruthKey> {
  let mut seen = BTreeSet::new();
  ground_truths
    .iter()
    .map(GroundTruthInput::key)
    .filter(|k| seen.insert(k.clone()))
    .collect()
}

/// The set of signatures of a batch; order and repetition are irrelevant.
pub fn signature_set(ground_truths: &[GroundTruthInput]) -> BTreeSet<String> {
  ground_truths.iter().map(|gt| gt.key().signature()).collect()
}
