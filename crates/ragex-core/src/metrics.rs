//! Retrieval metrics over a single ranked result list.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingMetrics {
  pub precision: f64,
  pub ndcg:      f64,
  pub mrr:       f64,
}

impl RankingMetrics {
  /// Compute metrics from relevance flags in rank order (index 0 = top hit).
  ///
  /// Gains are discounted by `1 / (rank + 2)`; the ideal ranking places every
  /// relevant hit first.
  pub fn compute(relevance: &[bool]) -> Result<Self> {
    if relevance.is_empty() {
      return Err(Error::EmptyRanking);
    }

    let total = relevance.len() as f64;
    let relevant = relevance.iter().filter(|r| **r).count();

    let dcg: f64 = relevance
      .iter()
      .enumerate()
      .filter(|(_, r)| **r)
      .map(|(i, _)| discount(i))
      .sum();
    let idcg: f64 = (0..relevant).map(discount).sum();
    let ndcg = if idcg > 0.0 { dcg / idcg } else { 0.0 };

    let mrr = relevance
      .iter()
      .position(|r| *r)
      .map_or(0.0, |i| 1.0 / (i as f64 + 1.0));

    Ok(Self {
      precision: relevant as f64 / total,
      ndcg,
      mrr,
    })
  }
}

fn discount(rank: usize) -> f64 { 1.0 / (rank as f64 + 2.0) }
