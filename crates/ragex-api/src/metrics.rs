//! Handler for `POST /metrics/compute`.

use axum::Json;
use ragex_core::metrics::RankingMetrics;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ComputeBody {
  /// Relevance flags in rank order.
  pub relevance: Vec<bool>,
}

/// `POST /metrics/compute`, body: `{"relevance":[true,false,true]}`
pub async fn compute(Json(body): Json<ComputeBody>) -> Result<Json<RankingMetrics>, ApiError> {
  Ok(Json(RankingMetrics::compute(&body.relevance)?))
}
