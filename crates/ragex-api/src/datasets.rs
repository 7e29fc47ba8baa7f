//! Handlers for `/datasets` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/datasets` | Optional `?skip&limit` |
//! | `POST` | `/datasets` | Body: `{"dataset_name":"…","queries":[…]}`; `queries` optional |
//! | `GET`  | `/datasets/:id` | 404 if not found |
//! | `GET`  | `/datasets/:id/queries` | Optional `?obsolete=true\|false` |
//! | `GET`  | `/datasets/:id/positions/:position_id/history` | Oldest version first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use ragex_core::{
  dataset::{self, Dataset, DatasetStats, QueryInput},
  reconcile::validate_dataset_batch,
  store::{ExperimentStore, Page, QueryFilter},
};
use serde::{Deserialize, Serialize};

use crate::{PageParams, error::ApiError};

async fn find<S: ExperimentStore>(store: &S, id: i64) -> Result<Dataset, ApiError> {
  store
    .get_dataset(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("dataset {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /datasets[?skip=<n>][&limit=<n>]`
pub async fn list<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<Dataset>>, ApiError> {
  let datasets = store
    .list_datasets(params.into())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(datasets))
}

// ─── Create / reconcile ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub dataset_name: String,
  /// Absent or empty means get-or-create only.
  pub queries:      Option<Vec<QueryInput>>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
  #[serde(flatten)]
  pub dataset: Dataset,
  pub stats:   DatasetStats,
}

/// `POST /datasets`, body: `{"dataset_name":"DS1","queries":[…]}`
pub async fn create<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let queries = body.queries.unwrap_or_default();
  validate_dataset_batch(&body.dataset_name, &queries)?;

  let (dataset, stats) = if queries.is_empty() {
    let dataset = store
      .ensure_dataset(body.dataset_name)
      .await
      .map_err(ApiError::store)?;
    let stats = DatasetStats::new(dataset.id);
    (dataset, stats)
  } else {
    let stats = store
      .reconcile_dataset(body.dataset_name, queries)
      .await
      .map_err(ApiError::store)?;
    (find(store.as_ref(), stats.dataset_id).await?, stats)
  };

  Ok((StatusCode::CREATED, Json(DatasetResponse { dataset, stats })))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /datasets/:id`
pub async fn get_one<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Dataset>, ApiError> {
  Ok(Json(find(store.as_ref(), id).await?))
}

// ─── Queries of a dataset ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct QueriesParams {
  pub obsolete: Option<bool>,
}

/// `GET /datasets/:id/queries[?obsolete=<bool>]`
pub async fn queries<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Query(params): Query<QueriesParams>,
) -> Result<Json<Vec<dataset::Query>>, ApiError> {
  find(store.as_ref(), id).await?;

  let filter = QueryFilter {
    dataset_id: Some(id),
    obsolete:   params.obsolete,
    page:       Page { offset: 0, limit: u32::MAX as usize },
  };
  let queries = store.list_queries(filter).await.map_err(ApiError::store)?;
  Ok(Json(queries))
}

/// `GET /datasets/:id/positions/:position_id/history`
pub async fn history<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path((id, position_id)): Path<(i64, u32)>,
) -> Result<Json<Vec<dataset::Query>>, ApiError> {
  find(store.as_ref(), id).await?;

  let versions = store
    .query_history(id, position_id)
    .await
    .map_err(ApiError::store)?;
  if versions.is_empty() {
    return Err(ApiError::NotFound(format!(
      "position {position_id} not found in dataset {id}"
    )));
  }
  Ok(Json(versions))
}
