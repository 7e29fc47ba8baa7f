//! Handlers for `/queries` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/queries` | Optional `?dataset_id&obsolete&skip&limit` |
//! | `GET`  | `/queries/:id` | Includes ground truths; 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ragex_core::{
  dataset,
  store::{ExperimentStore, Page, QueryFilter},
};
use serde::Deserialize;

use crate::{PageParams, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub dataset_id: Option<i64>,
  pub obsolete:   Option<bool>,
  pub skip:       Option<usize>,
  pub limit:      Option<usize>,
}

/// `GET /queries[?dataset_id=<id>][&obsolete=<bool>][&skip=<n>][&limit=<n>]`
pub async fn list<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<dataset::Query>>, ApiError> {
  let page: Page = PageParams {
    skip:  params.skip,
    limit: params.limit,
  }
  .into();
  let filter = QueryFilter {
    dataset_id: params.dataset_id,
    obsolete: params.obsolete,
    page,
  };

  let queries = store.list_queries(filter).await.map_err(ApiError::store)?;
  Ok(Json(queries))
}

/// `GET /queries/:id`
pub async fn get_one<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<dataset::Query>, ApiError> {
  let query = store
    .get_query(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("query {id} not found")))?;
  Ok(Json(query))
}
