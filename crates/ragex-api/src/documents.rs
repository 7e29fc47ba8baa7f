//! Handlers for `/documents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/documents` | Optional `?type&skip&limit`; every knowledge base |
//! | `GET`  | `/documents/:id` | 404 if not found |
//! | `GET`  | `/documents/check-hash/:hash` | `{"exists":bool,"document":…}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ragex_core::{
  knowledge_base::Document,
  store::{DocumentFilter, ExperimentStore},
};
use serde::{Deserialize, Serialize};

use crate::{PageParams, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub doc_type: Option<String>,
  pub skip:     Option<usize>,
  pub limit:    Option<usize>,
}

/// `GET /documents[?type=<type>][&skip=<n>][&limit=<n>]`
pub async fn list<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
  let filter = DocumentFilter {
    doc_type: params.doc_type,
    page:     PageParams {
      skip:  params.skip,
      limit: params.limit,
    }
    .into(),
  };

  let documents = store
    .list_all_documents(filter)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(documents))
}

/// `GET /documents/:id`
pub async fn get_one<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Document>, ApiError> {
  let document = store
    .get_document(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))?;
  Ok(Json(document))
}

#[derive(Debug, Serialize)]
pub struct HashCheck {
  pub exists:   bool,
  pub document: Option<Document>,
}

/// `GET /documents/check-hash/:hash`
pub async fn check_hash<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(hash): Path<String>,
) -> Result<Json<HashCheck>, ApiError> {
  let document = store
    .find_document_by_hash(hash)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(HashCheck {
    exists: document.is_some(),
    document,
  }))
}
