//! Handlers for `/knowledge-bases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/knowledge-bases` | Optional `?skip&limit` |
//! | `POST` | `/knowledge-bases` | Body: `{"name":"…","documents":[…]}`; absent or empty `documents` only gets or creates |
//! | `GET`  | `/knowledge-bases/:id` | 404 if not found |
//! | `GET`  | `/knowledge-bases/:id/documents` | `?not_obsolete=false` includes history |
//! | `GET`  | `/knowledge-bases/:id/documents/history` | Requires `?filename=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use ragex_core::{
  knowledge_base::{Document, DocumentInput, KnowledgeBase, KnowledgeBaseStats},
  reconcile::validate_knowledge_base_batch,
  store::ExperimentStore,
};
use serde::{Deserialize, Serialize};

use crate::{PageParams, error::ApiError};

async fn find<S: ExperimentStore>(store: &S, id: i64) -> Result<KnowledgeBase, ApiError> {
  store
    .get_knowledge_base(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("knowledge base {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /knowledge-bases[?skip=<n>][&limit=<n>]`
pub async fn list<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<KnowledgeBase>>, ApiError> {
  let kbs = store
    .list_knowledge_bases(params.into())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(kbs))
}

// ─── Create / reconcile ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:      String,
  /// Absent or empty means get-or-create only.
  pub documents: Option<Vec<DocumentInput>>,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeBaseResponse {
  #[serde(flatten)]
  pub knowledge_base: KnowledgeBase,
  pub stats:          KnowledgeBaseStats,
}

/// `POST /knowledge-bases`, body: `{"name":"KB1","documents":[…]}`
pub async fn create<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let documents = body.documents.unwrap_or_default();
  validate_knowledge_base_batch(&body.name, &documents)?;

  let (knowledge_base, stats) = if documents.is_empty() {
    let kb = store
      .ensure_knowledge_base(body.name)
      .await
      .map_err(ApiError::store)?;
    let stats = KnowledgeBaseStats::new(kb.id);
    (kb, stats)
  } else {
    let stats = store
      .reconcile_knowledge_base(body.name, documents)
      .await
      .map_err(ApiError::store)?;
    (find(store.as_ref(), stats.knowledge_base_id).await?, stats)
  };

  Ok((
    StatusCode::CREATED,
    Json(KnowledgeBaseResponse { knowledge_base, stats }),
  ))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /knowledge-bases/:id`
pub async fn get_one<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<KnowledgeBase>, ApiError> {
  Ok(Json(find(store.as_ref(), id).await?))
}

// ─── Documents ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DocumentsParams {
  #[serde(default = "default_not_obsolete")]
  pub not_obsolete: bool,
}

fn default_not_obsolete() -> bool { true }

/// `GET /knowledge-bases/:id/documents[?not_obsolete=<bool>]`
pub async fn documents<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Query(params): Query<DocumentsParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
  find(store.as_ref(), id).await?;

  let docs = store
    .list_documents(id, params.not_obsolete)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(docs))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub filename: String,
}

/// `GET /knowledge-bases/:id/documents/history?filename=<name>`
pub async fn history<S: ExperimentStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
  find(store.as_ref(), id).await?;

  let versions = store
    .document_history(id, params.filename)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(versions))
}
