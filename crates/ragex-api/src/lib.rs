//! JSON REST API for the RAG experiment store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`ragex_core::store::ExperimentStore`]. TLS, CORS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", ragex_api::api_router(store.clone()))
//! ```

pub mod datasets;
pub mod documents;
pub mod error;
pub mod knowledge_bases;
pub mod metrics;
pub mod queries;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use ragex_core::store::{ExperimentStore, Page};
use serde::Deserialize;

pub use error::ApiError;

/// `?skip&limit` pagination shared by the list endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
  pub skip:  Option<usize>,
  pub limit: Option<usize>,
}

impl From<PageParams> for Page {
  fn from(params: PageParams) -> Self {
    let default = Page::default();
    Page {
      offset: params.skip.unwrap_or(default.offset),
      limit:  params.limit.unwrap_or(default.limit),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ExperimentStore + 'static,
{
  Router::new()
    // Datasets
    .route("/datasets", get(datasets::list::<S>).post(datasets::create::<S>))
    .route("/datasets/{id}", get(datasets::get_one::<S>))
    .route("/datasets/{id}/queries", get(datasets::queries::<S>))
    .route(
      "/datasets/{id}/positions/{position_id}/history",
      get(datasets::history::<S>),
    )
    // Queries
    .route("/queries", get(queries::list::<S>))
    .route("/queries/{id}", get(queries::get_one::<S>))
    // Knowledge bases
    .route(
      "/knowledge-bases",
      get(knowledge_bases::list::<S>).post(knowledge_bases::create::<S>),
    )
    .route("/knowledge-bases/{id}", get(knowledge_bases::get_one::<S>))
    .route(
      "/knowledge-bases/{id}/documents",
      get(knowledge_bases::documents::<S>),
    )
    .route(
      "/knowledge-bases/{id}/documents/history",
      get(knowledge_bases::history::<S>),
    )
    // Documents
    .route("/documents", get(documents::list::<S>))
    .route("/documents/{id}", get(documents::get_one::<S>))
    .route("/documents/check-hash/{hash}", get(documents::check_hash::<S>))
    // Metrics
    .route("/metrics/compute", post(metrics::compute))
    .with_state(store)
}
