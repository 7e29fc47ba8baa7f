//! The `ExperimentStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `ragex-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  dataset::{Dataset, DatasetStats, Query, QueryInput},
  knowledge_base::{Document, DocumentInput, KnowledgeBase, KnowledgeBaseStats},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Offset pagination for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub offset: usize,
  pub limit:  usize,
}

impl Default for Page {
  fn default() -> Self { Self { offset: 0, limit: 100 } }
}

/// Parameters for [`ExperimentStore::list_queries`].
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
  pub dataset_id: Option<i64>,
  /// `Some(false)` for current versions only, `Some(true)` for history only.
  pub obsolete:   Option<bool>,
  pub page:       Page,
}

/// Parameters for [`ExperimentStore::list_all_documents`].
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
  /// Exact match on the document `type`.
  pub doc_type: Option<String>,
  pub page:     Page,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a RAG experiment store backend.
///
/// Query and document versions are append-only: the reconcilers add rows and
/// flip the `obsolete` / `deleted` flags, they never rewrite content.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ExperimentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Datasets ──────────────────────────────────────────────────────────

  /// Return the dataset called `name`, creating it if needed.
  fn ensure_dataset(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Dataset, Self::Error>> + Send + '_;

  /// Bring the dataset called `name` in line with `queries` in one
  /// transaction. Duplicate positions fail before anything is written.
  fn reconcile_dataset(
    &self,
    name: String,
    queries: Vec<QueryInput>,
  ) -> impl Future<Output = Result<DatasetStats, Self::Error>> + Send + '_;

  fn get_dataset(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Dataset>, Self::Error>> + Send + '_;

  fn list_datasets(
    &self,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Dataset>, Self::Error>> + Send + '_;

  // ── Queries ───────────────────────────────────────────────────────────

  /// List query versions ordered by dataset, position, then version.
  /// Ground truths are not loaded.
  fn list_queries(
    &self,
    filter: QueryFilter,
  ) -> impl Future<Output = Result<Vec<Query>, Self::Error>> + Send + '_;

  /// Retrieve one query version together with its ground truths.
  fn get_query(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Query>, Self::Error>> + Send + '_;

  /// Every version stored at a position, oldest first, with ground truths.
  fn query_history(
    &self,
    dataset_id: i64,
    position_id: u32,
  ) -> impl Future<Output = Result<Vec<Query>, Self::Error>> + Send + '_;

  // ── Knowledge bases ───────────────────────────────────────────────────

  /// Return the knowledge base called `name`, creating it if needed. An
  /// existing knowledge base has its `updated_at` stamped.
  fn ensure_knowledge_base(
    &self,
    name: String,
  ) -> impl Future<Output = Result<KnowledgeBase, Self::Error>> + Send + '_;

  /// Bring the knowledge base called `name` in line with `documents` in one
  /// transaction. Active documents missing from the batch are flagged deleted.
  fn reconcile_knowledge_base(
    &self,
    name: String,
    documents: Vec<DocumentInput>,
  ) -> impl Future<Output = Result<KnowledgeBaseStats, Self::Error>> + Send + '_;

  fn get_knowledge_base(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<KnowledgeBase>, Self::Error>> + Send + '_;

  fn list_knowledge_bases(
    &self,
    page: Page,
  ) -> impl Future<Output = Result<Vec<KnowledgeBase>, Self::Error>> + Send + '_;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Documents of a knowledge base ordered by filename, newest version first.
  /// With `active_only`, obsolete and deleted rows are skipped.
  fn list_documents(
    &self,
    knowledge_base_id: i64,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Document versions across every knowledge base, ordered by id.
  fn list_all_documents(
    &self,
    filter: DocumentFilter,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  fn get_document(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// The most recently stored document version carrying `hash`, if any.
  fn find_document_by_hash(
    &self,
    hash: String,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// Every version of `filename`, oldest first.
  fn document_history(
    &self,
    knowledge_base_id: i64,
    filename: String,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;
}
