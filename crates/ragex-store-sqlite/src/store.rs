//! [`SqliteStore`], the SQLite implementation of [`ExperimentStore`].

use std::path::Path;

use chrono::Utc;
use ragex_core::{
  dataset::{Dataset, DatasetStats, Query, QueryInput},
  knowledge_base::{Document, DocumentInput, KnowledgeBase, KnowledgeBaseStats},
  reconcile::{validate_dataset_batch, validate_knowledge_base_batch},
  store::{DocumentFilter, ExperimentStore, Page, QueryFilter},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::info;

use crate::{
  Result,
  encode::{RawDataset, RawDocument, RawGroundTruth, RawKnowledgeBase, RawQuery},
  reconcile,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An experiment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `(LIMIT, OFFSET)` bind values; values past `i64::MAX` saturate.
fn page_bounds(page: Page) -> (i64, i64) {
  (
    i64::try_from(page.limit).unwrap_or(i64::MAX),
    i64::try_from(page.offset).unwrap_or(i64::MAX),
  )
}

// ─── Row loaders ─────────────────────────────────────────────────────────────

fn load_ground_truths(
  conn: &Connection,
  query_id: i64,
) -> rusqlite::Result<Vec<RawGroundTruth>> {
  let sql = format!(
    "SELECT {}
     FROM query_ground_truths qg
     JOIN ground_truths g              ON g.id = qg.ground_truth_id
     LEFT JOIN hierarchical_metadata m ON m.id = g.hierarchical_metadata_id
     WHERE qg.query_id = ?1
     ORDER BY g.id",
    RawGroundTruth::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  stmt
    .query_map(params![query_id], RawGroundTruth::from_row)?
    .collect()
}

fn decode_query(raw: RawQuery, gts: Vec<RawGroundTruth>) -> Result<Query> {
  let ground_truths = gts
    .into_iter()
    .map(RawGroundTruth::into_ground_truth)
    .collect::<Result<Vec<_>>>()?;
  raw.into_query(ground_truths)
}

fn select_knowledge_base(
  conn: &Connection,
  id: i64,
) -> rusqlite::Result<Option<RawKnowledgeBase>> {
  let sql = format!(
    "SELECT {} FROM knowledge_bases WHERE id = ?1",
    RawKnowledgeBase::COLUMNS
  );
  conn
    .query_row(&sql, params![id], RawKnowledgeBase::from_row)
    .optional()
}

fn select_dataset(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawDataset>> {
  let sql = format!("SELECT {} FROM datasets WHERE id = ?1", RawDataset::COLUMNS);
  conn
    .query_row(&sql, params![id], RawDataset::from_row)
    .optional()
}

/// Get-or-create a dataset inside its own transaction.
fn ensure_dataset_row(conn: &mut Connection, name: &str) -> Result<RawDataset> {
  let tx = conn.transaction()?;
  let (id, created) = reconcile::get_or_create_dataset(&tx, name, Utc::now())?;
  let raw = select_dataset(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
  tx.commit()?;
  if created {
    info!(dataset = %name, id, "dataset created");
  }
  Ok(raw)
}

/// Get-or-create a knowledge base; an existing one gets `updated_at` stamped.
fn ensure_knowledge_base_row(
  conn: &mut Connection,
  name: &str,
) -> Result<RawKnowledgeBase> {
  let now = Utc::now();
  let tx = conn.transaction()?;
  let (id, created) = reconcile::get_or_create_knowledge_base(&tx, name, now)?;
  if !created {
    reconcile::touch_knowledge_base(&tx, id, now)?;
  }
  let raw =
    select_knowledge_base(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
  tx.commit()?;
  if created {
    info!(knowledge_base = %name, id, "knowledge base created");
  }
  Ok(raw)
}

// ─── ExperimentStore impl ────────────────────────────────────────────────────

impl ExperimentStore for SqliteStore {
  type Error = crate::Error;

  // ── Datasets ──────────────────────────────────────────────────────────────

  async fn ensure_dataset(&self, name: String) -> Result<Dataset> {
    validate_dataset_batch(&name, &[])?;

    let raw = self
      .conn
      .call(move |conn| Ok(ensure_dataset_row(conn, &name)))
      .await??;

    raw.into_dataset()
  }

  async fn reconcile_dataset(
    &self,
    name: String,
    queries: Vec<QueryInput>,
  ) -> Result<DatasetStats> {
    validate_dataset_batch(&name, &queries)?;

    let stats = self
      .conn
      .call(move |conn| {
        Ok(reconcile::dataset(conn, &name, &queries, Utc::now()).map(|stats| {
          info!(
            dataset = %name,
            added = stats.queries_added,
            updated = stats.queries_updated,
            obsolete = stats.queries_marked_obsolete,
            ground_truths = stats.ground_truths_added,
            "dataset reconciled"
          );
          stats
        }))
      })
      .await??;

    Ok(stats)
  }

  async fn get_dataset(&self, id: i64) -> Result<Option<Dataset>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_dataset(conn, id)?))
      .await?;

    raw.map(RawDataset::into_dataset).transpose()
  }

  async fn list_datasets(&self, page: Page) -> Result<Vec<Dataset>> {
    let (limit_val, offset_val) = page_bounds(page);

    let raws: Vec<RawDataset> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM datasets ORDER BY id LIMIT ?1 OFFSET ?2",
          RawDataset::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![limit_val, offset_val], RawDataset::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDataset::into_dataset).collect()
  }

  // ── Queries ───────────────────────────────────────────────────────────────

  async fn list_queries(&self, filter: QueryFilter) -> Result<Vec<Query>> {
    let (limit_val, offset_val) = page_bounds(filter.page);

    let raws: Vec<RawQuery> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM queries
           WHERE (?1 IS NULL OR dataset_id = ?1)
             AND (?2 IS NULL OR obsolete = ?2)
           ORDER BY dataset_id, position_id, version
           LIMIT ?3 OFFSET ?4",
          RawQuery::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            params![filter.dataset_id, filter.obsolete, limit_val, offset_val],
            RawQuery::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|raw| raw.into_query(Vec::new())).collect()
  }

  async fn get_query(&self, id: i64) -> Result<Option<Query>> {
    let found = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM queries WHERE id = ?1", RawQuery::COLUMNS);
        let Some(raw) = conn
          .query_row(&sql, params![id], RawQuery::from_row)
          .optional()?
        else {
          return Ok(None);
        };
        let gts = load_ground_truths(conn, raw.id)?;
        Ok(Some((raw, gts)))
      })
      .await?;

    found.map(|(raw, gts)| decode_query(raw, gts)).transpose()
  }

  async fn query_history(&self, dataset_id: i64, position_id: u32) -> Result<Vec<Query>> {
    let rows = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM queries
           WHERE dataset_id = ?1 AND position_id = ?2
           ORDER BY version",
          RawQuery::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params![dataset_id, position_id], RawQuery::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(raws.len());
        for raw in raws {
          let gts = load_ground_truths(conn, raw.id)?;
          rows.push((raw, gts));
        }
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(raw, gts)| decode_query(raw, gts))
      .collect()
  }

  // ── Knowledge bases ───────────────────────────────────────────────────────

  async fn ensure_knowledge_base(&self, name: String) -> Result<KnowledgeBase> {
    validate_knowledge_base_batch(&name, &[])?;

    let raw = self
      .conn
      .call(move |conn| Ok(ensure_knowledge_base_row(conn, &name)))
      .await??;

    raw.into_knowledge_base()
  }

  async fn reconcile_knowledge_base(
    &self,
    name: String,
    documents: Vec<DocumentInput>,
  ) -> Result<KnowledgeBaseStats> {
    validate_knowledge_base_batch(&name, &documents)?;

    let stats = self
      .conn
      .call(move |conn| {
        Ok(
          reconcile::knowledge_base(conn, &name, &documents, Utc::now()).map(|stats| {
            info!(
              knowledge_base = %name,
              added = stats.documents_added,
              updated = stats.documents_updated,
              obsolete = stats.documents_marked_obsolete,
              deleted = stats.documents_marked_deleted,
              "knowledge base reconciled"
            );
            stats
          }),
        )
      })
      .await??;

    Ok(stats)
  }

  async fn get_knowledge_base(&self, id: i64) -> Result<Option<KnowledgeBase>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_knowledge_base(conn, id)?))
      .await?;

    raw.map(RawKnowledgeBase::into_knowledge_base).transpose()
  }

  async fn list_knowledge_bases(&self, page: Page) -> Result<Vec<KnowledgeBase>> {
    let (limit_val, offset_val) = page_bounds(page);

    let raws: Vec<RawKnowledgeBase> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM knowledge_bases ORDER BY id LIMIT ?1 OFFSET ?2",
          RawKnowledgeBase::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![limit_val, offset_val], RawKnowledgeBase::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawKnowledgeBase::into_knowledge_base)
      .collect()
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn list_documents(
    &self,
    knowledge_base_id: i64,
    active_only: bool,
  ) -> Result<Vec<Document>> {
    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let active_clause = if active_only {
          "AND obsolete = 0 AND deleted = 0"
        } else {
          ""
        };
        let sql = format!(
          "SELECT {} FROM documents
           WHERE knowledge_base_id = ?1 {active_clause}
           ORDER BY filename, version DESC",
          RawDocument::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![knowledge_base_id], RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn list_all_documents(&self, filter: DocumentFilter) -> Result<Vec<Document>> {
    let (limit_val, offset_val) = page_bounds(filter.page);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM documents
           WHERE (?1 IS NULL OR type = ?1)
           ORDER BY id
           LIMIT ?2 OFFSET ?3",
          RawDocument::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            params![filter.doc_type, limit_val, offset_val],
            RawDocument::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn find_document_by_hash(&self, hash: String) -> Result<Option<Document>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM documents WHERE hash = ?1 ORDER BY id DESC LIMIT 1",
          RawDocument::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, params![hash], RawDocument::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn get_document(&self, id: i64) -> Result<Option<Document>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", RawDocument::COLUMNS);
        Ok(
          conn
            .query_row(&sql, params![id], RawDocument::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn document_history(
    &self,
    knowledge_base_id: i64,
    filename: String,
  ) -> Result<Vec<Document>> {
    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM documents
           WHERE knowledge_base_id = ?1 AND filename = ?2
           ORDER BY version",
          RawDocument::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![knowledge_base_id, filename], RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }
}
