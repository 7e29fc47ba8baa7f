//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use ragex_core::{
  dataset::{Complexity, QueryInput},
  ground_truth::{Confidence, GroundTruthInput, HierarchicalMetadataInput},
  knowledge_base::DocumentInput,
  store::{DocumentFilter, ExperimentStore, Page, QueryFilter},
};

use crate::{SqliteStore, reconcile, schema::SCHEMA};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn query(position_id: u32, prompt: &str) -> QueryInput {
  QueryInput::new(position_id, prompt, Complexity::TextualDescription)
}

fn ground_truth(filename: &str, confidence: Confidence) -> GroundTruthInput {
  GroundTruthInput {
    filename: filename.into(),
    confidence,
    hierarchical_metadata: None,
  }
}

fn section(id_section: &str, title: &str, depth: i64) -> HierarchicalMetadataInput {
  HierarchicalMetadataInput {
    id_section:    Some(id_section.into()),
    section_title: Some(title.into()),
    depth:         Some(depth),
  }
}

// ─── Datasets ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_query_is_added_at_version_one() {
  let s = store().await;

  let stats = s
    .reconcile_dataset("DS1".into(), vec![query(1, "A")])
    .await
    .unwrap();
  assert_eq!(stats.queries_added, 1);
  assert_eq!(stats.queries_updated, 0);
  assert_eq!(stats.queries_marked_obsolete, 0);

  let history = s.query_history(stats.dataset_id, 1).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].version, 1);
  assert!(!history[0].obsolete);

  let dataset = s.get_dataset(stats.dataset_id).await.unwrap().unwrap();
  assert_eq!(dataset.dataset_name, "DS1");
  assert!(dataset.data_update.is_some());
}

#[tokio::test]
async fn changed_prompt_supersedes_current_version() {
  let s = store().await;
  s.reconcile_dataset("DS1".into(), vec![query(1, "A")])
    .await
    .unwrap();

  let stats = s
    .reconcile_dataset("DS1".into(), vec![query(1, "B")])
    .await
    .unwrap();
  assert_eq!(stats.queries_added, 0);
  assert_eq!(stats.queries_updated, 1);
  assert_eq!(stats.queries_marked_obsolete, 1);

  let history = s.query_history(stats.dataset_id, 1).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].version, 1);
  assert_eq!(history[0].prompt, "A");
  assert!(history[0].obsolete);
  assert_eq!(history[1].version, 2);
  assert_eq!(history[1].prompt, "B");
  assert!(!history[1].obsolete);
}

#[tokio::test]
async fn reconcile_is_idempotent() {
  let s = store().await;
  let mut q = query(1, "A");
  q.device = Some("router".into());
  q.ground_truths = vec![ground_truth("manual.pdf", Confidence::High)];

  s.reconcile_dataset("DS1".into(), vec![q.clone()])
    .await
    .unwrap();
  let stats = s.reconcile_dataset("DS1".into(), vec![q]).await.unwrap();

  assert!(!stats.wrote());
  assert_eq!(stats.ground_truths_added, 0);
  let history = s.query_history(stats.dataset_id, 1).await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn versions_increase_by_one_per_change() {
  let s = store().await;
  for prompt in ["A", "B", "C", "D"] {
    s.reconcile_dataset("DS1".into(), vec![query(7, prompt)])
      .await
      .unwrap();
  }

  let dataset = s.ensure_dataset("DS1".into()).await.unwrap();
  let history = s.query_history(dataset.id, 7).await.unwrap();
  let versions: Vec<u32> = history.iter().map(|q| q.version).collect();
  assert_eq!(versions, vec![1, 2, 3, 4]);
  assert_eq!(history.iter().filter(|q| !q.obsolete).count(), 1);
  assert_eq!(history[3].prompt, "D");
}

#[tokio::test]
async fn reverting_content_still_creates_a_new_version() {
  let s = store().await;
  for prompt in ["A", "B", "A"] {
    s.reconcile_dataset("DS1".into(), vec![query(1, prompt)])
      .await
      .unwrap();
  }

  let dataset = s.ensure_dataset("DS1".into()).await.unwrap();
  let history = s.query_history(dataset.id, 1).await.unwrap();
  assert_eq!(history.len(), 3);
  assert_eq!(history[2].prompt, "A");
  assert_eq!(history[2].version, 3);
}

#[tokio::test]
async fn absent_positions_are_left_alone() {
  let s = store().await;
  s.reconcile_dataset("DS1".into(), vec![query(1, "A"), query(2, "B")])
    .await
    .unwrap();

  let stats = s
    .reconcile_dataset("DS1".into(), vec![query(1, "A")])
    .await
    .unwrap();
  assert!(!stats.wrote());

  let current = s
    .list_queries(QueryFilter {
      dataset_id: Some(stats.dataset_id),
      obsolete: Some(false),
      ..Default::default()
    })
    .await
    .unwrap();
  let positions: Vec<u32> = current.iter().map(|q| q.position_id).collect();
  assert_eq!(positions, vec![1, 2]);
}

#[tokio::test]
async fn duplicate_positions_write_nothing() {
  let s = store().await;

  let err = s
    .reconcile_dataset("DS1".into(), vec![query(1, "A"), query(1, "B")])
    .await
    .unwrap_err();
  assert!(err.is_validation());

  let datasets = s.list_datasets(Page::default()).await.unwrap();
  assert!(datasets.is_empty());
}

#[test]
fn failure_mid_batch_rolls_back_every_write() {
  let mut conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(SCHEMA).unwrap();
  conn
    .execute_batch(
      "CREATE TRIGGER reject_position_two BEFORE INSERT ON queries
       WHEN NEW.position_id = 2
       BEGIN SELECT RAISE(ABORT, 'position 2 rejected'); END;",
    )
    .unwrap();

  let mut q1 = query(1, "A");
  q1.ground_truths = vec![ground_truth("a.pdf", Confidence::High)];
  let result = reconcile::dataset(&mut conn, "DS1", &[q1, query(2, "B")], Utc::now());
  assert!(matches!(result, Err(crate::Error::Sqlite(_))));

  for table in ["datasets", "queries", "ground_truths", "query_ground_truths"] {
    let count: i64 = conn
      .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
      .unwrap();
    assert_eq!(count, 0, "{table}");
  }
}

#[tokio::test]
async fn no_op_reconcile_leaves_data_update_unset() {
  let s = store().await;
  let dataset = s.ensure_dataset("DS1".into()).await.unwrap();
  assert!(dataset.data_update.is_none());

  let stats = s.reconcile_dataset("DS1".into(), vec![]).await.unwrap();
  assert_eq!(stats.dataset_id, dataset.id);
  assert!(!stats.wrote());

  let after = s.get_dataset(dataset.id).await.unwrap().unwrap();
  assert!(after.data_update.is_none());
}

#[tokio::test]
async fn ground_truth_order_does_not_matter() {
  let s = store().await;
  let a = ground_truth("a.pdf", Confidence::High);
  let b = ground_truth("b.pdf", Confidence::Low);

  let mut q = query(1, "A");
  q.ground_truths = vec![a.clone(), b.clone()];
  s.reconcile_dataset("DS1".into(), vec![q.clone()])
    .await
    .unwrap();

  q.ground_truths = vec![b, a];
  let stats = s.reconcile_dataset("DS1".into(), vec![q]).await.unwrap();
  assert!(!stats.wrote());
}

#[tokio::test]
async fn changed_ground_truths_supersede() {
  let s = store().await;
  let mut q = query(1, "A");
  q.ground_truths = vec![ground_truth("a.pdf", Confidence::High)];
  s.reconcile_dataset("DS1".into(), vec![q.clone()])
    .await
    .unwrap();

  q.ground_truths = vec![ground_truth("a.pdf", Confidence::Medium)];
  let stats = s.reconcile_dataset("DS1".into(), vec![q]).await.unwrap();
  assert_eq!(stats.queries_updated, 1);
  assert_eq!(stats.ground_truths_added, 1);

  let history = s.query_history(stats.dataset_id, 1).await.unwrap();
  assert_eq!(history[0].ground_truths[0].confidence, Confidence::High);
  assert_eq!(history[1].ground_truths[0].confidence, Confidence::Medium);
}

#[tokio::test]
async fn identical_ground_truths_are_shared() {
  let s = store().await;
  let mut gt = ground_truth("guide.pdf", Confidence::High);
  gt.hierarchical_metadata = Some(section("2.1", "Setup", 2));

  let mut q1 = query(1, "A");
  q1.ground_truths = vec![gt.clone()];
  let mut q2 = query(2, "B");
  q2.ground_truths = vec![gt.clone(), gt];

  let stats = s
    .reconcile_dataset("DS1".into(), vec![q1, q2])
    .await
    .unwrap();
  assert_eq!(stats.queries_added, 2);
  assert_eq!(stats.ground_truths_added, 1);

  let history_1 = s.query_history(stats.dataset_id, 1).await.unwrap();
  let history_2 = s.query_history(stats.dataset_id, 2).await.unwrap();
  assert_eq!(history_2[0].ground_truths.len(), 1);
  assert_eq!(history_1[0].ground_truths[0].id, history_2[0].ground_truths[0].id);

  let meta = history_1[0].ground_truths[0]
    .hierarchical_metadata
    .as_ref()
    .unwrap();
  assert_eq!(meta.section_title.as_deref(), Some("Setup"));
  assert_eq!(meta.depth, Some(2));
}

#[tokio::test]
async fn empty_metadata_matches_missing_metadata() {
  let s = store().await;
  let mut q = query(1, "A");
  q.ground_truths = vec![ground_truth("a.pdf", Confidence::Low)];
  s.reconcile_dataset("DS1".into(), vec![q.clone()])
    .await
    .unwrap();

  q.ground_truths[0].hierarchical_metadata = Some(HierarchicalMetadataInput::default());
  let stats = s.reconcile_dataset("DS1".into(), vec![q]).await.unwrap();
  assert!(!stats.wrote());

  let history = s.query_history(stats.dataset_id, 1).await.unwrap();
  assert!(history[0].ground_truths[0].hierarchical_metadata.is_none());
}

#[tokio::test]
async fn get_query_loads_ground_truths() {
  let s = store().await;
  let mut q = query(3, "Where is the reset button?");
  q.customer = Some("acme".into());
  q.complexity = Complexity::ImageAnalysis;
  q.ground_truths = vec![
    ground_truth("a.pdf", Confidence::High),
    ground_truth("b.pdf", Confidence::Medium),
  ];
  let stats = s.reconcile_dataset("DS1".into(), vec![q]).await.unwrap();

  let listed = s
    .list_queries(QueryFilter {
      dataset_id: Some(stats.dataset_id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(listed.len(), 1);
  assert!(listed[0].ground_truths.is_empty());

  let fetched = s.get_query(listed[0].id).await.unwrap().unwrap();
  assert_eq!(fetched.customer.as_deref(), Some("acme"));
  assert_eq!(fetched.complexity, Complexity::ImageAnalysis);
  assert_eq!(fetched.ground_truths.len(), 2);

  assert!(s.get_query(9_999).await.unwrap().is_none());
}

#[tokio::test]
async fn list_queries_filters_and_pages() {
  let s = store().await;
  s.reconcile_dataset("DS1".into(), vec![query(1, "A"), query(2, "B")])
    .await
    .unwrap();
  s.reconcile_dataset("DS1".into(), vec![query(1, "A2")])
    .await
    .unwrap();
  s.reconcile_dataset("DS2".into(), vec![query(1, "X")])
    .await
    .unwrap();

  let all = s.list_queries(QueryFilter::default()).await.unwrap();
  assert_eq!(all.len(), 4);

  let obsolete = s
    .list_queries(QueryFilter {
      obsolete: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(obsolete.len(), 1);
  assert_eq!(obsolete[0].prompt, "A");

  let page = s
    .list_queries(QueryFilter {
      page: Page { offset: 1, limit: 2 },
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.len(), 2);
  assert_eq!(page[0].id, all[1].id);
}

#[tokio::test]
async fn ensure_dataset_is_get_or_create() {
  let s = store().await;

  let first = s.ensure_dataset("DS1".into()).await.unwrap();
  assert!(first.data_update.is_none());
  let second = s.ensure_dataset("DS1".into()).await.unwrap();
  assert_eq!(first.id, second.id);

  let datasets = s.list_datasets(Page::default()).await.unwrap();
  assert_eq!(datasets.len(), 1);
}

#[tokio::test]
async fn empty_dataset_name_is_rejected() {
  let s = store().await;
  let err = s.ensure_dataset("  ".into()).await.unwrap_err();
  assert!(err.is_validation());
}

// ─── Knowledge bases ─────────────────────────────────────────────────────────

fn doc(filename: &str, hash: &str) -> DocumentInput {
  DocumentInput::new(filename, "pdf", hash)
}

#[tokio::test]
async fn missing_document_is_deleted_then_readded() {
  let s = store().await;

  let stats = s
    .reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h1")])
    .await
    .unwrap();
  assert_eq!(stats.documents_added, 1);
  let kb_id = stats.knowledge_base_id;

  let stats = s
    .reconcile_knowledge_base("KB1".into(), vec![])
    .await
    .unwrap();
  assert_eq!(stats.documents_marked_deleted, 1);
  assert!(s.list_documents(kb_id, true).await.unwrap().is_empty());

  let stats = s
    .reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h1")])
    .await
    .unwrap();
  assert_eq!(stats.documents_added, 1);
  assert_eq!(stats.documents_updated, 0);

  let history = s.document_history(kb_id, "f1".into()).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].version, 1.0);
  assert!(history[0].deleted);
  assert_eq!(history[1].version, 2.0);
  assert!(history[1].is_active());
}

#[tokio::test]
async fn changed_hash_supersedes_document() {
  let s = store().await;
  s.reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h1")])
    .await
    .unwrap();

  let stats = s
    .reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h2")])
    .await
    .unwrap();
  assert_eq!(stats.documents_updated, 1);
  assert_eq!(stats.documents_marked_obsolete, 1);
  assert_eq!(stats.documents_marked_deleted, 0);

  let active = s
    .list_documents(stats.knowledge_base_id, true)
    .await
    .unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].hash, "h2");
  assert_eq!(active[0].version, 2.0);

  let all = s
    .list_documents(stats.knowledge_base_id, false)
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].version, 2.0);
  assert!(all[1].obsolete);
}

#[tokio::test]
async fn unchanged_documents_are_a_no_op() {
  let s = store().await;
  let batch = vec![doc("f1", "h1"), doc("f2", "h2")];
  s.reconcile_knowledge_base("KB1".into(), batch.clone())
    .await
    .unwrap();

  let stats = s
    .reconcile_knowledge_base("KB1".into(), batch.clone())
    .await
    .unwrap();
  assert!(!stats.modified());

  let before = s
    .get_knowledge_base(stats.knowledge_base_id)
    .await
    .unwrap()
    .unwrap();
  assert!(before.updated_at.is_some());

  s.reconcile_knowledge_base("KB1".into(), batch)
    .await
    .unwrap();
  let after = s
    .get_knowledge_base(stats.knowledge_base_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn new_knowledge_base_deletes_nothing() {
  let s = store().await;
  let stats = s
    .reconcile_knowledge_base("KB1".into(), vec![])
    .await
    .unwrap();
  assert!(!stats.modified());

  let kb = s
    .get_knowledge_base(stats.knowledge_base_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(kb.name, "KB1");
  assert!(kb.updated_at.is_none());
}

#[tokio::test]
async fn duplicate_filenames_write_nothing() {
  let s = store().await;
  let err = s
    .reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h1"), doc("f1", "h2")])
    .await
    .unwrap_err();
  assert!(err.is_validation());
  assert!(
    s.list_knowledge_bases(Page::default())
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn ensure_knowledge_base_touches_existing() {
  let s = store().await;

  let created = s.ensure_knowledge_base("KB1".into()).await.unwrap();
  assert!(created.updated_at.is_none());

  let touched = s.ensure_knowledge_base("KB1".into()).await.unwrap();
  assert_eq!(created.id, touched.id);
  assert!(touched.updated_at.is_some());
}

#[tokio::test]
async fn get_document_by_id() {
  let s = store().await;
  let stats = s
    .reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h1")])
    .await
    .unwrap();
  let listed = s
    .list_documents(stats.knowledge_base_id, true)
    .await
    .unwrap();

  let fetched = s.get_document(listed[0].id).await.unwrap().unwrap();
  assert_eq!(fetched.filename, "f1");
  assert_eq!(fetched.doc_type, "pdf");
  assert!(s.get_document(9_999).await.unwrap().is_none());
}

#[tokio::test]
async fn list_all_documents_filters_by_type() {
  let s = store().await;
  s.reconcile_knowledge_base(
    "KB1".into(),
    vec![doc("f1", "h1"), DocumentInput::new("f2", "docx", "h2")],
  )
  .await
  .unwrap();
  s.reconcile_knowledge_base("KB2".into(), vec![doc("g1", "h3")])
    .await
    .unwrap();

  let all = s
    .list_all_documents(DocumentFilter::default())
    .await
    .unwrap();
  assert_eq!(all.len(), 3);

  let pdfs = s
    .list_all_documents(DocumentFilter {
      doc_type: Some("pdf".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  let names: Vec<&str> = pdfs.iter().map(|d| d.filename.as_str()).collect();
  assert_eq!(names, vec!["f1", "g1"]);

  let page = s
    .list_all_documents(DocumentFilter {
      doc_type: None,
      page:     Page { offset: 2, limit: 5 },
    })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].filename, "g1");
}

#[tokio::test]
async fn find_document_by_hash_returns_latest_version() {
  let s = store().await;
  s.reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h1")])
    .await
    .unwrap();
  s.reconcile_knowledge_base("KB1".into(), vec![doc("f1", "h2")])
    .await
    .unwrap();

  let found = s.find_document_by_hash("h2".into()).await.unwrap().unwrap();
  assert_eq!(found.filename, "f1");
  assert_eq!(found.version, 2.0);

  let old = s.find_document_by_hash("h1".into()).await.unwrap().unwrap();
  assert!(old.obsolete);

  assert!(s.find_document_by_hash("nope".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn oversized_page_bounds_saturate() {
  let s = store().await;
  s.reconcile_dataset("DS1".into(), vec![query(1, "A"), query(2, "B")])
    .await
    .unwrap();

  let unbounded = Page { offset: 0, limit: usize::MAX };
  assert_eq!(s.list_datasets(unbounded).await.unwrap().len(), 1);
  let queries = s
    .list_queries(QueryFilter {
      page: unbounded,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(queries.len(), 2);

  let past_end = Page { offset: usize::MAX, limit: 10 };
  assert!(s.list_datasets(past_end).await.unwrap().is_empty());
}
