//! HTTP server assembly for the RAG experiment API.
//!
//! Mounts [`ragex_api::api_router`] under the configured prefix and adds the
//! server-level routes, CORS, and request tracing.

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  http::{HeaderValue, Method, header},
  routing::get,
};
use ragex_core::store::ExperimentStore;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `RAGEX_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub database_path: PathBuf,
  pub api_prefix:    String,
  pub api_title:     String,
  /// Allowed browser origins; `["*"]` allows any.
  pub cors_origins:  Vec<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          "127.0.0.1".into(),
      port:          8000,
      database_path: PathBuf::from("ragex.db"),
      api_prefix:    "/api/v1".into(),
      api_title:     "RAG Experiment API".into(),
      cors_origins:  vec!["http://localhost:5173".into()],
    }
  }
}

impl ServerConfig {
  /// Reject settings the router cannot be built from.
  pub fn validate(&self) -> anyhow::Result<()> {
    anyhow::ensure!(
      self.api_prefix.is_empty() || self.api_prefix.starts_with('/'),
      "api_prefix must start with '/', got {:?}",
      self.api_prefix
    );
    Ok(())
  }

  /// `api_prefix` with one leading and no trailing slash; `None` mounts the
  /// API at the root.
  fn mount_prefix(&self) -> Option<String> {
    let trimmed = self.api_prefix.trim_matches('/');
    (!trimmed.is_empty()).then(|| format!("/{trimmed}"))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router for `store`.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: ExperimentStore + 'static,
{
  let info = json!({
    "title":      config.api_title,
    "version":    VERSION,
    "api_prefix": config.api_prefix,
  });

  let api = ragex_api::api_router(store);
  let router = Router::new()
    .route(
      "/",
      get(move || {
        let info = info.clone();
        async move { Json(info) }
      }),
    )
    .route("/health", get(health));

  let router = match config.mount_prefix() {
    Some(prefix) => router.nest(&prefix, api),
    None => router.merge(api),
  };

  router
    .layer(cors_layer(&config.cors_origins))
    .layer(TraceLayer::new_for_http())
}

/// `GET /health`
async fn health() -> Json<Value> {
  Json(json!({ "status": "healthy", "version": VERSION }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  if origins.iter().any(|o| o == "*") {
    tracing::warn!("CORS: allowing all origins");
    return CorsLayer::permissive();
  }

  let allowed: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match o.trim().parse::<HeaderValue>() {
      Ok(hv) => Some(hv),
      Err(e) => {
        tracing::warn!("CORS: invalid origin '{o}': {e}");
        None
      }
    })
    .collect();

  CorsLayer::new()
    .allow_origin(allowed)
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
  };
  use ragex_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  async fn test_app(config: &ServerConfig) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    app(Arc::new(store), config)
  }

  async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
      .oneshot(Request::get(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[test]
  fn empty_sources_yield_defaults() {
    let cfg: ServerConfig = config::Config::builder()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 8000);
    assert_eq!(cfg.api_prefix, "/api/v1");
    assert_eq!(cfg.cors_origins, vec!["http://localhost:5173".to_string()]);
  }

  #[test]
  fn partial_toml_overrides_only_named_fields() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(
        "port = 9000\ndatabase_path = \"/tmp/x.db\"",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.database_path, PathBuf::from("/tmp/x.db"));
    assert_eq!(cfg.host, "127.0.0.1");
  }

  #[test]
  fn prefix_without_leading_slash_is_rejected() {
    let config = ServerConfig {
      api_prefix: "api/v1".into(),
      ..Default::default()
    };
    assert!(config.validate().is_err());
    assert!(ServerConfig::default().validate().is_ok());
  }

  #[tokio::test]
  async fn root_prefix_mounts_api_at_root() {
    for api_prefix in ["/", ""] {
      let config = ServerConfig {
        api_prefix: api_prefix.into(),
        ..Default::default()
      };
      assert!(config.validate().is_ok());
      let app = test_app(&config).await;

      let (status, body) = get_json(app.clone(), "/datasets").await;
      assert_eq!(status, StatusCode::OK, "prefix {api_prefix:?}");
      assert!(body.as_array().unwrap().is_empty());

      let (status, body) = get_json(app, "/health").await;
      assert_eq!(status, StatusCode::OK);
      assert_eq!(body["status"], "healthy");
    }
  }

  #[tokio::test]
  async fn trailing_slash_in_prefix_is_ignored() {
    let config = ServerConfig {
      api_prefix: "/api/v1/".into(),
      ..Default::default()
    };
    let (status, _) = get_json(test_app(&config).await, "/api/v1/datasets").await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn health_reports_version() {
    let app = test_app(&ServerConfig::default()).await;
    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], VERSION);
  }

  #[tokio::test]
  async fn root_describes_the_api() {
    let config = ServerConfig {
      api_title: "Test API".into(),
      ..Default::default()
    };
    let (status, body) = get_json(test_app(&config).await, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Test API");
    assert_eq!(body["api_prefix"], "/api/v1");
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let config = ServerConfig {
      api_prefix: "/api/v2".into(),
      ..Default::default()
    };
    let app = test_app(&config).await;

    let (status, body) = get_json(app.clone(), "/api/v2/datasets").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let resp = app
      .oneshot(Request::get("/datasets").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
