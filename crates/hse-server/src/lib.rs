//! HTTP server wiring for the HSE KPI tracker.
//!
//! Mounts [`hse_api::api_router`] under `/api` behind HTTP Basic auth, plus an
//! unauthenticated `/health` probe.

pub mod auth;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware, routing::get};
use hse_api::{ApiSettings, ApiState};
use hse_core::store::KpiStore;
use hse_export::ExportOptions;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// A user allowed to sign in. The username becomes the acting user id.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Runtime server configuration, deserialised from `config.toml` and `HSE_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  pub store_path:             PathBuf,
  pub users:                  Vec<UserConfig>,
  pub catalog_retry_delay_ms: u64,
  pub export:                 ExportOptions,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                   "127.0.0.1".to_string(),
      port:                   8080,
      store_path:             PathBuf::from("~/.local/share/hse/hse.db"),
      users:                  Vec::new(),
      catalog_retry_delay_ms: 1000,
      export:                 ExportOptions::default(),
    }
  }
}

impl ServerConfig {
  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      catalog_retry_delay: Duration::from_millis(self.catalog_retry_delay_ms),
      export:              self.export.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router over `store`.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: KpiStore + 'static,
{
  let users = Arc::new(config.users.clone());
  let api = hse_api::api_router(ApiState::new(store, config.api_settings()))
    .layer(middleware::from_fn_with_state(users, auth::require_auth));

  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use hse_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn make_app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let config = ServerConfig {
      users: vec![UserConfig {
        username:      "inspector".to_string(),
        password_hash: auth::hash_password("secret").unwrap(),
      }],
      catalog_retry_delay_ms: 0,
      ..ServerConfig::default()
    };
    app(Arc::new(store), &config)
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    app:    &Router,
    method: &str,
    uri:    &str,
    auth:   Option<&str>,
    body:   Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn health_needs_no_auth() {
    let app = make_app().await;
    let resp = oneshot_raw(&app, "GET", "/health", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_rejects_missing_and_bad_credentials() {
    let app = make_app().await;

    let resp = oneshot_raw(&app, "GET", "/api/sections", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let bad = auth_header("inspector", "nope");
    let resp = oneshot_raw(&app, "GET", "/api/sections", Some(&bad), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn authenticated_user_is_recorded_as_author() {
    let app = make_app().await;
    let auth = auth_header("inspector", "secret");

    let resp = oneshot_raw(&app, "POST", "/api/periods/seed", Some(&auth), Some(json!({ "year": 2025 }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let periods = json_body(resp).await;
    let march = periods[2]["period_id"].as_str().unwrap().to_string();

    let resp = oneshot_raw(
      &app,
      "POST",
      "/api/sections",
      Some(&auth),
      Some(json!({ "name": "Safety", "code": "SAF", "order_idx": 1 })),
    )
    .await;
    let section = json_body(resp).await;

    let resp = oneshot_raw(
      &app,
      "POST",
      "/api/kpis",
      Some(&auth),
      Some(json!({ "section_id": section["section_id"], "code": "1.1", "name": "Toolbox talks" })),
    )
    .await;
    let kpi = json_body(resp).await;
    let kpi_id = kpi["kpi_id"].as_str().unwrap();

    let resp = oneshot_raw(
      &app,
      "PUT",
      &format!("/api/values/{kpi_id}/{march}"),
      Some(&auth),
      Some(json!({ "status": "done", "text_value": "3" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = oneshot_raw(&app, "GET", "/api/changes", Some(&auth), None).await;
    let changes = json_body(resp).await;
    assert_eq!(changes[0]["changed_by"], "inspector");
  }

  #[test]
  fn config_defaults_fill_missing_fields() {
    let config: ServerConfig = serde_json::from_value(json!({ "port": 9000 })).unwrap();
    assert_eq!(config.port, 9000);
    assert_eq!(config.host, "127.0.0.1");
    assert!(config.users.is_empty());
    assert_eq!(config.api_settings().catalog_retry_delay, Duration::from_secs(1));
    assert_eq!(config.export, ExportOptions::default());
  }
}
