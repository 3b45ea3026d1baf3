//! JSON REST API for the HSE KPI tracker.
//!
//! Exposes an axum [`Router`] backed by any [`hse_core::store::KpiStore`].
//! Authentication is the caller's responsibility: it must insert an [`Actor`]
//! extension naming the acting user into every request that writes.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", hse_api::api_router(ApiState::new(store, settings)))
//! ```

pub mod analytics;
pub mod catalog;
pub mod changes;
pub mod error;
pub mod etag;
pub mod export;
pub mod grid;
pub mod values;

use std::{
  future::Future,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::{get, post},
};
use hse_core::{activity::ActivityBoard, store::KpiStore};
use hse_export::ExportOptions;

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Tunables that are not part of the store.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Pause before the single retry of a failed catalog load.
  pub catalog_retry_delay: Duration,
  pub export:              ExportOptions,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      catalog_retry_delay: Duration::from_secs(1),
      export:              ExportOptions::default(),
    }
  }
}

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub activity: Arc<Mutex<ActivityBoard>>,
  pub settings: Arc<ApiSettings>,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      activity: self.activity.clone(),
      settings: self.settings.clone(),
    }
  }
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, settings: ApiSettings) -> Self {
    Self {
      store,
      activity: Arc::new(Mutex::new(ActivityBoard::new())),
      settings: Arc::new(settings),
    }
  }

  pub(crate) fn board(&self) -> MutexGuard<'_, ActivityBoard> {
    self.activity.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The authenticated user id, inserted as a request extension by the
/// server's auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Actor>()
      .cloned()
      .ok_or(ApiError::Unauthorized)
  }
}

// ─── Retry ───────────────────────────────────────────────────────────────────

/// Run `op`; if it fails, wait `delay` and run it exactly once more.
pub async fn retry_once<T, E, F, Fut>(delay: Duration, what: &str, mut op: F) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: std::fmt::Display,
{
  match op().await {
    Ok(v) => Ok(v),
    Err(e) => {
      tracing::warn!(error = %e, ?delay, "{what} failed; retrying once");
      tokio::time::sleep(delay).await;
      op().await
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: KpiStore + 'static,
{
  Router::new()
    // Catalogs
    .route("/periods", get(catalog::list_periods::<S>).post(catalog::create_period::<S>))
    .route("/periods/seed", post(catalog::seed_periods::<S>))
    .route("/sections", get(catalog::list_sections::<S>).post(catalog::create_section::<S>))
    .route("/kpis", get(catalog::list_kpis::<S>).post(catalog::create_kpi::<S>))
    .route("/kpis/{id}/active", post(catalog::set_kpi_active::<S>))
    // Grid
    .route("/grid", get(grid::get_grid::<S>))
    .route("/grid/activity", get(grid::activity::<S>))
    // Values
    .route(
      "/values/{kpi_id}/{period_id}",
      get(values::get_one::<S>).put(values::put::<S>),
    )
    // Change log, analytics, export
    .route("/changes", get(changes::list::<S>))
    .route("/analytics", get(analytics::handler::<S>))
    .route("/export", get(export::download::<S>))
    .with_state(state)
}
