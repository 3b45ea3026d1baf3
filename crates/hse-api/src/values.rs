//! Handlers for `/values` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/values/:kpi_id/:period_id` | 404 until the cell is first written |
//! | `PUT`  | `/values/:kpi_id/:period_id` | Body: [`PutBody`]; 201 created, 200 updated, 409 on a version conflict |
//!
//! A `PUT` marks the cell as saving on the activity board for its duration.
//! A second `PUT` to the same cell while one is in flight is refused with 409.

use std::sync::Mutex;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use hse_core::{
  activity::{ActivityBoard, CellKey},
  protocol::{UpdateContext, submit_value},
  store::KpiStore,
  value::{KpiValue, UpsertOutcome, ValuePatch, ValueWrite},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{Actor, ApiState, error::ApiError};

/// Source page stamped on change records when the client sends none.
const DEFAULT_SOURCE_PAGE: &str = "/grid";

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /values/:kpi_id/:period_id`
pub async fn get_one<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Path((kpi_id, period_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<KpiValue>, ApiError> {
  let value = state
    .store
    .get_value(kpi_id, period_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no value for kpi {kpi_id} in period {period_id}")))?;
  Ok(Json(value))
}

// ─── Put ─────────────────────────────────────────────────────────────────────

/// Body of `PUT /values/:kpi_id/:period_id`.
///
/// The patch fields sit at the top level:
/// `{"status":"done","text_value":"3","expected_version":0}`.
#[derive(Debug, Deserialize)]
pub struct PutBody {
  #[serde(flatten)]
  pub patch:            ValuePatch,
  /// Version last seen by the client; omit for last-write-wins.
  #[serde(default)]
  pub expected_version: Option<u32>,
  #[serde(default)]
  pub reason:           Option<String>,
  #[serde(default)]
  pub source_page:      Option<String>,
}

/// Marks a cell as saving until finished. If dropped unfinished (the request
/// was cancelled) the cell goes back to idle.
struct SaveGuard<'a> {
  board: &'a Mutex<ActivityBoard>,
  key:   CellKey,
  done:  bool,
}

impl<'a> SaveGuard<'a> {
  fn begin(board: &'a Mutex<ActivityBoard>, key: CellKey) -> Option<Self> {
    let started = lock(board).begin(key);
    started.then_some(Self { board, key, done: false })
  }

  fn succeed(mut self) {
    lock(self.board).succeed(self.key);
    self.done = true;
  }

  fn fail(mut self, message: impl Into<String>) {
    lock(self.board).fail(self.key, message);
    self.done = true;
  }
}

impl Drop for SaveGuard<'_> {
  fn drop(&mut self) {
    if !self.done {
      lock(self.board).clear(self.key);
    }
  }
}

fn lock(board: &Mutex<ActivityBoard>) -> std::sync::MutexGuard<'_, ActivityBoard> {
  board.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// `PUT /values/:kpi_id/:period_id`
pub async fn put<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Path((kpi_id, period_id)): Path<(Uuid, Uuid)>,
  Actor(actor): Actor,
  Json(body): Json<PutBody>,
) -> Result<Response, ApiError> {
  let kpi = state
    .store
    .get_kpi(kpi_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("kpi {kpi_id} not found")))?;
  let period = state
    .store
    .get_period(period_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("period {period_id} not found")))?;

  let key = CellKey::new(kpi_id, period_id);
  let guard = SaveGuard::begin(&state.activity, key)
    .ok_or_else(|| ApiError::Conflict("a save for this cell is already in progress".into()))?;

  let write = ValueWrite {
    kpi_id,
    period_id,
    patch: body.patch,
    expected_version: body.expected_version,
  };
  let ctx = UpdateContext {
    reason: body.reason,
    source_page: Some(body.source_page.unwrap_or_else(|| DEFAULT_SOURCE_PAGE.to_string())),
    kpi_name: Some(kpi.name),
    period_label: Some(period.label),
    ..UpdateContext::new(actor)
  };

  let outcome = match submit_value(state.store.as_ref(), write, &ctx).await {
    Ok(outcome) => outcome,
    Err(e) => {
      guard.fail(e.to_string());
      return Err(ApiError::store(e));
    }
  };

  let response = match outcome {
    UpsertOutcome::Created(value) => {
      guard.succeed();
      (StatusCode::CREATED, Json(value)).into_response()
    }
    UpsertOutcome::Updated { current, .. } => {
      guard.succeed();
      (StatusCode::OK, Json(current)).into_response()
    }
    UpsertOutcome::Conflict { current } => {
      guard.fail("version conflict");
      let body = json!({ "error": "version conflict", "current": current });
      (StatusCode::CONFLICT, Json(body)).into_response()
    }
  };
  Ok(response)
}
