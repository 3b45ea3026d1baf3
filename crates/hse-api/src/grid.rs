//! Handlers for `/grid` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/grid` | Optional `?year`, `period_type`, `section_id`, `from`, `to`; sends an `ETag` and honours `If-None-Match` |
//! | `GET`  | `/grid/activity` | Cells currently saving, plus saves finished since the last call |

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use hse_core::{
  activity::{CellActivity, CellKey},
  grid::{Catalog, Grid, GridQuery},
  store::KpiStore,
};
use serde::Serialize;

use crate::{
  ApiState,
  error::ApiError,
  etag::{grid_etag, if_none_match},
  retry_once,
};

/// Load the catalog slice for `query` (retrying once) and project it.
pub(crate) async fn load<S: KpiStore>(state: &ApiState<S>, query: &GridQuery) -> Result<Grid, ApiError> {
  let store = state.store.as_ref();
  let catalog = retry_once(state.settings.catalog_retry_delay, "catalog load", || {
    Catalog::load(store, query)
  })
  .await
  .map_err(ApiError::store)?;

  catalog.load_grid(store).await.map_err(ApiError::store)
}

/// `GET /grid`
pub async fn get_grid<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Query(query): Query<GridQuery>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let grid = load(&state, &query).await?;
  let etag = grid_etag(&grid);

  if if_none_match(&headers, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  tracing::debug!(kpis = grid.kpi_count(), periods = grid.periods.len(), "grid projected");
  Ok(([(header::ETAG, etag)], Json(grid)).into_response())
}

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
  #[serde(flatten)]
  pub cell:     CellKey,
  pub activity: CellActivity,
}

/// `GET /grid/activity`
pub async fn activity<S: KpiStore>(State(state): State<ApiState<S>>) -> Json<Vec<ActivityEntry>> {
  let mut entries: Vec<ActivityEntry> = state
    .board()
    .take_snapshot()
    .into_iter()
    .map(|(cell, activity)| ActivityEntry { cell, activity })
    .collect();
  entries.sort_by_key(|e| (e.cell.kpi_id, e.cell.period_id));
  Json(entries)
}
