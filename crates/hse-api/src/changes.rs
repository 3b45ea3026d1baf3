//! Handler for `GET /changes[?entity_id=<id>][&limit=<n>]`.
//!
//! Returns change records newest first; `limit` defaults to 100.

use axum::{
  Json,
  extract::{Query, State},
};
use hse_core::{
  change::{ChangeQuery, ChangeRecord},
  store::KpiStore,
};

use crate::{ApiState, error::ApiError};

/// `GET /changes`
pub async fn list<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Query(query): Query<ChangeQuery>,
) -> Result<Json<Vec<ChangeRecord>>, ApiError> {
  let changes = state
    .store
    .list_changes(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(changes))
}
