//! Handler for `GET /analytics[?year=<y>][&section_id=<id>][&period_id=<id>]`.

use axum::{
  Json,
  extract::{Query, State},
};
use hse_core::{
  analytics::{Analytics, AnalyticsFilter, analyze},
  grid::GridQuery,
  store::KpiStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError, grid};

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
  pub year:       Option<i32>,
  pub section_id: Option<Uuid>,
  pub period_id:  Option<Uuid>,
}

/// `GET /analytics`
pub async fn handler<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<AnalyticsParams>,
) -> Result<Json<Analytics>, ApiError> {
  let query = GridQuery { year: params.year, ..GridQuery::default() };
  let grid = grid::load(&state, &query).await?;

  let filter = AnalyticsFilter {
    section_id: params.section_id,
    period_id:  params.period_id,
  };
  Ok(Json(analyze(&grid, &filter)))
}
