//! Handlers for the period, section and KPI catalogs.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/periods` | Optional `?year`, `period_type`, `from`, `to`, `include_inactive` |
//! | `POST` | `/periods` | Body: [`NewPeriod`]; returns 201 |
//! | `POST` | `/periods/seed` | Body: `{"year":2025}`; creates missing monthly periods |
//! | `GET`  | `/sections` | Optional `?include_inactive=true` |
//! | `POST` | `/sections` | Body: [`NewSection`]; returns 201 |
//! | `GET`  | `/kpis` | Optional `?section_id`, `include_inactive` |
//! | `POST` | `/kpis` | Body: [`NewKpi`]; 400 if the section is unknown |
//! | `POST` | `/kpis/:id/active` | Body: `{"is_active":false}`; 404 if not found |

use std::collections::HashSet;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use hse_core::{
  catalog::{Kpi, NewKpi, NewPeriod, NewSection, Period, PeriodType, Section, seed_monthly_periods},
  store::{KpiQuery, KpiStore, PeriodQuery},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Periods ─────────────────────────────────────────────────────────────────

/// `GET /periods`
pub async fn list_periods<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<Period>>, ApiError> {
  let periods = state
    .store
    .list_periods(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(periods))
}

/// `POST /periods`
pub async fn create_period<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewPeriod>,
) -> Result<impl IntoResponse, ApiError> {
  if body.end_date < body.start_date {
    return Err(ApiError::BadRequest(format!(
      "period ends ({}) before it starts ({})",
      body.end_date, body.start_date
    )));
  }
  let period = state
    .store
    .add_period(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(period)))
}

#[derive(Debug, Deserialize)]
pub struct SeedBody {
  pub year: i32,
}

/// `POST /periods/seed` — creates the monthly periods of `year` that do not
/// exist yet and returns them. Running it twice creates nothing the second
/// time.
pub async fn seed_periods<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<SeedBody>,
) -> Result<impl IntoResponse, ApiError> {
  let created = seed_year(state.store.as_ref(), body.year).await?;
  tracing::info!(year = body.year, created = created.len(), "seeded monthly periods");
  Ok((StatusCode::CREATED, Json(created)))
}

/// Add every monthly period of `year` missing from `store`.
pub async fn seed_year<S: KpiStore>(store: &S, year: i32) -> Result<Vec<Period>, ApiError> {
  let wanted = seed_monthly_periods(year).map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let existing: HashSet<_> = store
    .list_periods(&PeriodQuery {
      year: Some(year),
      period_type: Some(PeriodType::Monthly),
      include_inactive: true,
      ..PeriodQuery::default()
    })
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|p| p.start_date)
    .collect();

  let mut created = Vec::new();
  for period in wanted {
    if existing.contains(&period.start_date) {
      continue;
    }
    created.push(store.add_period(period).await.map_err(ApiError::store)?);
  }
  Ok(created)
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SectionParams {
  #[serde(default)]
  pub include_inactive: bool,
}

/// `GET /sections`
pub async fn list_sections<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<SectionParams>,
) -> Result<Json<Vec<Section>>, ApiError> {
  let sections = state
    .store
    .list_sections(params.include_inactive)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(sections))
}

/// `POST /sections`
pub async fn create_section<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewSection>,
) -> Result<impl IntoResponse, ApiError> {
  let section = state
    .store
    .add_section(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(section)))
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

/// `GET /kpis`
pub async fn list_kpis<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Query(query): Query<KpiQuery>,
) -> Result<Json<Vec<Kpi>>, ApiError> {
  let kpis = state
    .store
    .list_kpis(&query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(kpis))
}

/// `POST /kpis`
pub async fn create_kpi<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewKpi>,
) -> Result<impl IntoResponse, ApiError> {
  let sections = state
    .store
    .list_sections(true)
    .await
    .map_err(ApiError::store)?;
  if !sections.iter().any(|s| s.section_id == body.section_id) {
    return Err(ApiError::BadRequest(format!("section {} does not exist", body.section_id)));
  }

  let kpi = state.store.add_kpi(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(kpi)))
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub is_active: bool,
}

/// `POST /kpis/:id/active`
pub async fn set_kpi_active<S: KpiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Kpi>, ApiError> {
  let kpi = state
    .store
    .set_kpi_active(id, body.is_active)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("kpi {id} not found")))?;
  Ok(Json(kpi))
}
