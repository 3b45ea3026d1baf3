//! Handler for `GET /export` — the monitoring plan as an `.xlsx` download.

use axum::{
  extract::State,
  http::header,
  response::IntoResponse,
};
use chrono::Utc;
use hse_core::store::KpiStore;
use hse_export::{file_name, load_plan, render_xlsx};

use crate::{ApiState, error::ApiError, retry_once};

const XLSX_CONTENT_TYPE: &str =
  "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// `GET /export`
pub async fn download<S: KpiStore>(
  State(state): State<ApiState<S>>,
) -> Result<impl IntoResponse, ApiError> {
  let store = state.store.as_ref();
  let options = &state.settings.export;

  let plan = retry_once(state.settings.catalog_retry_delay, "export load", || {
    load_plan(store, options)
  })
  .await?;
  let bytes = render_xlsx(&plan)?;

  let name = file_name(Utc::now().date_naive());
  tracing::info!(file = %name, bytes = bytes.len(), "monitoring plan exported");

  Ok((
    [
      (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
      (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
    ],
    bytes,
  ))
}
