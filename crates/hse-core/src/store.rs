//! The `KpiStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `hse-store-sqlite`).
//! Higher layers (`hse-api`, `hse-export`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  catalog::{Kpi, NewKpi, NewPeriod, NewSection, Period, PeriodType, Section},
  change::{ChangeQuery, ChangeRecord, NewChange},
  value::{KpiValue, UpsertOutcome, ValueWrite},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`KpiStore::list_periods`]. Results are ordered by
/// `start_date`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
  pub year:             Option<i32>,
  pub period_type:      Option<PeriodType>,
  /// Only periods starting on or after this date.
  pub from:             Option<NaiveDate>,
  /// Only periods starting on or before this date.
  pub to:               Option<NaiveDate>,
  #[serde(default)]
  pub include_inactive: bool,
}

/// Parameters for [`KpiStore::list_kpis`]. Results are ordered by `code`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KpiQuery {
  pub section_id:       Option<Uuid>,
  #[serde(default)]
  pub include_inactive: bool,
}

/// Parameters for [`KpiStore::list_values`].
///
/// `None` means "no restriction"; `Some(vec![])` matches nothing.
#[derive(Debug, Clone, Default)]
pub struct ValueQuery {
  pub kpi_ids:    Option<Vec<Uuid>>,
  pub period_ids: Option<Vec<Uuid>>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a KPI store backend.
///
/// Catalog rows are insert-only apart from the KPI `is_active` flag. Values
/// are upserted on their (kpi_id, period_id) natural key. Change records are
/// append-only.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait KpiStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Periods ───────────────────────────────────────────────────────────

  fn add_period(
    &self,
    input: NewPeriod,
  ) -> impl Future<Output = Result<Period, Self::Error>> + Send + '_;

  fn get_period(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Period>, Self::Error>> + Send + '_;

  fn list_periods<'a>(
    &'a self,
    query: &'a PeriodQuery,
  ) -> impl Future<Output = Result<Vec<Period>, Self::Error>> + Send + 'a;

  // ── Sections ──────────────────────────────────────────────────────────

  fn add_section(
    &self,
    input: NewSection,
  ) -> impl Future<Output = Result<Section, Self::Error>> + Send + '_;

  /// List sections ordered by `order_idx`.
  fn list_sections(
    &self,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Section>, Self::Error>> + Send + '_;

  // ── KPIs ──────────────────────────────────────────────────────────────

  fn add_kpi(
    &self,
    input: NewKpi,
  ) -> impl Future<Output = Result<Kpi, Self::Error>> + Send + '_;

  fn get_kpi(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Kpi>, Self::Error>> + Send + '_;

  fn list_kpis<'a>(
    &'a self,
    query: &'a KpiQuery,
  ) -> impl Future<Output = Result<Vec<Kpi>, Self::Error>> + Send + 'a;

  /// Soft-(de)activate a KPI. Returns `None` if the KPI does not exist.
  fn set_kpi_active(
    &self,
    id: Uuid,
    is_active: bool,
  ) -> impl Future<Output = Result<Option<Kpi>, Self::Error>> + Send + '_;

  // ── Values ────────────────────────────────────────────────────────────

  /// Fetch the value for a (KPI, period) pair. `None` means no data has been
  /// entered yet.
  fn get_value(
    &self,
    kpi_id: Uuid,
    period_id: Uuid,
  ) -> impl Future<Output = Result<Option<KpiValue>, Self::Error>> + Send + '_;

  fn list_values<'a>(
    &'a self,
    query: &'a ValueQuery,
  ) -> impl Future<Output = Result<Vec<KpiValue>, Self::Error>> + Send + 'a;

  /// Create or patch the value for `write`'s pair.
  ///
  /// The read-modify-write is atomic: either the whole patch lands or nothing
  /// does, and the pair never gains a second record. A version mismatch is
  /// reported as [`UpsertOutcome::Conflict`], not as an error.
  fn upsert_value(
    &self,
    write: ValueWrite,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  // ── Change log ────────────────────────────────────────────────────────

  fn append_change(
    &self,
    input: NewChange,
  ) -> impl Future<Output = Result<ChangeRecord, Self::Error>> + Send + '_;

  /// List change records, newest first.
  fn list_changes<'a>(
    &'a self,
    query: &'a ChangeQuery,
  ) -> impl Future<Output = Result<Vec<ChangeRecord>, Self::Error>> + Send + 'a;
}
