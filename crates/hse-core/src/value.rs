//! KPI values — the mutable record of a KPI's status for one period.
//!
//! A value does not exist until the first edit of its (KPI, period) cell. The
//! pair is a natural key: a store holds at most one value per pair and every
//! later edit mutates that record in place, bumping its `version`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Workflow status of a KPI for one period.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KpiStatus {
  #[default]
  NotStarted,
  InProgress,
  Done,
  Blocked,
  NeedsReview,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// The persisted value of one (KPI, period) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiValue {
  pub value_id:      Uuid,
  pub kpi_id:        Uuid,
  pub period_id:     Uuid,
  pub status:        KpiStatus,
  pub numeric_value: Option<f64>,
  pub text_value:    Option<String>,
  /// Opaque reference to evidence held by an external blob store.
  pub evidence_ref:  Option<String>,
  /// 1 on creation, incremented by exactly one on every update.
  pub version:       u32,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl KpiValue {
  pub fn key(&self) -> (Uuid, Uuid) { (self.kpi_id, self.period_id) }
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// A partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuePatch {
  pub status:        Option<KpiStatus>,
  pub text_value:    Option<String>,
  pub numeric_value: Option<f64>,
  pub evidence_ref:  Option<String>,
}

/// The mutable fields of a [`KpiValue`] after a patch has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFields {
  pub status:        KpiStatus,
  pub numeric_value: Option<f64>,
  pub text_value:    Option<String>,
  pub evidence_ref:  Option<String>,
}

impl ValuePatch {
  pub fn status(status: KpiStatus) -> Self {
    Self { status: Some(status), ..Self::default() }
  }

  pub fn text(text: impl Into<String>) -> Self {
    Self { text_value: Some(text.into()), ..Self::default() }
  }

  /// Merge this patch over `existing` (or over an empty cell when `None`).
  ///
  /// - An empty text value counts as absent.
  /// - A fully numeric text value also sets `numeric_value`, unless the patch
  ///   carries an explicit `numeric_value`, which always wins.
  /// - A non-numeric text value leaves `numeric_value` as it was.
  pub fn apply(&self, existing: Option<&KpiValue>) -> ValueFields {
    let text = self.text_value.as_deref().filter(|t| !t.is_empty());

    let status = self
      .status
      .or(existing.map(|v| v.status))
      .unwrap_or_default();

    let text_value = text
      .map(str::to_owned)
      .or_else(|| existing.and_then(|v| v.text_value.clone()));

    let numeric_value = self
      .numeric_value
      .or_else(|| text.and_then(parse_numeric))
      .or_else(|| existing.and_then(|v| v.numeric_value));

    let evidence_ref = self
      .evidence_ref
      .clone()
      .or_else(|| existing.and_then(|v| v.evidence_ref.clone()));

    ValueFields { status, numeric_value, text_value, evidence_ref }
  }
}

/// Parse `text` as a plain integer or decimal (`42`, `-3.5`, `.5`, `7.`).
///
/// Surrounding whitespace is ignored. Exponents, hex, `inf`, `NaN` and
/// literals too large for a finite `f64` are rejected so they are stored as
/// text only.
pub fn parse_numeric(text: &str) -> Option<f64> {
  let trimmed = text.trim();
  let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);

  let mut seen_digit = false;
  let mut seen_point = false;
  for c in unsigned.chars() {
    match c {
      '0'..='9' => seen_digit = true,
      '.' if !seen_point => seen_point = true,
      _ => return None,
    }
  }

  if !seen_digit {
    return None;
  }
  trimmed.parse().ok().filter(|n: &f64| n.is_finite())
}

// ─── Write ───────────────────────────────────────────────────────────────────

/// Input to [`crate::store::KpiStore::upsert_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueWrite {
  pub kpi_id:           Uuid,
  pub period_id:        Uuid,
  pub patch:            ValuePatch,
  /// Version the caller last observed. `None` writes unconditionally (last
  /// write wins); `Some(0)` means "I expect no record yet".
  ///
  /// The HTTP layer still refuses a second write to a cell while one is in
  /// flight in the same process, versioned or not; sequential unversioned
  /// writes are last-write-wins.
  pub expected_version: Option<u32>,
}

impl ValueWrite {
  pub fn new(kpi_id: Uuid, period_id: Uuid, patch: ValuePatch) -> Self {
    Self { kpi_id, period_id, patch, expected_version: None }
  }

  pub fn expecting(mut self, version: u32) -> Self {
    self.expected_version = Some(version);
    self
  }
}

/// Whether a write guarded by `expected` may proceed against `existing`.
pub fn version_matches(existing: Option<&KpiValue>, expected: Option<u32>) -> bool {
  match expected {
    None => true,
    Some(v) => existing.map_or(0, |e| e.version) == v,
  }
}

/// Result of [`crate::store::KpiStore::upsert_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
  /// No record existed for the pair; one was created at version 1.
  Created(KpiValue),
  /// An existing record was patched in place.
  Updated {
    previous: KpiValue,
    current:  KpiValue,
  },
  /// `expected_version` did not match. Nothing was written.
  Conflict { current: Option<KpiValue> },
}

impl UpsertOutcome {
  /// The record as stored after the write, if the write happened.
  pub fn value(&self) -> Option<&KpiValue> {
    match self {
      Self::Created(v) => Some(v),
      Self::Updated { current, .. } => Some(current),
      Self::Conflict { .. } => None,
    }
  }

  pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict { .. }) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stored(status: KpiStatus, numeric: Option<f64>, text: Option<&str>) -> KpiValue {
    let now = Utc::now();
    KpiValue {
      value_id: Uuid::new_v4(),
      kpi_id: Uuid::new_v4(),
      period_id: Uuid::new_v4(),
      status,
      numeric_value: numeric,
      text_value: text.map(str::to_owned),
      evidence_ref: None,
      version: 3,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn numeric_detection() {
    assert_eq!(parse_numeric("42"), Some(42.0));
    assert_eq!(parse_numeric(" -3.5 "), Some(-3.5));
    assert_eq!(parse_numeric(".5"), Some(0.5));
    assert_eq!(parse_numeric("+7"), Some(7.0));
    assert_eq!(parse_numeric("N/A"), None);
    assert_eq!(parse_numeric(""), None);
    assert_eq!(parse_numeric("."), None);
    assert_eq!(parse_numeric("1e3"), None);
    assert_eq!(parse_numeric("1.2.3"), None);
    assert_eq!(parse_numeric("inf"), None);
    assert_eq!(parse_numeric(&"9".repeat(400)), None);
    assert_eq!(parse_numeric(&format!("-{}", "9".repeat(400))), None);
  }

  #[test]
  fn overflowing_text_is_kept_as_text_only() {
    let huge = "9".repeat(400);
    let existing = stored(KpiStatus::Done, Some(5.0), Some("5"));
    let fields = ValuePatch::text(huge.clone()).apply(Some(&existing));
    assert_eq!(fields.text_value.as_deref(), Some(huge.as_str()));
    assert_eq!(fields.numeric_value, Some(5.0));
  }

  #[test]
  fn patch_on_empty_cell_defaults_status() {
    let fields = ValuePatch::text("42").apply(None);
    assert_eq!(fields.status, KpiStatus::NotStarted);
    assert_eq!(fields.text_value.as_deref(), Some("42"));
    assert_eq!(fields.numeric_value, Some(42.0));
  }

  #[test]
  fn status_patch_preserves_other_fields() {
    let existing = stored(KpiStatus::Done, Some(5.0), Some("5"));
    let fields = ValuePatch::status(KpiStatus::Blocked).apply(Some(&existing));
    assert_eq!(fields.status, KpiStatus::Blocked);
    assert_eq!(fields.numeric_value, Some(5.0));
    assert_eq!(fields.text_value.as_deref(), Some("5"));
  }

  #[test]
  fn non_numeric_text_keeps_previous_number() {
    let existing = stored(KpiStatus::Done, Some(5.0), Some("5"));
    let fields = ValuePatch::text("N/A").apply(Some(&existing));
    assert_eq!(fields.text_value.as_deref(), Some("N/A"));
    assert_eq!(fields.numeric_value, Some(5.0));
  }

  #[test]
  fn non_numeric_text_on_new_cell_leaves_number_unset() {
    let fields = ValuePatch::text("N/A").apply(None);
    assert_eq!(fields.numeric_value, None);
  }

  #[test]
  fn empty_text_is_ignored() {
    let existing = stored(KpiStatus::InProgress, None, Some("pending audit"));
    let fields = ValuePatch::text("").apply(Some(&existing));
    assert_eq!(fields.text_value.as_deref(), Some("pending audit"));
  }

  #[test]
  fn explicit_numeric_wins_over_coercion() {
    let patch = ValuePatch {
      text_value: Some("12".into()),
      numeric_value: Some(11.5),
      ..ValuePatch::default()
    };
    assert_eq!(patch.apply(None).numeric_value, Some(11.5));
  }

  #[test]
  fn version_guard() {
    let existing = stored(KpiStatus::Done, None, None);
    assert!(version_matches(Some(&existing), None));
    assert!(version_matches(Some(&existing), Some(3)));
    assert!(!version_matches(Some(&existing), Some(2)));
    assert!(version_matches(None, Some(0)));
    assert!(!version_matches(None, Some(1)));
  }

  #[test]
  fn status_wire_format() {
    assert_eq!(KpiStatus::NeedsReview.to_string(), "needs_review");
    assert_eq!("in_progress".parse::<KpiStatus>().unwrap(), KpiStatus::InProgress);
    assert_eq!(
      serde_json::to_value(KpiStatus::NotStarted).unwrap(),
      serde_json::json!("not_started")
    );
  }
}
