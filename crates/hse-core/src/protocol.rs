//! The value update protocol: write the cell, then append an audit entry.
//!
//! The audit append is best-effort. A failure is logged and swallowed so the
//! caller sees the outcome of the value write alone.

use serde_json::json;

use crate::{
  change::NewChange,
  store::KpiStore,
  value::{KpiValue, UpsertOutcome, ValueWrite},
};

/// Entity name stamped on change records for KPI values.
pub const VALUE_ENTITY: &str = "kpi_value";

/// Who is writing, and optional labels used to build the audit reason.
#[derive(Debug, Clone, Default)]
pub struct UpdateContext {
  /// Opaque acting-user id.
  pub actor:        String,
  /// Overrides the generated reason when set.
  pub reason:       Option<String>,
  pub source_page:  Option<String>,
  pub kpi_name:     Option<String>,
  pub period_label: Option<String>,
}

impl UpdateContext {
  pub fn new(actor: impl Into<String>) -> Self {
    Self { actor: actor.into(), ..Self::default() }
  }
}

fn snapshot(value: &KpiValue) -> serde_json::Value {
  json!({
    "status":        value.status,
    "text_value":    value.text_value,
    "numeric_value": value.numeric_value,
  })
}

/// Build the change record describing `outcome`, or `None` for a conflict.
pub fn audit_entry(outcome: &UpsertOutcome, ctx: &UpdateContext) -> Option<NewChange> {
  let kpi = ctx.kpi_name.as_deref().unwrap_or("unknown KPI");
  let period = ctx.period_label.as_deref().unwrap_or("unknown period");

  let (value, field, old_value, new_value, reason) = match outcome {
    UpsertOutcome::Created(value) => {
      let mut new_value = snapshot(value);
      new_value["kpi_name"] = json!(ctx.kpi_name);
      new_value["period_label"] = json!(ctx.period_label);
      (
        value,
        "kpi_create",
        None,
        new_value,
        format!("Created new KPI value for \"{kpi}\" in period \"{period}\""),
      )
    }
    UpsertOutcome::Updated { previous, current } => (
      current,
      "kpi_update",
      Some(snapshot(previous)),
      snapshot(current),
      format!("Updated KPI \"{kpi}\" for period \"{period}\""),
    ),
    UpsertOutcome::Conflict { .. } => return None,
  };

  Some(NewChange {
    entity: VALUE_ENTITY.to_string(),
    entity_id: value.value_id,
    field: field.to_string(),
    old_value,
    new_value: Some(new_value),
    changed_by: ctx.actor.clone(),
    reason: Some(ctx.reason.clone().unwrap_or(reason)),
    source_page: ctx.source_page.clone(),
  })
}

/// Upsert a value and append its change record.
///
/// Storage failures of the upsert are returned unchanged and are not retried.
pub async fn submit_value<S: KpiStore>(
  store: &S,
  write: ValueWrite,
  ctx: &UpdateContext,
) -> Result<UpsertOutcome, S::Error> {
  let kpi_id = write.kpi_id;
  let period_id = write.period_id;
  let outcome = store.upsert_value(write).await?;

  match outcome.value() {
    Some(value) => tracing::debug!(
      %kpi_id, %period_id, version = value.version, actor = %ctx.actor,
      "kpi value written"
    ),
    None => tracing::info!(%kpi_id, %period_id, "kpi value write rejected: version conflict"),
  }

  if let Some(change) = audit_entry(&outcome, ctx)
    && let Err(e) = store.append_change(change).await
  {
    tracing::warn!(%kpi_id, %period_id, error = %e, "failed to append change record");
  }

  Ok(outcome)
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, sync::Mutex};

  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::{
    catalog::{Kpi, NewKpi, NewPeriod, NewSection, Period, Section},
    change::{ChangeQuery, ChangeRecord},
    store::{KpiQuery, PeriodQuery, ValueQuery},
    value::{KpiStatus, ValuePatch, version_matches},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("change log unavailable")]
  struct Unavailable;

  /// Keeps values in memory; optionally refuses every change record.
  #[derive(Default)]
  struct MemoryStore {
    values:     Mutex<HashMap<(Uuid, Uuid), KpiValue>>,
    changes:    Mutex<Vec<NewChange>>,
    fail_audit: bool,
  }

  impl KpiStore for MemoryStore {
    type Error = Unavailable;
    async fn add_period(&self, _: NewPeriod) -> Result<Period, Unavailable> { unimplemented!() }
    async fn get_period(&self, _: Uuid) -> Result<Option<Period>, Unavailable> { unimplemented!() }
    async fn list_periods(&self, _: &PeriodQuery) -> Result<Vec<Period>, Unavailable> { unimplemented!() }
    async fn add_section(&self, _: NewSection) -> Result<Section, Unavailable> { unimplemented!() }
    async fn list_sections(&self, _: bool) -> Result<Vec<Section>, Unavailable> { unimplemented!() }
    async fn add_kpi(&self, _: NewKpi) -> Result<Kpi, Unavailable> { unimplemented!() }
    async fn get_kpi(&self, _: Uuid) -> Result<Option<Kpi>, Unavailable> { unimplemented!() }
    async fn list_kpis(&self, _: &KpiQuery) -> Result<Vec<Kpi>, Unavailable> { unimplemented!() }
    async fn set_kpi_active(&self, _: Uuid, _: bool) -> Result<Option<Kpi>, Unavailable> { unimplemented!() }
    async fn list_values(&self, _: &ValueQuery) -> Result<Vec<KpiValue>, Unavailable> { unimplemented!() }
    async fn list_changes(&self, _: &ChangeQuery) -> Result<Vec<ChangeRecord>, Unavailable> { unimplemented!() }

    async fn get_value(&self, kpi_id: Uuid, period_id: Uuid) -> Result<Option<KpiValue>, Unavailable> {
      Ok(self.values.lock().unwrap().get(&(kpi_id, period_id)).cloned())
    }

    async fn upsert_value(&self, write: ValueWrite) -> Result<UpsertOutcome, Unavailable> {
      let mut values = self.values.lock().unwrap();
      let key = (write.kpi_id, write.period_id);
      let existing = values.get(&key).cloned();
      if !version_matches(existing.as_ref(), write.expected_version) {
        return Ok(UpsertOutcome::Conflict { current: existing });
      }
      let fields = write.patch.apply(existing.as_ref());
      let now = Utc::now();
      let outcome = match existing {
        None => UpsertOutcome::Created(KpiValue {
          value_id: Uuid::new_v4(),
          kpi_id: write.kpi_id,
          period_id: write.period_id,
          status: fields.status,
          numeric_value: fields.numeric_value,
          text_value: fields.text_value,
          evidence_ref: fields.evidence_ref,
          version: 1,
          created_at: now,
          updated_at: now,
        }),
        Some(previous) => {
          let current = KpiValue {
            status: fields.status,
            numeric_value: fields.numeric_value,
            text_value: fields.text_value,
            evidence_ref: fields.evidence_ref,
            version: previous.version + 1,
            updated_at: now,
            ..previous.clone()
          };
          UpsertOutcome::Updated { previous, current }
        }
      };
      if let Some(v) = outcome.value() {
        values.insert(key, v.clone());
      }
      Ok(outcome)
    }

    async fn append_change(&self, input: NewChange) -> Result<ChangeRecord, Unavailable> {
      if self.fail_audit {
        return Err(Unavailable);
      }
      self.changes.lock().unwrap().push(input.clone());
      Ok(ChangeRecord {
        change_id:   Uuid::new_v4(),
        entity:      input.entity,
        entity_id:   input.entity_id,
        field:       input.field,
        old_value:   input.old_value,
        new_value:   input.new_value,
        changed_by:  input.changed_by,
        changed_at:  Utc::now(),
        reason:      input.reason,
        source_page: input.source_page,
      })
    }
  }

  fn ctx() -> UpdateContext {
    UpdateContext {
      actor: "alice".into(),
      kpi_name: Some("Incident Reports".into()),
      period_label: Some("Mar 2025".into()),
      source_page: Some("/grid".into()),
      ..UpdateContext::default()
    }
  }

  #[tokio::test]
  async fn create_then_update_appends_one_record_each() {
    let store = MemoryStore::default();
    let (kpi, period) = (Uuid::new_v4(), Uuid::new_v4());

    let created = submit_value(&store, ValueWrite::new(kpi, period, ValuePatch::text("3")), &ctx())
      .await
      .unwrap();
    assert!(matches!(created, UpsertOutcome::Created(ref v) if v.version == 1));

    submit_value(&store, ValueWrite::new(kpi, period, ValuePatch::status(KpiStatus::Done)), &ctx())
      .await
      .unwrap();

    let changes = store.changes.lock().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].field, "kpi_create");
    assert!(changes[0].old_value.is_none());
    assert_eq!(changes[0].changed_by, "alice");
    assert_eq!(
      changes[0].reason.as_deref(),
      Some("Created new KPI value for \"Incident Reports\" in period \"Mar 2025\"")
    );

    assert_eq!(changes[1].field, "kpi_update");
    let old = changes[1].old_value.as_ref().unwrap();
    assert_eq!(old["status"], "not_started");
    let new = changes[1].new_value.as_ref().unwrap();
    assert_eq!(new["status"], "done");
    assert_eq!(new["numeric_value"], 3.0);
  }

  #[tokio::test]
  async fn audit_failure_does_not_fail_the_write() {
    let store = MemoryStore { fail_audit: true, ..MemoryStore::default() };
    let (kpi, period) = (Uuid::new_v4(), Uuid::new_v4());

    let outcome = submit_value(&store, ValueWrite::new(kpi, period, ValuePatch::text("42")), &ctx())
      .await
      .unwrap();
    assert_eq!(outcome.value().unwrap().numeric_value, Some(42.0));

    let stored = store.get_value(kpi, period).await.unwrap().unwrap();
    assert_eq!(stored.numeric_value, Some(42.0));
  }

  #[tokio::test]
  async fn conflict_writes_nothing_and_is_not_audited() {
    let store = MemoryStore::default();
    let (kpi, period) = (Uuid::new_v4(), Uuid::new_v4());
    submit_value(&store, ValueWrite::new(kpi, period, ValuePatch::text("1")), &ctx())
      .await
      .unwrap();

    let stale = ValueWrite::new(kpi, period, ValuePatch::text("2")).expecting(7);
    let outcome = submit_value(&store, stale, &ctx()).await.unwrap();
    assert!(outcome.is_conflict());

    let stored = store.get_value(kpi, period).await.unwrap().unwrap();
    assert_eq!(stored.text_value.as_deref(), Some("1"));
    assert_eq!(stored.version, 1);
    assert_eq!(store.changes.lock().unwrap().len(), 1);
  }

  #[test]
  fn explicit_reason_overrides_generated_one() {
    let now = Utc::now();
    let value = KpiValue {
      value_id: Uuid::new_v4(),
      kpi_id: Uuid::new_v4(),
      period_id: Uuid::new_v4(),
      status: KpiStatus::Done,
      numeric_value: None,
      text_value: None,
      evidence_ref: None,
      version: 1,
      created_at: now,
      updated_at: now,
    };
    let ctx = UpdateContext { reason: Some("month-end review".into()), ..ctx() };
    let change = audit_entry(&UpsertOutcome::Created(value), &ctx).unwrap();
    assert_eq!(change.reason.as_deref(), Some("month-end review"));
    assert_eq!(change.entity, VALUE_ENTITY);
  }
}
