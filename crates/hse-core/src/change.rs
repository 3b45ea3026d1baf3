//! Change log — an append-only audit trail of value mutations.
//!
//! Change records are advisory. They are written after the mutation they
//! describe, and a failure to write one never rolls back that mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
  pub change_id:   Uuid,
  /// Table-level entity name, e.g. `"kpi_value"`.
  pub entity:      String,
  pub entity_id:   Uuid,
  /// What kind of change, e.g. `"kpi_create"` or `"kpi_update"`.
  pub field:       String,
  pub old_value:   Option<serde_json::Value>,
  pub new_value:   Option<serde_json::Value>,
  /// Opaque acting-user id supplied by the authentication layer.
  pub changed_by:  String,
  pub changed_at:  DateTime<Utc>,
  pub reason:      Option<String>,
  /// UI location the change originated from, e.g. `"/grid"`.
  pub source_page: Option<String>,
}

/// Input to [`crate::store::KpiStore::append_change`].
/// `change_id` and `changed_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChange {
  pub entity:      String,
  pub entity_id:   Uuid,
  pub field:       String,
  pub old_value:   Option<serde_json::Value>,
  pub new_value:   Option<serde_json::Value>,
  pub changed_by:  String,
  pub reason:      Option<String>,
  pub source_page: Option<String>,
}

/// Parameters for [`crate::store::KpiStore::list_changes`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeQuery {
  pub entity_id: Option<Uuid>,
  pub limit:     Option<usize>,
}
