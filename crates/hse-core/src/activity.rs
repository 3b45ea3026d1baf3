//! Transient per-cell operation status.
//!
//! Tracks which grid cells are being saved and how the last save ended. This
//! is session state owned by whichever layer renders the grid; it is never
//! persisted and is independent of the stored [`crate::value::KpiValue`]s.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

/// A (KPI, period) grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CellKey {
  pub kpi_id:    Uuid,
  pub period_id: Uuid,
}

impl CellKey {
  pub fn new(kpi_id: Uuid, period_id: Uuid) -> Self { Self { kpi_id, period_id } }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellActivity {
  #[default]
  Idle,
  Saving,
  Succeeded,
  Failed { message: String },
}

/// Map of cells with a non-idle status.
#[derive(Debug, Default)]
pub struct ActivityBoard {
  cells: HashMap<CellKey, CellActivity>,
}

impl ActivityBoard {
  pub fn new() -> Self { Self::default() }

  /// Mark `key` as saving. Returns `false` if a save is already in flight.
  pub fn begin(&mut self, key: CellKey) -> bool {
    if self.status(key) == CellActivity::Saving {
      return false;
    }
    self.cells.insert(key, CellActivity::Saving);
    true
  }

  pub fn succeed(&mut self, key: CellKey) {
    self.cells.insert(key, CellActivity::Succeeded);
  }

  pub fn fail(&mut self, key: CellKey, message: impl Into<String>) {
    self
      .cells
      .insert(key, CellActivity::Failed { message: message.into() });
  }

  pub fn clear(&mut self, key: CellKey) { self.cells.remove(&key); }

  pub fn status(&self, key: CellKey) -> CellActivity {
    self.cells.get(&key).cloned().unwrap_or_default()
  }

  /// Every non-idle cell.
  pub fn snapshot(&self) -> Vec<(CellKey, CellActivity)> {
    self.cells.iter().map(|(k, v)| (*k, v.clone())).collect()
  }

  /// Every non-idle cell, after which finished cells (succeeded or failed)
  /// return to idle. Saves still in flight are kept.
  pub fn take_snapshot(&mut self) -> Vec<(CellKey, CellActivity)> {
    let snapshot = self.snapshot();
    self.cells.retain(|_, activity| *activity == CellActivity::Saving);
    snapshot
  }
}
