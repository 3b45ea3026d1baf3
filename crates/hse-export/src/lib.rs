//! Spreadsheet export of the HSE monitoring plan.
//!
//! [`load_plan`] joins the catalogs and values into a [`MonitoringPlan`]
//! (a plain row/cell layout), and [`render_xlsx`] serialises that layout into
//! an `.xlsx` workbook.

pub mod error;
pub mod layout;
pub mod render;

pub use error::{Error, Result};
pub use layout::{ExportOptions, MonitoringPlan, PlanCell, export_cell_value, load_plan};
pub use render::{file_name, render_xlsx};

use hse_core::store::KpiStore;

/// Load the plan from `store` and render it in one step.
pub async fn export_xlsx<S: KpiStore>(store: &S, options: &ExportOptions) -> Result<Vec<u8>> {
  let plan = load_plan(store, options).await?;
  render_xlsx(&plan)
}
