//! `.xlsx` serialisation of a [`MonitoringPlan`].

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};

use crate::{
  Result,
  layout::{MonitoringPlan, PlanCell, RowKind},
};

pub const SHEET_NAME: &str = "HSE Monitoring Plan";

/// Widths of `#`, `Actions`, `ACTION OWNER`, `Action Party` and
/// `Target/ Frequency`; the month columns follow at [`MONTH_WIDTH`].
const LEADING_WIDTHS: [f64; 5] = [5.0, 60.0, 20.0, 15.0, 20.0];
const MONTH_WIDTH: f64 = 10.0;
const MEASUREMENT_WIDTH: f64 = 25.0;

const HEADER_FILL: u32 = 0xE6E6FA;

/// Download name for an export produced on `date`.
pub fn file_name(date: NaiveDate) -> String {
  format!("HSE_Monitoring_Plan_{}.xlsx", date.format("%Y-%m-%d"))
}

fn set_widths(sheet: &mut Worksheet) -> Result<()> {
  let widths = LEADING_WIDTHS
    .into_iter()
    .chain(std::iter::repeat_n(MONTH_WIDTH, 12))
    .chain([MEASUREMENT_WIDTH]);
  for (col, width) in widths.enumerate() {
    sheet.set_column_width(col as u16, width)?;
  }
  Ok(())
}

/// Serialise `plan` to an in-memory workbook.
pub fn render_xlsx(plan: &MonitoringPlan) -> Result<Vec<u8>> {
  let header = Format::new()
    .set_bold()
    .set_background_color(Color::RGB(HEADER_FILL));
  let bold = Format::new().set_bold();
  let plain = Format::new();

  let mut workbook = Workbook::new();
  let sheet = workbook.add_worksheet().set_name(SHEET_NAME)?;
  set_widths(sheet)?;

  for (r, row) in plan.rows.iter().enumerate() {
    let format = match row.kind {
      RowKind::ColumnHeader => &header,
      RowKind::Title | RowKind::Section | RowKind::SummaryHeader => &bold,
      RowKind::Kpi | RowKind::Spacer | RowKind::Summary => &plain,
    };

    for (c, cell) in row.cells.iter().enumerate() {
      let (r, c) = (r as u32, c as u16);
      match cell {
        PlanCell::Blank => {}
        PlanCell::Text(s) => {
          sheet.write_string_with_format(r, c, s, format)?;
        }
        PlanCell::Number(n) => {
          sheet.write_number_with_format(r, c, *n, format)?;
        }
      }
    }
  }

  let bytes = workbook.save_to_buffer()?;
  tracing::info!(rows = plan.rows.len(), bytes = bytes.len(), "rendered monitoring plan");
  Ok(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_name_uses_iso_date() {
    let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    assert_eq!(file_name(date), "HSE_Monitoring_Plan_2025-03-09.xlsx");
  }
}
