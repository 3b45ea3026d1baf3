//! The monitoring-plan sheet layout, independent of any file format.
//!
//! The layout follows the contractor template: a three-row title block, a
//! column-header row, one label row per section followed by its KPI rows, and
//! a fixed block of summary rows that is not derived from the catalog.

use chrono::Datelike;
use hse_core::{
  catalog::month_abbreviation,
  grid::{Grid, GridCell, project},
  store::{KpiQuery, KpiStore, PeriodQuery, ValueQuery},
};
use serde::Deserialize;

use crate::{Error, Result};

/// Column of `Jan-YY`; the other months follow it.
pub const FIRST_MONTH_COLUMN: usize = 5;
/// Columns in a full row: five leading columns, twelve months, measurement.
pub const COLUMN_COUNT: usize = FIRST_MONTH_COLUMN + 12 + 1;

// ─── Options ─────────────────────────────────────────────────────────────────

/// Free-text fields of the title block and the year used in month labels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
  pub year:            i32,
  pub title:           String,
  pub contractor_name: String,
  pub contract_holder: String,
}

impl Default for ExportOptions {
  fn default() -> Self {
    Self {
      year:            2025,
      title:           "2025 HSE Monitoring Plan".to_string(),
      contractor_name: "Black Gold Integrated Solution PDO Nimr".to_string(),
      contract_holder: "Al Salti Anwar, UPKC1".to_string(),
    }
  }
}

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PlanCell {
  Blank,
  Text(String),
  Number(f64),
}

impl PlanCell {
  fn text(s: impl Into<String>) -> Self {
    let s = s.into();
    if s.is_empty() { Self::Blank } else { Self::Text(s) }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      _ => None,
    }
  }
}

static BLANK: PlanCell = PlanCell::Blank;

/// What a row holds; the renderer styles rows by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
  Title,
  ColumnHeader,
  Section,
  Kpi,
  Spacer,
  SummaryHeader,
  Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRow {
  pub kind:  RowKind,
  pub cells: Vec<PlanCell>,
}

impl PlanRow {
  fn new<I, S>(kind: RowKind, cells: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self { kind, cells: cells.into_iter().map(PlanCell::text).collect() }
  }

  pub fn cell(&self, column: usize) -> &PlanCell {
    self.cells.get(column).unwrap_or(&BLANK)
  }
}

/// The full sheet as rows of cells, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringPlan {
  pub rows: Vec<PlanRow>,
}

impl MonitoringPlan {
  /// The KPI row whose first column is `code`.
  pub fn kpi_row(&self, code: &str) -> Option<&PlanRow> {
    self
      .rows
      .iter()
      .find(|r| r.kind == RowKind::Kpi && r.cell(0).as_text() == Some(code))
  }
}

// ─── Cell values ─────────────────────────────────────────────────────────────

/// The value a grid cell contributes to its month column: the number when
/// present, otherwise the status name. Cells with no stored record are blank.
///
/// A recorded cell always has a status, so its text value is never shown
/// here. [`GridCell::grid_display`] ranks the text value first instead.
pub fn export_cell_value(cell: &GridCell) -> PlanCell {
  if !cell.is_recorded() {
    return PlanCell::Blank;
  }
  match cell.numeric_value {
    Some(n) => PlanCell::Number(n),
    None => PlanCell::Text(cell.status.to_string()),
  }
}

/// `Jan-25` style label for a zero-based month.
pub fn month_label(month0: u32, year: i32) -> String {
  format!("{}-{:02}", month_abbreviation(month0), year.rem_euclid(100))
}

// ─── Assembly ────────────────────────────────────────────────────────────────

const SUMMARY_HEADER: [&str; 17] = [
  "10",
  "HSE KPI - add as necessary in agreement with CH",
  "2024 Actual",
  "2025 Target",
  "",
  "Contractor",
  "Contractor",
  "Name",
  "Name",
  "Sign",
  "Sign",
  "Sign",
  "Sign",
  "Date",
  "Date",
  "",
  "",
];

const SUMMARY_ROWS: [[&str; 4]; 10] = [
  ["10.1", "Lost time Injury - LTI (Number)", "Zero", "Zero"],
  ["10.2", "Total Recordable Cases - TRC (Number)", "Zero", "Zero"],
  ["10.3", "Motor Vehicle Incidents - MVI (Number)", "Zero", "Zero"],
  [
    "10.4",
    "Road Safety LSR Violations - Frequency per 1 Million Km Driven",
    "Zero",
    "Zero",
  ],
  ["10.5", "Fatality", "Zero", "Zero"],
  ["10.6", "SIF (Serious Injury and Fatality)", "Zero", "Zero"],
  [
    "10.7",
    "NM reporting (serves as a leading indicator to strengthen the reporting culture)",
    "5",
    "12",
  ],
  ["10.9", "Environmental Incidents", "Zero", "Zero"],
  ["10.10", "NCR Closeout Status (%)", "100%", "100%"],
  ["10.11", "HSE Monitoring Plan Compliance (%)", "100%", "100%"],
];

fn title_row(text: String) -> PlanRow {
  PlanRow::new(RowKind::Title, ["".to_string(), "".to_string(), text])
}

fn column_headers(year: i32) -> PlanRow {
  let mut cells: Vec<String> = ["#", "Actions", "ACTION OWNER", "Action Party", "Target/ Frequency"]
    .into_iter()
    .map(str::to_owned)
    .collect();
  cells.extend((0..12).map(|m| month_label(m, year)));
  cells.push("Measurement".to_owned());
  PlanRow::new(RowKind::ColumnHeader, cells)
}

/// Lay out `grid` as a monitoring plan.
///
/// Each recorded cell lands in the month column of its period's start date,
/// whatever the period's year. Cells are visited in period order, so when two
/// periods share a month the later one wins.
pub fn build_plan(grid: &Grid, options: &ExportOptions) -> Result<MonitoringPlan> {
  if grid.kpi_count() == 0 {
    return Err(Error::NoKpis);
  }

  let mut rows = vec![
    title_row(options.title.clone()),
    title_row(format!("Contractor Name: {}", options.contractor_name)),
    title_row(format!("PDO Contract Holder: {}", options.contract_holder)),
    column_headers(options.year),
  ];

  for (index, group) in grid.sections.iter().enumerate() {
    rows.push(PlanRow::new(RowKind::Section, [
      (index + 1).to_string(),
      group.section.name.clone(),
    ]));

    for row in &group.rows {
      let kpi = &row.kpi;
      let mut months = vec![PlanCell::Blank; 12];
      for (period, cell) in grid.periods.iter().zip(&row.cells) {
        if cell.is_recorded() {
          months[period.start_date.month0() as usize] = export_cell_value(cell);
        }
      }

      let mut cells = vec![
        PlanCell::text(kpi.code.as_str()),
        PlanCell::text(kpi.name.as_str()),
        PlanCell::text(kpi.owner_user_id.clone().unwrap_or_default()),
        PlanCell::Blank,
        PlanCell::text(kpi.target_formula.clone().unwrap_or_default()),
      ];
      cells.extend(months);
      cells.push(PlanCell::text(kpi.unit.clone().unwrap_or_default()));
      rows.push(PlanRow { kind: RowKind::Kpi, cells });
    }
  }

  rows.push(PlanRow { kind: RowKind::Spacer, cells: Vec::new() });
  rows.push(PlanRow::new(RowKind::SummaryHeader, SUMMARY_HEADER));
  rows.extend(SUMMARY_ROWS.iter().map(|r| PlanRow::new(RowKind::Summary, *r)));

  Ok(MonitoringPlan { rows })
}

/// Fetch active KPIs, active sections, every value and every period, then
/// lay them out. Any fetch failure aborts the export.
pub async fn load_plan<S: KpiStore>(store: &S, options: &ExportOptions) -> Result<MonitoringPlan> {
  let kpis = store
    .list_kpis(&KpiQuery::default())
    .await
    .map_err(Error::store)?;
  if kpis.is_empty() {
    return Err(Error::NoKpis);
  }

  let sections = store.list_sections(false).await.map_err(Error::store)?;
  let values = store
    .list_values(&ValueQuery::default())
    .await
    .map_err(Error::store)?;
  let periods = store
    .list_periods(&PeriodQuery { include_inactive: true, ..PeriodQuery::default() })
    .await
    .map_err(Error::store)?;

  tracing::debug!(
    kpis = kpis.len(),
    values = values.len(),
    periods = periods.len(),
    "building monitoring plan"
  );

  let grid = project(&periods, &sections, &kpis, &values);
  build_plan(&grid, options)
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, NaiveDate, Utc};
  use hse_core::{
    catalog::{Kpi, Period, PeriodType, Section},
    value::{KpiStatus, KpiValue},
  };
  use uuid::Uuid;

  use super::*;

  fn ts() -> DateTime<Utc> { DateTime::<Utc>::UNIX_EPOCH }

  fn period(year: i32, month: u32) -> Period {
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    Period {
      period_id: Uuid::new_v4(),
      period_type: PeriodType::Monthly,
      year,
      month: Some(month),
      quarter: None,
      start_date: start,
      end_date: start,
      label: format!("{month}/{year}"),
      is_active: true,
      created_at: ts(),
    }
  }

  fn kpi(section: &Section, code: &str) -> Kpi {
    Kpi {
      kpi_id: Uuid::new_v4(),
      section_id: section.section_id,
      code: code.into(),
      name: format!("KPI {code}"),
      description: None,
      owner_user_id: Some("hse-lead".into()),
      target_formula: Some("Monthly".into()),
      unit: Some("Number".into()),
      is_active: true,
      created_at: ts(),
      updated_at: ts(),
    }
  }

  fn value(kpi: &Kpi, period: &Period, status: KpiStatus, numeric: Option<f64>) -> KpiValue {
    KpiValue {
      value_id: Uuid::new_v4(),
      kpi_id: kpi.kpi_id,
      period_id: period.period_id,
      status,
      numeric_value: numeric,
      text_value: numeric.map(|n| n.to_string()),
      evidence_ref: None,
      version: 1,
      created_at: ts(),
      updated_at: ts(),
    }
  }

  fn safety() -> Section {
    Section {
      name: "Safety".into(),
      code: "SAF".into(),
      order_idx: 1,
      is_active: true,
      ..Section::unknown(Uuid::new_v4())
    }
  }

  #[test]
  fn header_block_and_month_labels() {
    let section = safety();
    let k = kpi(&section, "1.1");
    let grid = project(&[], &[section], &[k], &[]);
    let plan = build_plan(&grid, &ExportOptions::default()).unwrap();

    assert_eq!(plan.rows[0].cell(2).as_text(), Some("2025 HSE Monitoring Plan"));
    assert_eq!(
      plan.rows[1].cell(2).as_text(),
      Some("Contractor Name: Black Gold Integrated Solution PDO Nimr")
    );
    assert_eq!(
      plan.rows[2].cell(2).as_text(),
      Some("PDO Contract Holder: Al Salti Anwar, UPKC1")
    );

    let header = &plan.rows[3];
    assert_eq!(header.kind, RowKind::ColumnHeader);
    assert_eq!(header.cells.len(), COLUMN_COUNT);
    assert_eq!(header.cell(4).as_text(), Some("Target/ Frequency"));
    assert_eq!(header.cell(FIRST_MONTH_COLUMN).as_text(), Some("Jan-25"));
    assert_eq!(header.cell(FIRST_MONTH_COLUMN + 11).as_text(), Some("Dec-25"));
    assert_eq!(header.cell(COLUMN_COUNT - 1).as_text(), Some("Measurement"));

    assert_eq!(plan.rows[4].kind, RowKind::Section);
    assert_eq!(plan.rows[4].cell(0).as_text(), Some("1"));
    assert_eq!(plan.rows[4].cell(1).as_text(), Some("Safety"));

    let row = plan.kpi_row("1.1").unwrap();
    assert_eq!(row.cell(2).as_text(), Some("hse-lead"));
    assert_eq!(row.cell(3), &PlanCell::Blank);
    assert_eq!(row.cell(4).as_text(), Some("Monthly"));
    assert_eq!(row.cell(COLUMN_COUNT - 1).as_text(), Some("Number"));
  }

  #[test]
  fn april_lands_in_fourth_month_column_for_any_year() {
    let section = safety();
    let k = kpi(&section, "1.1");
    let april_2023 = period(2023, 4);
    let v = value(&k, &april_2023, KpiStatus::Done, Some(7.0));
    let grid = project(&[april_2023], &[section], &[k], &[v]);
    let plan = build_plan(&grid, &ExportOptions::default()).unwrap();

    let row = plan.kpi_row("1.1").unwrap();
    assert_eq!(row.cell(FIRST_MONTH_COLUMN + 3).as_number(), Some(7.0));
    let filled = row.cells[FIRST_MONTH_COLUMN..FIRST_MONTH_COLUMN + 12]
      .iter()
      .filter(|c| **c != PlanCell::Blank)
      .count();
    assert_eq!(filled, 1);
  }

  #[test]
  fn later_period_wins_a_shared_month() {
    let section = safety();
    let k = kpi(&section, "1.1");
    let (jan_24, jan_25) = (period(2024, 1), period(2025, 1));
    let values = [
      value(&k, &jan_24, KpiStatus::Done, Some(1.0)),
      value(&k, &jan_25, KpiStatus::Done, Some(2.0)),
    ];
    let grid = project(&[jan_24, jan_25], &[section], &[k], &values);
    let plan = build_plan(&grid, &ExportOptions::default()).unwrap();
    assert_eq!(plan.kpi_row("1.1").unwrap().cell(FIRST_MONTH_COLUMN).as_number(), Some(2.0));
  }

  #[test]
  fn numeric_beats_status_and_status_beats_text() {
    let section = safety();
    let k = kpi(&section, "1.1");
    let p = period(2025, 3);

    let numeric = GridCell::from_value(&value(&k, &p, KpiStatus::Done, Some(3.0)));
    assert_eq!(export_cell_value(&numeric), PlanCell::Number(3.0));

    let text_only = GridCell {
      text_value: Some("N/A".into()),
      ..GridCell::from_value(&value(&k, &p, KpiStatus::Blocked, None))
    };
    assert_eq!(export_cell_value(&text_only), PlanCell::Text("blocked".into()));
    assert_eq!(text_only.grid_display(), "N/A");

    assert_eq!(export_cell_value(&GridCell::empty(p.period_id)), PlanCell::Blank);
  }

  #[test]
  fn trailing_summary_block() {
    let section = safety();
    let grid = project(&[], &[section.clone()], &[kpi(&section, "1.1")], &[]);
    let plan = build_plan(&grid, &ExportOptions::default()).unwrap();

    let tail = &plan.rows[plan.rows.len() - 12..];
    assert_eq!(tail[0].kind, RowKind::Spacer);
    assert_eq!(tail[1].cell(1).as_text(), Some("HSE KPI - add as necessary in agreement with CH"));
    assert_eq!(tail[1].cell(13).as_text(), Some("Date"));
    assert_eq!(tail[2].cell(0).as_text(), Some("10.1"));
    assert_eq!(tail[8].cell(2).as_text(), Some("5"));
    assert_eq!(tail[8].cell(3).as_text(), Some("12"));
    assert_eq!(tail[11].cell(0).as_text(), Some("10.11"));
    assert_eq!(tail[11].cell(3).as_text(), Some("100%"));
  }

  #[test]
  fn kpis_without_a_known_section_are_grouped_last() {
    let section = safety();
    let orphan = Kpi { section_id: Uuid::new_v4(), ..kpi(&section, "0.1") };
    let grid = project(&[], &[section.clone()], &[kpi(&section, "1.1"), orphan], &[]);
    let plan = build_plan(&grid, &ExportOptions::default()).unwrap();

    let labels: Vec<_> = plan
      .rows
      .iter()
      .filter(|r| r.kind == RowKind::Section)
      .map(|r| (r.cell(0).as_text(), r.cell(1).as_text()))
      .collect();
    assert_eq!(labels, [(Some("1"), Some("Safety")), (Some("2"), Some("Unknown Section"))]);
  }

  #[test]
  fn empty_catalog_is_an_error() {
    let grid = project(&[], &[], &[], &[]);
    assert!(matches!(build_plan(&grid, &ExportOptions::default()), Err(Error::NoKpis)));
  }

  #[test]
  fn month_labels_use_two_digit_years() {
    assert_eq!(month_label(0, 2025), "Jan-25");
    assert_eq!(month_label(8, 2007), "Sep-07");
  }
}
