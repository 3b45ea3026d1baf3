//! Grid projection — the dense KPI × period matrix.
//!
//! The projection joins the period, section and KPI catalogs with the stored
//! values. Every (KPI, period) pair yields a cell: pairs without a stored
//! value become empty `not_started` cells. Projecting is pure; the same inputs
//! always produce an equal [`Grid`].

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  catalog::{Kpi, Period, PeriodType, Section},
  store::{KpiQuery, KpiStore, PeriodQuery, ValueQuery},
  value::{KpiStatus, KpiValue},
};

// ─── Cells and rows ──────────────────────────────────────────────────────────

/// One cell of the grid, backed by a stored value or synthesised empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
  pub period_id:     Uuid,
  /// `None` for a synthesised cell with no stored record.
  pub value_id:      Option<Uuid>,
  pub status:        KpiStatus,
  pub numeric_value: Option<f64>,
  pub text_value:    Option<String>,
  pub evidence_ref:  Option<String>,
  /// 0 for a synthesised cell. Pass this back as the expected version.
  pub version:       u32,
}

impl GridCell {
  pub fn empty(period_id: Uuid) -> Self {
    Self {
      period_id,
      value_id: None,
      status: KpiStatus::NotStarted,
      numeric_value: None,
      text_value: None,
      evidence_ref: None,
      version: 0,
    }
  }

  pub fn from_value(value: &KpiValue) -> Self {
    Self {
      period_id:     value.period_id,
      value_id:      Some(value.value_id),
      status:        value.status,
      numeric_value: value.numeric_value,
      text_value:    value.text_value.clone(),
      evidence_ref:  value.evidence_ref.clone(),
      version:       value.version,
    }
  }

  pub fn is_recorded(&self) -> bool { self.value_id.is_some() }

  /// The value shown in an interactive grid cell: text first, then the
  /// number, else empty. The spreadsheet export ranks these differently.
  pub fn grid_display(&self) -> String {
    match (&self.text_value, self.numeric_value) {
      (Some(text), _) if !text.is_empty() => text.clone(),
      (_, Some(n)) => n.to_string(),
      _ => String::new(),
    }
  }
}

/// One KPI with a cell per period, in period order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
  pub kpi:   Kpi,
  pub cells: Vec<GridCell>,
}

/// The rows of one section, in KPI code order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionGroup {
  pub section: Section,
  pub rows:    Vec<GridRow>,
}

/// The full projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
  pub periods:  Vec<Period>,
  pub sections: Vec<SectionGroup>,
}

impl Grid {
  pub fn rows(&self) -> impl Iterator<Item = &GridRow> {
    self.sections.iter().flat_map(|g| g.rows.iter())
  }

  pub fn kpi_count(&self) -> usize { self.sections.iter().map(|g| g.rows.len()).sum() }

  pub fn row(&self, kpi_id: Uuid) -> Option<&GridRow> {
    self.rows().find(|r| r.kpi.kpi_id == kpi_id)
  }

  pub fn cell(&self, kpi_id: Uuid, period_id: Uuid) -> Option<&GridCell> {
    self
      .row(kpi_id)?
      .cells
      .iter()
      .find(|c| c.period_id == period_id)
  }
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Join the catalogs with `values` into a dense [`Grid`].
///
/// Periods keep the given order. Sections are ordered by `order_idx` and KPIs
/// by `code`; KPIs whose section is not in `sections` are grouped under
/// [`Section::unknown`] after all known sections. Sections with no KPIs are
/// omitted.
pub fn project(
  periods: &[Period],
  sections: &[Section],
  kpis: &[Kpi],
  values: &[KpiValue],
) -> Grid {
  let index: HashMap<(Uuid, Uuid), &KpiValue> =
    values.iter().map(|v| (v.key(), v)).collect();

  let mut ordered_kpis: Vec<&Kpi> = kpis.iter().collect();
  ordered_kpis.sort_by(|a, b| a.code.cmp(&b.code));

  let mut groups: Vec<SectionGroup> = Vec::new();
  let mut group_of: HashMap<Uuid, usize> = HashMap::new();

  for kpi in ordered_kpis {
    let cells = periods
      .iter()
      .map(|p| match index.get(&(kpi.kpi_id, p.period_id)) {
        Some(v) => GridCell::from_value(v),
        None => GridCell::empty(p.period_id),
      })
      .collect();

    let slot = *group_of.entry(kpi.section_id).or_insert_with(|| {
      let section = sections
        .iter()
        .find(|s| s.section_id == kpi.section_id)
        .cloned()
        .unwrap_or_else(|| Section::unknown(kpi.section_id));
      groups.push(SectionGroup { section, rows: Vec::new() });
      groups.len() - 1
    });
    groups[slot].rows.push(GridRow { kpi: kpi.clone(), cells });
  }

  // Placeholder groups trail every catalog section whatever its order index.
  // Stable: sections sharing a key keep first-seen order.
  groups.sort_by_key(|g| {
    let known = sections.iter().any(|s| s.section_id == g.section.section_id);
    (!known, g.section.order_idx)
  });

  Grid { periods: periods.to_vec(), sections: groups }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Which slice of the grid to load.
#[derive(Debug, Clone, Deserialize)]
pub struct GridQuery {
  pub year:        Option<i32>,
  #[serde(default = "GridQuery::default_period_type")]
  pub period_type: PeriodType,
  pub section_id:  Option<Uuid>,
  pub from:        Option<NaiveDate>,
  pub to:          Option<NaiveDate>,
}

impl GridQuery {
  fn default_period_type() -> PeriodType { PeriodType::Monthly }

  pub fn year(year: i32) -> Self { Self { year: Some(year), ..Self::default() } }
}

impl Default for GridQuery {
  fn default() -> Self {
    Self {
      year:        None,
      period_type: PeriodType::Monthly,
      section_id:  None,
      from:        None,
      to:          None,
    }
  }
}

/// The reference data of one grid slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
  pub periods:  Vec<Period>,
  pub sections: Vec<Section>,
  pub kpis:     Vec<Kpi>,
}

impl Catalog {
  /// Load the active periods, sections and KPIs selected by `query`, one
  /// round trip each.
  pub async fn load<S: KpiStore>(store: &S, query: &GridQuery) -> Result<Self, S::Error> {
    let periods = store
      .list_periods(&PeriodQuery {
        year:             query.year,
        period_type:      Some(query.period_type),
        from:             query.from,
        to:               query.to,
        include_inactive: false,
      })
      .await?;

    let mut sections = store.list_sections(true).await?;
    if let Some(id) = query.section_id {
      sections.retain(|s| s.section_id == id);
    }

    let kpis = store
      .list_kpis(&KpiQuery { section_id: query.section_id, include_inactive: false })
      .await?;

    Ok(Self { periods, sections, kpis })
  }

  /// The value query bounded to this slice.
  pub fn value_query(&self) -> ValueQuery {
    ValueQuery {
      kpi_ids:    Some(self.kpis.iter().map(|k| k.kpi_id).collect()),
      period_ids: Some(self.periods.iter().map(|p| p.period_id).collect()),
    }
  }

  pub fn project(&self, values: &[KpiValue]) -> Grid {
    project(&self.periods, &self.sections, &self.kpis, values)
  }

  /// Fetch this slice's values and project them.
  pub async fn load_grid<S: KpiStore>(&self, store: &S) -> Result<Grid, S::Error> {
    let values = store.list_values(&self.value_query()).await?;
    Ok(self.project(&values))
  }
}

/// Load the catalog slice for `query`, its values, and project them.
pub async fn load_grid<S: KpiStore>(store: &S, query: &GridQuery) -> Result<Grid, S::Error> {
  Catalog::load(store, query).await?.load_grid(store).await
}
