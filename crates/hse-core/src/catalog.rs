//! Reference data: reporting periods, sections and KPIs.
//!
//! Catalog rows are created by administrative seeding and are effectively
//! immutable from an end user's perspective. KPIs are never deleted; they are
//! soft-deactivated through their `is_active` flag.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Periods ─────────────────────────────────────────────────────────────────

/// Granularity of a reporting period.
#[derive(
  Debug,
  Clone,
  Copy,
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
pub enum PeriodType {
  Monthly,
  Quarterly,
  Yearly,
}

/// A fixed reporting interval against which KPI values are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
  pub period_id:   Uuid,
  pub period_type: PeriodType,
  pub year:        i32,
  /// Calendar month (1-12) for monthly periods.
  pub month:       Option<u32>,
  /// Quarter (1-4) for quarterly periods.
  pub quarter:     Option<u32>,
  pub start_date:  NaiveDate,
  pub end_date:    NaiveDate,
  pub label:       String,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::KpiStore::add_period`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPeriod {
  pub period_type: PeriodType,
  pub year:        i32,
  #[serde(default)]
  pub month:       Option<u32>,
  #[serde(default)]
  pub quarter:     Option<u32>,
  pub start_date:  NaiveDate,
  pub end_date:    NaiveDate,
  pub label:       String,
}

const MONTH_ABBREVIATIONS: [&str; 12] = [
  "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov",
  "Dec",
];

/// Three-letter English abbreviation for a zero-based month index.
pub fn month_abbreviation(month0: u32) -> &'static str {
  MONTH_ABBREVIATIONS[(month0 % 12) as usize]
}

/// Build the twelve monthly periods of `year`, labelled `Jan 2025` … `Dec 2025`.
pub fn seed_monthly_periods(year: i32) -> Result<Vec<NewPeriod>> {
  (1..=12u32)
    .map(|month| {
      let start_date =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidYear(year))?;
      let (next_year, next_month) =
        if month == 12 { (year + 1, 1) } else { (year, month + 1) };
      let end_date = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or(Error::InvalidYear(year))?;

      Ok(NewPeriod {
        period_type: PeriodType::Monthly,
        year,
        month: Some(month),
        quarter: None,
        start_date,
        end_date,
        label: format!("{} {year}", month_abbreviation(start_date.month0())),
      })
    })
    .collect()
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// An organisational grouping of KPIs, ordered for display by `order_idx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
  pub section_id:  Uuid,
  pub name:        String,
  pub code:        String,
  pub description: Option<String>,
  pub order_idx:   i32,
  pub is_active:   bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Section {
  /// Placeholder used when a KPI references a section missing from the
  /// catalog. Sorts after every real section.
  pub fn unknown(section_id: Uuid) -> Self {
    Self {
      section_id,
      name: "Unknown Section".to_string(),
      code: "UNK".to_string(),
      description: None,
      order_idx: 999,
      is_active: false,
      created_at: DateTime::<Utc>::UNIX_EPOCH,
      updated_at: DateTime::<Utc>::UNIX_EPOCH,
    }
  }
}

/// Input to [`crate::store::KpiStore::add_section`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSection {
  pub name:        String,
  pub code:        String,
  #[serde(default)]
  pub description: Option<String>,
  pub order_idx:   i32,
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

/// A tracked indicator belonging to one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
  pub kpi_id:         Uuid,
  pub section_id:     Uuid,
  /// Human-readable identifier, e.g. `"1.3"`.
  pub code:           String,
  pub name:           String,
  pub description:    Option<String>,
  pub owner_user_id:  Option<String>,
  pub target_formula: Option<String>,
  pub unit:           Option<String>,
  pub is_active:      bool,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::KpiStore::add_kpi`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKpi {
  pub section_id:     Uuid,
  pub code:           String,
  pub name:           String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub owner_user_id:  Option<String>,
  #[serde(default)]
  pub target_formula: Option<String>,
  #[serde(default)]
  pub unit:           Option<String>,
}

impl NewKpi {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    section_id: Uuid,
    code: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      section_id,
      code: code.into(),
      name: name.into(),
      description: None,
      owner_user_id: None,
      target_formula: None,
      unit: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn monthly_periods_cover_the_year() {
    let periods = seed_monthly_periods(2025).unwrap();
    assert_eq!(periods.len(), 12);

    assert_eq!(periods[0].label, "Jan 2025");
    assert_eq!(periods[0].start_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    assert_eq!(periods[0].end_date, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());

    assert_eq!(periods[1].end_date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());

    let dec = &periods[11];
    assert_eq!(dec.label, "Dec 2025");
    assert_eq!(dec.month, Some(12));
    assert_eq!(dec.end_date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
  }

  #[test]
  fn leap_year_february_ends_on_29th() {
    let periods = seed_monthly_periods(2024).unwrap();
    assert_eq!(periods[1].end_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
  }

  #[test]
  fn period_type_strings() {
    assert_eq!(PeriodType::Monthly.to_string(), "monthly");
    assert_eq!("quarterly".parse::<PeriodType>().unwrap(), PeriodType::Quarterly);
    assert!("weekly".parse::<PeriodType>().is_err());
  }
}
