//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so they sort lexically. Calendar dates are `YYYY-MM-DD`. UUIDs are stored
//! as hyphenated lowercase strings; enums as their snake_case names.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use hse_core::{
  catalog::{Kpi, Period, PeriodType, Section},
  change::ChangeRecord,
  value::{KpiStatus, KpiValue},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_status(s: KpiStatus) -> &'static str { s.into() }

pub fn decode_status(s: &str) -> Result<KpiStatus> {
  s.parse()
    .map_err(|_| hse_core::Error::UnknownStatus(s.to_owned()).into())
}

pub fn encode_period_type(t: PeriodType) -> &'static str { t.into() }

pub fn decode_period_type(s: &str) -> Result<PeriodType> {
  s.parse()
    .map_err(|_| hse_core::Error::UnknownPeriodType(s.to_owned()).into())
}

// ─── JSON payloads ───────────────────────────────────────────────────────────

pub fn encode_json(v: Option<&serde_json::Value>) -> Option<String> {
  v.map(serde_json::Value::to_string)
}

pub fn decode_json(s: Option<&str>) -> Result<Option<serde_json::Value>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PERIOD_COLUMNS: &str = "period_id, period_type, year, month, quarter, \
   start_date, end_date, label, is_active, created_at";

/// Raw values read directly from a `period` row.
pub struct RawPeriod {
  pub period_id:   String,
  pub period_type: String,
  pub year:        i32,
  pub month:       Option<u32>,
  pub quarter:     Option<u32>,
  pub start_date:  String,
  pub end_date:    String,
  pub label:       String,
  pub is_active:   bool,
  pub created_at:  String,
}

impl RawPeriod {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_id:   row.get(0)?,
      period_type: row.get(1)?,
      year:        row.get(2)?,
      month:       row.get(3)?,
      quarter:     row.get(4)?,
      start_date:  row.get(5)?,
      end_date:    row.get(6)?,
      label:       row.get(7)?,
      is_active:   row.get(8)?,
      created_at:  row.get(9)?,
    })
  }

  pub fn into_period(self) -> Result<Period> {
    Ok(Period {
      period_id:   decode_uuid(&self.period_id)?,
      period_type: decode_period_type(&self.period_type)?,
      year:        self.year,
      month:       self.month,
      quarter:     self.quarter,
      start_date:  decode_date(&self.start_date)?,
      end_date:    decode_date(&self.end_date)?,
      label:       self.label,
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const SECTION_COLUMNS: &str =
  "section_id, name, code, description, order_idx, is_active, created_at, updated_at";

/// Raw values read directly from a `section` row.
pub struct RawSection {
  pub section_id:  String,
  pub name:        String,
  pub code:        String,
  pub description: Option<String>,
  pub order_idx:   i32,
  pub is_active:   bool,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawSection {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      section_id:  row.get(0)?,
      name:        row.get(1)?,
      code:        row.get(2)?,
      description: row.get(3)?,
      order_idx:   row.get(4)?,
      is_active:   row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_section(self) -> Result<Section> {
    Ok(Section {
      section_id:  decode_uuid(&self.section_id)?,
      name:        self.name,
      code:        self.code,
      description: self.description,
      order_idx:   self.order_idx,
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const KPI_COLUMNS: &str = "kpi_id, section_id, code, name, description, \
   owner_user_id, target_formula, unit, is_active, created_at, updated_at";

/// Raw values read directly from a `kpi` row.
pub struct RawKpi {
  pub kpi_id:         String,
  pub section_id:     String,
  pub code:           String,
  pub name:           String,
  pub description:    Option<String>,
  pub owner_user_id:  Option<String>,
  pub target_formula: Option<String>,
  pub unit:           Option<String>,
  pub is_active:      bool,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawKpi {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      kpi_id:         row.get(0)?,
      section_id:     row.get(1)?,
      code:           row.get(2)?,
      name:           row.get(3)?,
      description:    row.get(4)?,
      owner_user_id:  row.get(5)?,
      target_formula: row.get(6)?,
      unit:           row.get(7)?,
      is_active:      row.get(8)?,
      created_at:     row.get(9)?,
      updated_at:     row.get(10)?,
    })
  }

  pub fn into_kpi(self) -> Result<Kpi> {
    Ok(Kpi {
      kpi_id:         decode_uuid(&self.kpi_id)?,
      section_id:     decode_uuid(&self.section_id)?,
      code:           self.code,
      name:           self.name,
      description:    self.description,
      owner_user_id:  self.owner_user_id,
      target_formula: self.target_formula,
      unit:           self.unit,
      is_active:      self.is_active,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

pub const VALUE_COLUMNS: &str = "value_id, kpi_id, period_id, status, numeric_value, \
   text_value, evidence_ref, version, created_at, updated_at";

/// Raw values read directly from a `kpi_value` row.
pub struct RawValue {
  pub value_id:      String,
  pub kpi_id:        String,
  pub period_id:     String,
  pub status:        String,
  pub numeric_value: Option<f64>,
  pub text_value:    Option<String>,
  pub evidence_ref:  Option<String>,
  pub version:       u32,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawValue {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      value_id:      row.get(0)?,
      kpi_id:        row.get(1)?,
      period_id:     row.get(2)?,
      status:        row.get(3)?,
      numeric_value: row.get(4)?,
      text_value:    row.get(5)?,
      evidence_ref:  row.get(6)?,
      version:       row.get(7)?,
      created_at:    row.get(8)?,
      updated_at:    row.get(9)?,
    })
  }

  pub fn into_value(self) -> Result<KpiValue> {
    Ok(KpiValue {
      value_id:      decode_uuid(&self.value_id)?,
      kpi_id:        decode_uuid(&self.kpi_id)?,
      period_id:     decode_uuid(&self.period_id)?,
      status:        decode_status(&self.status)?,
      numeric_value: self.numeric_value,
      text_value:    self.text_value,
      evidence_ref:  self.evidence_ref,
      version:       self.version,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const CHANGE_COLUMNS: &str = "change_id, entity, entity_id, field, old_value, \
   new_value, changed_by, changed_at, reason, source_page";

/// Raw values read directly from a `change_set` row.
pub struct RawChange {
  pub change_id:   String,
  pub entity:      String,
  pub entity_id:   String,
  pub field:       String,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub changed_by:  String,
  pub changed_at:  String,
  pub reason:      Option<String>,
  pub source_page: Option<String>,
}

impl RawChange {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      change_id:   row.get(0)?,
      entity:      row.get(1)?,
      entity_id:   row.get(2)?,
      field:       row.get(3)?,
      old_value:   row.get(4)?,
      new_value:   row.get(5)?,
      changed_by:  row.get(6)?,
      changed_at:  row.get(7)?,
      reason:      row.get(8)?,
      source_page: row.get(9)?,
    })
  }

  pub fn into_change(self) -> Result<ChangeRecord> {
    Ok(ChangeRecord {
      change_id:   decode_uuid(&self.change_id)?,
      entity:      self.entity,
      entity_id:   decode_uuid(&self.entity_id)?,
      field:       self.field,
      old_value:   decode_json(self.old_value.as_deref())?,
      new_value:   decode_json(self.new_value.as_deref())?,
      changed_by:  self.changed_by,
      changed_at:  decode_dt(&self.changed_at)?,
      reason:      self.reason,
      source_page: self.source_page,
    })
  }
}
