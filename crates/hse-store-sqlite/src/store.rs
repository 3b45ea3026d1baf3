//! [`SqliteStore`] — the SQLite implementation of [`KpiStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};
use uuid::Uuid;

use hse_core::{
  catalog::{Kpi, NewKpi, NewPeriod, NewSection, Period, Section},
  change::{ChangeQuery, ChangeRecord, NewChange},
  store::{KpiQuery, KpiStore, PeriodQuery, ValueQuery},
  value::{KpiValue, UpsertOutcome, ValueWrite, version_matches},
};

use crate::{
  Error, Result,
  encode::{
    CHANGE_COLUMNS, KPI_COLUMNS, PERIOD_COLUMNS, RawChange, RawKpi, RawPeriod,
    RawSection, RawValue, SECTION_COLUMNS, VALUE_COLUMNS, encode_date, encode_dt,
    encode_json, encode_period_type, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

/// Default page size for [`KpiStore::list_changes`].
const DEFAULT_CHANGE_LIMIT: usize = 100;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An HSE KPI store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Surface a decode failure from inside a connection closure.
fn in_call<T>(result: Result<T>) -> tokio_rusqlite::Result<T> {
  result.map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
}

/// Build `column IN (?, ?, ...)` and push the ids onto `params`.
fn in_clause(column: &str, ids: &[Uuid], params: &mut Vec<Value>) -> String {
  let marks = vec!["?"; ids.len()].join(", ");
  params.extend(ids.iter().map(|id| Value::Text(encode_uuid(*id))));
  format!("{column} IN ({marks})")
}

fn where_clause(clauses: &[String]) -> String {
  if clauses.is_empty() {
    String::new()
  } else {
    format!(" WHERE {}", clauses.join(" AND "))
  }
}

fn select_value(
  conn: &rusqlite::Connection,
  kpi_id: &str,
  period_id: &str,
) -> rusqlite::Result<Option<RawValue>> {
  conn
    .query_row(
      &format!(
        "SELECT {VALUE_COLUMNS} FROM kpi_value WHERE kpi_id = ?1 AND period_id = ?2"
      ),
      rusqlite::params![kpi_id, period_id],
      RawValue::from_row,
    )
    .optional()
}

// ─── KpiStore impl ───────────────────────────────────────────────────────────

impl KpiStore for SqliteStore {
  type Error = Error;

  // ── Periods ───────────────────────────────────────────────────────────────

  async fn add_period(&self, input: NewPeriod) -> Result<Period> {
    let period = Period {
      period_id:   Uuid::new_v4(),
      period_type: input.period_type,
      year:        input.year,
      month:       input.month,
      quarter:     input.quarter,
      start_date:  input.start_date,
      end_date:    input.end_date,
      label:       input.label,
      is_active:   true,
      created_at:  Utc::now(),
    };

    let id_str    = encode_uuid(period.period_id);
    let type_str  = encode_period_type(period.period_type);
    let start_str = encode_date(period.start_date);
    let end_str   = encode_date(period.end_date);
    let at_str    = encode_dt(period.created_at);
    let (year, month, quarter, label) =
      (period.year, period.month, period.quarter, period.label.clone());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO period (
             period_id, period_type, year, month, quarter,
             start_date, end_date, label, is_active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)",
          rusqlite::params![
            id_str, type_str, year, month, quarter, start_str, end_str, label, at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(period)
  }

  async fn get_period(&self, id: Uuid) -> Result<Option<Period>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPeriod> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PERIOD_COLUMNS} FROM period WHERE period_id = ?1"),
            rusqlite::params![id_str],
            RawPeriod::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPeriod::into_period).transpose()
  }

  async fn list_periods(&self, query: &PeriodQuery) -> Result<Vec<Period>> {
    let mut clauses = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if !query.include_inactive {
      clauses.push("is_active = 1".to_owned());
    }
    if let Some(year) = query.year {
      clauses.push("year = ?".to_owned());
      params.push(Value::Integer(year.into()));
    }
    if let Some(t) = query.period_type {
      clauses.push("period_type = ?".to_owned());
      params.push(Value::Text(encode_period_type(t).to_owned()));
    }
    if let Some(from) = query.from {
      clauses.push("start_date >= ?".to_owned());
      params.push(Value::Text(encode_date(from)));
    }
    if let Some(to) = query.to {
      clauses.push("start_date <= ?".to_owned());
      params.push(Value::Text(encode_date(to)));
    }

    let sql = format!(
      "SELECT {PERIOD_COLUMNS} FROM period{} ORDER BY start_date, period_type",
      where_clause(&clauses)
    );

    let raws: Vec<RawPeriod> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawPeriod::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPeriod::into_period).collect()
  }

  // ── Sections ──────────────────────────────────────────────────────────────

  async fn add_section(&self, input: NewSection) -> Result<Section> {
    let now = Utc::now();
    let section = Section {
      section_id:  Uuid::new_v4(),
      name:        input.name,
      code:        input.code,
      description: input.description,
      order_idx:   input.order_idx,
      is_active:   true,
      created_at:  now,
      updated_at:  now,
    };

    let id_str = encode_uuid(section.section_id);
    let at_str = encode_dt(now);
    let (name, code, description, order_idx) = (
      section.name.clone(),
      section.code.clone(),
      section.description.clone(),
      section.order_idx,
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO section (
             section_id, name, code, description, order_idx,
             is_active, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
          rusqlite::params![id_str, name, code, description, order_idx, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(section)
  }

  async fn list_sections(&self, include_inactive: bool) -> Result<Vec<Section>> {
    let sql = format!(
      "SELECT {SECTION_COLUMNS} FROM section{} ORDER BY order_idx, code",
      if include_inactive { "" } else { " WHERE is_active = 1" }
    );

    let raws: Vec<RawSection> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawSection::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSection::into_section).collect()
  }

  // ── KPIs ──────────────────────────────────────────────────────────────────

  async fn add_kpi(&self, input: NewKpi) -> Result<Kpi> {
    let now = Utc::now();
    let kpi = Kpi {
      kpi_id:         Uuid::new_v4(),
      section_id:     input.section_id,
      code:           input.code,
      name:           input.name,
      description:    input.description,
      owner_user_id:  input.owner_user_id,
      target_formula: input.target_formula,
      unit:           input.unit,
      is_active:      true,
      created_at:     now,
      updated_at:     now,
    };

    let id_str      = encode_uuid(kpi.kpi_id);
    let section_str = encode_uuid(kpi.section_id);
    let at_str      = encode_dt(now);
    let row         = kpi.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kpi (
             kpi_id, section_id, code, name, description, owner_user_id,
             target_formula, unit, is_active, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
          rusqlite::params![
            id_str,
            section_str,
            row.code,
            row.name,
            row.description,
            row.owner_user_id,
            row.target_formula,
            row.unit,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(kpi)
  }

  async fn get_kpi(&self, id: Uuid) -> Result<Option<Kpi>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawKpi> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {KPI_COLUMNS} FROM kpi WHERE kpi_id = ?1"),
            rusqlite::params![id_str],
            RawKpi::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawKpi::into_kpi).transpose()
  }

  async fn list_kpis(&self, query: &KpiQuery) -> Result<Vec<Kpi>> {
    let mut clauses = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if !query.include_inactive {
      clauses.push("is_active = 1".to_owned());
    }
    if let Some(section_id) = query.section_id {
      clauses.push("section_id = ?".to_owned());
      params.push(Value::Text(encode_uuid(section_id)));
    }

    let sql = format!(
      "SELECT {KPI_COLUMNS} FROM kpi{} ORDER BY code, name",
      where_clause(&clauses)
    );

    let raws: Vec<RawKpi> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawKpi::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKpi::into_kpi).collect()
  }

  async fn set_kpi_active(&self, id: Uuid, is_active: bool) -> Result<Option<Kpi>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE kpi SET is_active = ?1, updated_at = ?2 WHERE kpi_id = ?3",
          rusqlite::params![is_active, at_str, id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.get_kpi(id).await
  }

  // ── Values ────────────────────────────────────────────────────────────────

  async fn get_value(&self, kpi_id: Uuid, period_id: Uuid) -> Result<Option<KpiValue>> {
    let kpi_str    = encode_uuid(kpi_id);
    let period_str = encode_uuid(period_id);

    let raw = self
      .conn
      .call(move |conn| Ok(select_value(conn, &kpi_str, &period_str)?))
      .await?;

    raw.map(RawValue::into_value).transpose()
  }

  async fn list_values(&self, query: &ValueQuery) -> Result<Vec<KpiValue>> {
    let mut clauses = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    for (column, ids) in [("kpi_id", &query.kpi_ids), ("period_id", &query.period_ids)] {
      if let Some(ids) = ids {
        if ids.is_empty() {
          return Ok(Vec::new());
        }
        clauses.push(in_clause(column, ids, &mut params));
      }
    }

    let sql = format!(
      "SELECT {VALUE_COLUMNS} FROM kpi_value{} ORDER BY kpi_id, period_id",
      where_clause(&clauses)
    );

    let raws: Vec<RawValue> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawValue::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawValue::into_value).collect()
  }

  async fn upsert_value(&self, write: ValueWrite) -> Result<UpsertOutcome> {
    let kpi_str    = encode_uuid(write.kpi_id);
    let period_str = encode_uuid(write.period_id);

    let outcome = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so the read below cannot go
        // stale before the write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = select_value(&tx, &kpi_str, &period_str)?
          .map(RawValue::into_value)
          .transpose();
        let existing = in_call(existing)?;

        if !version_matches(existing.as_ref(), write.expected_version) {
          return Ok(UpsertOutcome::Conflict { current: existing });
        }

        let fields = write.patch.apply(existing.as_ref());
        let now = Utc::now();
        let now_str = encode_dt(now);
        let status_str = encode_status(fields.status);

        let outcome = match existing {
          None => {
            let value = KpiValue {
              value_id:      Uuid::new_v4(),
              kpi_id:        write.kpi_id,
              period_id:     write.period_id,
              status:        fields.status,
              numeric_value: fields.numeric_value,
              text_value:    fields.text_value,
              evidence_ref:  fields.evidence_ref,
              version:       1,
              created_at:    now,
              updated_at:    now,
            };
            tx.execute(
              "INSERT INTO kpi_value (
                 value_id, kpi_id, period_id, status, numeric_value,
                 text_value, evidence_ref, version, created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
              rusqlite::params![
                encode_uuid(value.value_id),
                kpi_str,
                period_str,
                status_str,
                value.numeric_value,
                value.text_value,
                value.evidence_ref,
                now_str,
              ],
            )?;
            UpsertOutcome::Created(value)
          }
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
            let changed = tx.execute(
              "UPDATE kpi_value
                  SET status = ?1, numeric_value = ?2, text_value = ?3,
                      evidence_ref = ?4, version = version + 1, updated_at = ?5
                WHERE value_id = ?6 AND version = ?7",
              rusqlite::params![
                status_str,
                current.numeric_value,
                current.text_value,
                current.evidence_ref,
                now_str,
                encode_uuid(previous.value_id),
                previous.version,
              ],
            )?;
            if changed == 0 {
              return Ok(UpsertOutcome::Conflict { current: Some(previous) });
            }
            UpsertOutcome::Updated { previous, current }
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  // ── Change log ────────────────────────────────────────────────────────────

  async fn append_change(&self, input: NewChange) -> Result<ChangeRecord> {
    let record = ChangeRecord {
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
    };

    let id_str     = encode_uuid(record.change_id);
    let entity_str = encode_uuid(record.entity_id);
    let old_str    = encode_json(record.old_value.as_ref());
    let new_str    = encode_json(record.new_value.as_ref());
    let at_str     = encode_dt(record.changed_at);
    let row        = record.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO change_set (
             change_id, entity, entity_id, field, old_value, new_value,
             changed_by, changed_at, reason, source_page
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            row.entity,
            entity_str,
            row.field,
            old_str,
            new_str,
            row.changed_by,
            at_str,
            row.reason,
            row.source_page,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn list_changes(&self, query: &ChangeQuery) -> Result<Vec<ChangeRecord>> {
    let entity_str = query.entity_id.map(encode_uuid);
    let limit = i64::try_from(query.limit.unwrap_or(DEFAULT_CHANGE_LIMIT)).unwrap_or(i64::MAX);

    let raws: Vec<RawChange> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(entity_id) = entity_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {CHANGE_COLUMNS} FROM change_set WHERE entity_id = ?1
              ORDER BY changed_at DESC, rowid DESC LIMIT ?2"
          ))?;
          stmt
            .query_map(rusqlite::params![entity_id, limit], RawChange::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {CHANGE_COLUMNS} FROM change_set
              ORDER BY changed_at DESC, rowid DESC LIMIT ?1"
          ))?;
          stmt
            .query_map(rusqlite::params![limit], RawChange::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChange::into_change).collect()
  }
}
