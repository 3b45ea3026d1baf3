//! SQL schema for the HSE SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS period (
    period_id   TEXT PRIMARY KEY,
    period_type TEXT NOT NULL,          -- 'monthly' | 'quarterly' | 'yearly'
    year        INTEGER NOT NULL,
    month       INTEGER,                -- 1-12 for monthly periods
    quarter     INTEGER,                -- 1-4 for quarterly periods
    start_date  TEXT NOT NULL,          -- YYYY-MM-DD
    end_date    TEXT NOT NULL,          -- YYYY-MM-DD
    label       TEXT NOT NULL,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    UNIQUE (period_type, start_date),
    CHECK  (end_date >= start_date)
);

CREATE TABLE IF NOT EXISTS section (
    section_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    code        TEXT NOT NULL,
    description TEXT,
    order_idx   INTEGER NOT NULL,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- KPIs are never deleted; is_active is cleared instead.
CREATE TABLE IF NOT EXISTS kpi (
    kpi_id         TEXT PRIMARY KEY,
    section_id     TEXT NOT NULL REFERENCES section(section_id),
    code           TEXT NOT NULL,
    name           TEXT NOT NULL,
    description    TEXT,
    owner_user_id  TEXT,
    target_formula TEXT,
    unit           TEXT,
    is_active      INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- One row per (kpi_id, period_id); updated in place with a version bump.
CREATE TABLE IF NOT EXISTS kpi_value (
    value_id      TEXT PRIMARY KEY,
    kpi_id        TEXT NOT NULL REFERENCES kpi(kpi_id),
    period_id     TEXT NOT NULL REFERENCES period(period_id),
    status        TEXT NOT NULL DEFAULT 'not_started',
    numeric_value REAL,
    text_value    TEXT,
    evidence_ref  TEXT,
    version       INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (kpi_id, period_id),
    CHECK  (version >= 1)
);

-- Audit trail. Strictly append-only.
CREATE TABLE IF NOT EXISTS change_set (
    change_id   TEXT PRIMARY KEY,
    entity      TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    field       TEXT NOT NULL,
    old_value   TEXT,                   -- JSON or NULL
    new_value   TEXT,                   -- JSON or NULL
    changed_by  TEXT NOT NULL,
    changed_at  TEXT NOT NULL,          -- RFC 3339 UTC, fixed precision
    reason      TEXT,
    source_page TEXT
);

CREATE INDEX IF NOT EXISTS period_start_idx     ON period(start_date);
CREATE INDEX IF NOT EXISTS kpi_section_idx      ON kpi(section_id);
CREATE INDEX IF NOT EXISTS kpi_value_period_idx ON kpi_value(period_id);
CREATE INDEX IF NOT EXISTS change_entity_idx    ON change_set(entity_id);
CREATE INDEX IF NOT EXISTS change_at_idx        ON change_set(changed_at);

PRAGMA user_version = 1;
";
