//! SQL schema for the Granary SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- The date dimension: one row per calendar date, contiguous coverage.
CREATE TABLE IF NOT EXISTS dim_date (
    date_id    INTEGER PRIMARY KEY,   -- yyyymmdd
    date       TEXT NOT NULL UNIQUE,  -- ISO 8601 date
    day        INTEGER NOT NULL,
    month      INTEGER NOT NULL,
    month_name TEXT NOT NULL,
    year       INTEGER NOT NULL
);

-- Type-2 version log, append-only. The only UPDATE ever issued against this
-- table is the single close-out inside transition_version.
CREATE TABLE IF NOT EXISTS dim_versions (
    surrogate_key INTEGER PRIMARY KEY AUTOINCREMENT,
    dimension     TEXT NOT NULL,
    natural_key   TEXT NOT NULL,
    payload       TEXT NOT NULL,      -- JSON attribute map
    is_current    INTEGER NOT NULL,
    valid_from    TEXT NOT NULL,      -- ISO 8601 date
    valid_to      TEXT                -- NULL while the version is open
);

-- At most one open version per (dimension, natural_key).
CREATE UNIQUE INDEX IF NOT EXISTS dim_versions_current_idx
    ON dim_versions(dimension, natural_key) WHERE is_current = 1;

CREATE INDEX IF NOT EXISTS dim_versions_key_idx
    ON dim_versions(dimension, natural_key, valid_from);

-- Facts are strictly insert-only; corrections arrive as new facts.
-- UNIQUE(order_id, line_number) is the idempotency backstop.
CREATE TABLE IF NOT EXISTS facts (
    fact_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id        TEXT NOT NULL,
    line_number     INTEGER NOT NULL,
    date_id         INTEGER NOT NULL REFERENCES dim_date(date_id),
    quantity        REAL NOT NULL,
    gross_amount    REAL NOT NULL,
    discount_amount REAL NOT NULL DEFAULT 0,
    net_amount      REAL NOT NULL,
    cost_amount     REAL NOT NULL,
    margin_amount   REAL NOT NULL,
    margin_percent  REAL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE (order_id, line_number)
);

-- One row per (fact, dimension): the surrogate key the fact was resolved
-- against at load time. Historical reporting joins through this table.
CREATE TABLE IF NOT EXISTS fact_refs (
    fact_id       INTEGER NOT NULL REFERENCES facts(fact_id),
    dimension     TEXT NOT NULL,
    surrogate_key INTEGER NOT NULL REFERENCES dim_versions(surrogate_key),
    UNIQUE (fact_id, dimension)
);

CREATE INDEX IF NOT EXISTS facts_date_idx     ON facts(date_id);
CREATE INDEX IF NOT EXISTS fact_refs_sk_idx   ON fact_refs(surrogate_key);

PRAGMA user_version = 1;
";
