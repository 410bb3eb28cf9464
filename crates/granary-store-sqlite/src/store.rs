//! [`SqliteStore`] — the SQLite implementation of [`WarehouseStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;

use granary_core::{
  calendar::CalendarDay,
  dimension::{DimensionVersion, NewVersion, SurrogateKey},
  fact::{FactRecord, NewFactRecord, ResolvedRef},
  store::{TransitionOutcome, WarehouseStore},
};

use crate::{
  Error, Result,
  encode::{RawFact, RawVersion, encode_date, encode_dt, encode_payload},
  schema::SCHEMA,
};

const VERSION_COLUMNS: &str =
  "surrogate_key, dimension, natural_key, payload, is_current, valid_from, \
   valid_to";

const FACT_COLUMNS: &str =
  "fact_id, order_id, line_number, date_id, quantity, gross_amount, \
   discount_amount, net_amount, cost_amount, margin_amount, margin_percent, \
   created_at, updated_at";

fn version_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVersion> {
  Ok(RawVersion {
    surrogate_key: row.get(0)?,
    dimension:     row.get(1)?,
    natural_key:   row.get(2)?,
    payload:       row.get(3)?,
    is_current:    row.get(4)?,
    valid_from:    row.get(5)?,
    valid_to:      row.get(6)?,
  })
}

fn fact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFact> {
  Ok(RawFact {
    fact_id:         row.get(0)?,
    order_id:        row.get(1)?,
    line_number:     row.get(2)?,
    date_id:         row.get(3)?,
    quantity:        row.get(4)?,
    gross_amount:    row.get(5)?,
    discount_amount: row.get(6)?,
    net_amount:      row.get(7)?,
    cost_amount:     row.get(8)?,
    margin_amount:   row.get(9)?,
    margin_percent:  row.get(10)?,
    created_at:      row.get(11)?,
    updated_at:      row.get(12)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Granary warehouse store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
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

  /// Read one version row matching `where_clause` (with `?1` = dimension,
  /// `?2` = natural key, optional `?3`).
  async fn query_version(
    &self,
    where_clause: &'static str,
    dimension: String,
    natural_key: String,
    extra: Option<String>,
  ) -> Result<Option<DimensionVersion>> {
    let raw: Option<RawVersion> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {VERSION_COLUMNS} FROM dim_versions
           WHERE dimension = ?1 AND natural_key = ?2 AND {where_clause}"
        );
        let row = match extra {
          Some(extra) => conn
            .query_row(
              &sql,
              rusqlite::params![dimension, natural_key, extra],
              version_from_row,
            )
            .optional()?,
          None => conn
            .query_row(
              &sql,
              rusqlite::params![dimension, natural_key],
              version_from_row,
            )
            .optional()?,
        };
        Ok(row)
      })
      .await?;

    raw.map(RawVersion::into_version).transpose()
  }
}

// ─── WarehouseStore impl ─────────────────────────────────────────────────────

impl WarehouseStore for SqliteStore {
  type Error = Error;

  // ── Version reads ──────────────────────────────────────────────────────────

  async fn current_version(
    &self,
    dimension: &str,
    natural_key: &str,
  ) -> Result<Option<DimensionVersion>> {
    self
      .query_version(
        "is_current = 1",
        dimension.to_owned(),
        natural_key.to_owned(),
        None,
      )
      .await
  }

  async fn version_as_of(
    &self,
    dimension: &str,
    natural_key: &str,
    as_of: NaiveDate,
  ) -> Result<Option<DimensionVersion>> {
    // ISO date strings compare lexicographically in date order.
    self
      .query_version(
        "valid_from <= ?3 AND (valid_to IS NULL OR valid_to >= ?3)",
        dimension.to_owned(),
        natural_key.to_owned(),
        Some(encode_date(as_of)),
      )
      .await
  }

  async fn versions(
    &self,
    dimension: &str,
    natural_key: &str,
  ) -> Result<Vec<DimensionVersion>> {
    let dimension = dimension.to_owned();
    let natural_key = natural_key.to_owned();

    let raws: Vec<RawVersion> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {VERSION_COLUMNS} FROM dim_versions
           WHERE dimension = ?1 AND natural_key = ?2
           ORDER BY valid_from"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![dimension, natural_key], version_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVersion::into_version).collect()
  }

  // ── Version writes ─────────────────────────────────────────────────────────

  async fn insert_version(&self, open: NewVersion) -> Result<TransitionOutcome> {
    let payload_str = encode_payload(&open.payload)?;
    let from_str    = encode_date(open.valid_from);
    let dimension   = open.dimension.clone();
    let natural_key = open.natural_key.clone();

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        // Guarded insert: refuse to open a second current version for the
        // key. A concurrent writer losing this race sees zero changes.
        let changed = conn.execute(
          "INSERT INTO dim_versions
             (dimension, natural_key, payload, is_current, valid_from, valid_to)
           SELECT ?1, ?2, ?3, 1, ?4, NULL
           WHERE NOT EXISTS (
             SELECT 1 FROM dim_versions
             WHERE dimension = ?1 AND natural_key = ?2 AND is_current = 1
           )",
          rusqlite::params![dimension, natural_key, payload_str, from_str],
        )?;
        Ok((changed > 0).then(|| conn.last_insert_rowid()))
      })
      .await?;

    Ok(match inserted {
      Some(sk) => TransitionOutcome::Applied(DimensionVersion {
        surrogate_key: SurrogateKey(sk),
        dimension:     open.dimension,
        natural_key:   open.natural_key,
        payload:       open.payload,
        is_current:    true,
        valid_from:    open.valid_from,
        valid_to:      None,
      }),
      None => TransitionOutcome::Conflict,
    })
  }

  async fn transition_version(
    &self,
    close: SurrogateKey,
    open: NewVersion,
  ) -> Result<TransitionOutcome> {
    let close_on = open
      .valid_from
      .pred_opt()
      .ok_or_else(|| Error::DateParse("effective date underflow".to_owned()))?;

    let payload_str  = encode_payload(&open.payload)?;
    let from_str     = encode_date(open.valid_from);
    let close_on_str = encode_date(close_on);
    let close_sk     = close.0;
    let dimension    = open.dimension.clone();
    let natural_key  = open.natural_key.clone();

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Optimistic check-and-set: the close only applies if the named
        // version is still current. Zero rows affected means a concurrent
        // writer already transitioned this key.
        let closed = tx.execute(
          "UPDATE dim_versions
           SET is_current = 0, valid_to = ?2
           WHERE surrogate_key = ?1 AND is_current = 1",
          rusqlite::params![close_sk, close_on_str],
        )?;

        if closed == 0 {
          // Dropping the transaction rolls it back.
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO dim_versions
             (dimension, natural_key, payload, is_current, valid_from, valid_to)
           VALUES (?1, ?2, ?3, 1, ?4, NULL)",
          rusqlite::params![dimension, natural_key, payload_str, from_str],
        )?;
        let sk = tx.last_insert_rowid();

        tx.commit()?;
        Ok(Some(sk))
      })
      .await?;

    Ok(match inserted {
      Some(sk) => TransitionOutcome::Applied(DimensionVersion {
        surrogate_key: SurrogateKey(sk),
        dimension:     open.dimension,
        natural_key:   open.natural_key,
        payload:       open.payload,
        is_current:    true,
        valid_from:    open.valid_from,
        valid_to:      None,
      }),
      None => TransitionOutcome::Conflict,
    })
  }

  // ── Facts ──────────────────────────────────────────────────────────────────

  async fn find_fact(
    &self,
    order_id: &str,
    line_number: u32,
  ) -> Result<Option<FactRecord>> {
    let order_id = order_id.to_owned();

    let found: Option<(RawFact, Vec<(String, i64)>)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {FACT_COLUMNS} FROM facts
           WHERE order_id = ?1 AND line_number = ?2"
        );
        let raw = conn
          .query_row(
            &sql,
            rusqlite::params![order_id, line_number],
            fact_from_row,
          )
          .optional()?;

        let Some(raw) = raw else { return Ok(None) };

        let mut stmt = conn.prepare(
          "SELECT dimension, surrogate_key FROM fact_refs
           WHERE fact_id = ?1 ORDER BY dimension",
        )?;
        let refs = stmt
          .query_map(rusqlite::params![raw.fact_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((raw, refs)))
      })
      .await?;

    found
      .map(|(raw, refs)| {
        let refs = refs
          .into_iter()
          .map(|(dimension, sk)| ResolvedRef {
            dimension,
            surrogate_key: SurrogateKey(sk),
          })
          .collect();
        raw.into_fact(refs)
      })
      .transpose()
  }

  async fn insert_fact(&self, input: NewFactRecord) -> Result<FactRecord> {
    let now = Utc::now();
    let now_str = encode_dt(now);

    let order_id    = input.order_id.clone();
    let line_number = input.line_number;
    let date_id     = input.date_id;
    let refs: Vec<(String, i64)> = input
      .refs
      .iter()
      .map(|r| (r.dimension.clone(), r.surrogate_key.0))
      .collect();
    let measures = input.measures;
    let (quantity, gross, discount, cost) = (
      input.quantity,
      input.gross_amount,
      input.discount_amount,
      input.cost_amount,
    );

    let fact_id: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Foreign keys would catch this too, but a named error beats a
        // constraint message when the calendar has a gap.
        let covered: bool = tx
          .query_row(
            "SELECT 1 FROM dim_date WHERE date_id = ?1",
            rusqlite::params![date_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !covered {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO facts (
             order_id, line_number, date_id, quantity, gross_amount,
             discount_amount, net_amount, cost_amount, margin_amount,
             margin_percent, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
          rusqlite::params![
            order_id,
            line_number,
            date_id,
            quantity,
            gross,
            discount,
            measures.net_amount,
            cost,
            measures.margin_amount,
            measures.margin_percent,
            now_str,
          ],
        )?;
        let fact_id = tx.last_insert_rowid();

        for (dimension, sk) in &refs {
          tx.execute(
            "INSERT INTO fact_refs (fact_id, dimension, surrogate_key)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![fact_id, dimension, sk],
          )?;
        }

        tx.commit()?;
        Ok(Some(fact_id))
      })
      .await?;

    let fact_id = fact_id.ok_or(Error::CalendarGap(input.date_id))?;

    Ok(FactRecord {
      fact_id,
      order_id:        input.order_id,
      line_number:     input.line_number,
      date_id:         input.date_id,
      refs:            input.refs,
      quantity:        input.quantity,
      gross_amount:    input.gross_amount,
      discount_amount: input.discount_amount,
      net_amount:      measures.net_amount,
      cost_amount:     input.cost_amount,
      margin_amount:   measures.margin_amount,
      margin_percent:  measures.margin_percent,
      created_at:      now,
      updated_at:      now,
    })
  }

  // ── Calendar ───────────────────────────────────────────────────────────────

  async fn ensure_calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
    let days: Vec<CalendarDay> = from
      .iter_days()
      .take_while(|d| *d <= to)
      .map(CalendarDay::for_date)
      .collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO dim_date
               (date_id, date, day, month, month_name, year)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          )?;
          for day in &days {
            inserted += stmt.execute(rusqlite::params![
              day.date_id,
              encode_date(day.date),
              day.day,
              day.month,
              day.month_name,
              day.year,
            ])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }
}
