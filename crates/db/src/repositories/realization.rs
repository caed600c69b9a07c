use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use goalboard_core::aggregation::DomainInconsistency;
use goalboard_core::domain::{BusinessUnit, Month, RealizationRecord};
use goalboard_core::store::{check_cell_constraints, RealizationStore, StoreError};

use super::store_error;
use crate::DbPool;

/// SQLite adapter for realized values.
///
/// The `(bu, month, year)` unique key is the conflict target; a second write
/// to the same cell overwrites `value` and `updated_at` and keeps
/// `created_at`.
pub struct SqlRealizationRepository {
    pool: DbPool,
}

impl SqlRealizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_error(column: &str, error: impl std::fmt::Display) -> StoreError {
    StoreError::CorruptRecord(format!("could not decode realization.{column}: {error}"))
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(column, e))
}

/// Decodes one row. Rows whose business unit or month fall outside the
/// closed domain come back as `Err(DomainInconsistency)` instead of failing
/// the whole fetch.
fn row_to_record(
    row: &SqliteRow,
) -> Result<Result<RealizationRecord, DomainInconsistency>, StoreError> {
    let bu_key: String = row.try_get("bu").map_err(|e| decode_error("bu", e))?;
    let month_number: i64 = row.try_get("month").map_err(|e| decode_error("month", e))?;
    let year: i64 = row.try_get("year").map_err(|e| decode_error("year", e))?;
    let value_str: String = row.try_get("value").map_err(|e| decode_error("value", e))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| decode_error("created_at", e))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| decode_error("updated_at", e))?;

    let year = i32::try_from(year).map_err(|e| decode_error("year", e))?;

    let Ok(bu) = BusinessUnit::from_str(&bu_key) else {
        return Ok(Err(DomainInconsistency::UnknownBusinessUnit { key: bu_key, year }));
    };
    let month = u8::try_from(month_number).ok().and_then(Month::from_number);
    let Some(month) = month else {
        return Ok(Err(DomainInconsistency::UnknownMonth { key: month_number.to_string(), year }));
    };
    let value = Decimal::from_str(&value_str).map_err(|e| decode_error("value", e))?;
    let created_at = parse_timestamp("created_at", &created_at_str)?;
    let updated_at = parse_timestamp("updated_at", &updated_at_str)?;

    Ok(Ok(RealizationRecord { bu, month, year, value, created_at, updated_at }))
}

/// Decodes fetched rows into canonical (business unit, month) order, logging
/// and dropping rows outside the domain.
fn decode_rows(rows: &[SqliteRow]) -> Result<Vec<RealizationRecord>, StoreError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row_to_record(row)? {
            Ok(record) => records.push(record),
            Err(inconsistency) => inconsistency.log(),
        }
    }
    records.sort_by_key(|record| (record.bu, record.month));
    Ok(records)
}

#[async_trait]
impl RealizationStore for SqlRealizationRepository {
    async fn fetch_all(&self, year: i32) -> Result<Vec<RealizationRecord>, StoreError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT bu, month, year, value, created_at, updated_at
             FROM realization WHERE year = ? ORDER BY bu, month",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let records = decode_rows(&rows)?;
        debug!(
            event_name = "realization.store.fetched",
            year,
            rows = rows.len(),
            records = records.len(),
            "fetched realization rows"
        );
        Ok(records)
    }

    async fn upsert_cell(
        &self,
        bu: BusinessUnit,
        month: Month,
        year: i32,
        value: Decimal,
    ) -> Result<RealizationRecord, StoreError> {
        check_cell_constraints(year, value)?;
        let now = Utc::now().to_rfc3339();

        let row = sqlx::query(
            "INSERT INTO realization (bu, month, year, value, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(bu, month, year) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at
             RETURNING bu, month, year, value, created_at, updated_at",
        )
        .bind(bu.as_str())
        .bind(i64::from(month.number()))
        .bind(year)
        .bind(value.to_string())
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        match row_to_record(&row)? {
            Ok(record) => Ok(record),
            Err(inconsistency) => Err(StoreError::CorruptRecord(format!(
                "stored row could not be read back: {inconsistency}"
            ))),
        }
    }
}
