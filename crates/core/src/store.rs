use std::ops::RangeInclusive;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{BusinessUnit, Month, RealizationRecord};

/// Years the durable store accepts for a realization cell.
pub const YEAR_RANGE: RangeInclusive<i32> = 1900..=9999;

/// Largest realized value a cell accepts (one quadrillion). A full year of
/// cells at this ceiling still sums well inside `Decimal`.
pub const MAX_CELL_VALUE: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// A stored row that cannot be decoded. Retrying reads the same bytes.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

impl StoreError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Durable storage of realized values keyed by (bu, month, year).
#[async_trait]
pub trait RealizationStore: Send + Sync {
    /// Every record for `year`, ordered by business unit then month.
    async fn fetch_all(&self, year: i32) -> Result<Vec<RealizationRecord>, StoreError>;

    /// Insert-or-overwrite of a single cell. Returns the stored record.
    async fn upsert_cell(
        &self,
        bu: BusinessUnit,
        month: Month,
        year: i32,
        value: Decimal,
    ) -> Result<RealizationRecord, StoreError>;
}

/// Row-level constraints shared by every adapter.
pub fn check_cell_constraints(year: i32, value: Decimal) -> Result<(), StoreError> {
    if !YEAR_RANGE.contains(&year) {
        return Err(StoreError::ConstraintViolation(format!(
            "year {year} is outside {}..={}",
            YEAR_RANGE.start(),
            YEAR_RANGE.end()
        )));
    }
    if value < Decimal::ZERO {
        return Err(StoreError::ConstraintViolation(format!(
            "realized value must not be negative (got {value})"
        )));
    }
    if value > MAX_CELL_VALUE {
        return Err(StoreError::ConstraintViolation(format!(
            "realized value must not exceed {MAX_CELL_VALUE} (got {value})"
        )));
    }
    Ok(())
}
