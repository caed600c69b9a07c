use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{BusinessUnit, CellKey, Month, RealizationRecord};

const BU_COUNT: usize = BusinessUnit::ALL.len();
const MONTH_COUNT: usize = Month::ALL.len();

/// A record or stored row that cannot be folded into the matrix.
///
/// These are never errors: the engine keeps going, buckets the offender on
/// the matrix and logs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainInconsistency {
    UnknownBusinessUnit { key: String, year: i32 },
    UnknownMonth { key: String, year: i32 },
    YearMismatch { cell: CellKey, expected_year: i32 },
    NegativeValue { cell: CellKey, value: Decimal },
}

impl DomainInconsistency {
    pub fn log(&self) {
        warn!(
            event_name = "realization.aggregate.skipped_record",
            inconsistency = %self,
            "skipping record outside the realization domain"
        );
    }
}

impl fmt::Display for DomainInconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBusinessUnit { key, year } => {
                write!(f, "unknown business unit `{key}` in year {year}")
            }
            Self::UnknownMonth { key, year } => write!(f, "unknown month `{key}` in year {year}"),
            Self::YearMismatch { cell, expected_year } => write!(
                f,
                "record {}/{}/{} does not belong to year {expected_year}",
                cell.bu, cell.month, cell.year
            ),
            Self::NegativeValue { cell, value } => write!(
                f,
                "record {}/{}/{} has negative value {value}",
                cell.bu, cell.month, cell.year
            ),
        }
    }
}

/// Dense BU x Month grid of realized values for one year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizationMatrix {
    year: i32,
    cells: [[Decimal; MONTH_COUNT]; BU_COUNT],
    skipped: Vec<DomainInconsistency>,
}

impl RealizationMatrix {
    /// All cells zero.
    pub fn empty(year: i32) -> Self {
        Self { year, cells: [[Decimal::ZERO; MONTH_COUNT]; BU_COUNT], skipped: Vec::new() }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn value(&self, bu: BusinessUnit, month: Month) -> Decimal {
        self.cells[bu.index()][month.index()]
    }

    pub fn row(&self, bu: BusinessUnit) -> &[Decimal; MONTH_COUNT] {
        &self.cells[bu.index()]
    }

    /// Cells in canonical order: business unit first, then calendar month.
    pub fn cells(&self) -> impl Iterator<Item = (BusinessUnit, Month, Decimal)> + '_ {
        BusinessUnit::ALL.into_iter().flat_map(move |bu| {
            Month::ALL.into_iter().map(move |month| (bu, month, self.value(bu, month)))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().map(|row| row.len()).sum()
    }

    /// Saturates at `Decimal::MAX` instead of overflowing.
    pub fn total_for(&self, bu: BusinessUnit) -> Decimal {
        saturating_sum(Month::ALL.into_iter().map(|month| self.value(bu, month)))
    }

    /// Saturates at `Decimal::MAX` instead of overflowing.
    pub fn grand_total(&self) -> Decimal {
        saturating_sum(BusinessUnit::ALL.into_iter().map(|bu| self.total_for(bu)))
    }

    /// Records left out of the fold.
    pub fn skipped(&self) -> &[DomainInconsistency] {
        &self.skipped
    }

    fn skip(&mut self, inconsistency: DomainInconsistency) {
        inconsistency.log();
        self.skipped.push(inconsistency);
    }
}

/// Sum of non-negative amounts, clamped at `Decimal::MAX`.
pub fn saturating_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values.into_iter().fold(Decimal::ZERO, |total, value| total.saturating_add(value))
}

/// Folds `records` into a zero-filled matrix for `year`.
///
/// Assignment semantics: if the input carries two records for the same cell
/// the later one wins. Records for another year or with a negative value are
/// bucketed on the matrix instead of folded.
pub fn build_matrix<'a>(
    records: impl IntoIterator<Item = &'a RealizationRecord>,
    year: i32,
) -> RealizationMatrix {
    let mut matrix = RealizationMatrix::empty(year);
    let mut seen = [[false; MONTH_COUNT]; BU_COUNT];

    for record in records {
        if record.year != year {
            matrix.skip(DomainInconsistency::YearMismatch {
                cell: record.key(),
                expected_year: year,
            });
            continue;
        }
        if record.value < Decimal::ZERO {
            let cell = record.key();
            matrix.skip(DomainInconsistency::NegativeValue { cell, value: record.value });
            continue;
        }

        let (row, column) = (record.bu.index(), record.month.index());
        if seen[row][column] {
            warn!(
                event_name = "realization.aggregate.duplicate_cell",
                bu = %record.bu,
                month = %record.month,
                year,
                "duplicate record for cell, keeping the later value"
            );
        }
        seen[row][column] = true;
        matrix.cells[row][column] = record.value;
    }

    matrix
}

/// Free-function form of [`RealizationMatrix::total_for`].
pub fn total_for(matrix: &RealizationMatrix, bu: BusinessUnit) -> Decimal {
    matrix.total_for(bu)
}

/// Free-function form of [`RealizationMatrix::grand_total`].
pub fn grand_total(matrix: &RealizationMatrix) -> Decimal {
    matrix.grand_total()
}
