use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::business_unit::BusinessUnit;
use crate::domain::month::Month;

/// Identity of one realization cell. At most one record exists per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub bu: BusinessUnit,
    pub month: Month,
    pub year: i32,
}

impl CellKey {
    pub fn new(bu: BusinessUnit, month: Month, year: i32) -> Self {
        Self { bu, month, year }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizationRecord {
    pub bu: BusinessUnit,
    pub month: Month,
    pub year: i32,
    pub value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RealizationRecord {
    pub fn new(bu: BusinessUnit, month: Month, year: i32, value: Decimal) -> Self {
        let now = Utc::now();
        Self { bu, month, year, value, created_at: now, updated_at: now }
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(self.bu, self.month, self.year)
    }
}
