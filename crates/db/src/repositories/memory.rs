use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use goalboard_core::domain::{BusinessUnit, CellKey, Month, RealizationRecord};
use goalboard_core::store::{check_cell_constraints, RealizationStore, StoreError};

/// Map-backed store with the same cell semantics as the SQL adapter.
#[derive(Default)]
pub struct InMemoryRealizationRepository {
    cells: RwLock<BTreeMap<CellKey, RealizationRecord>>,
}

#[async_trait::async_trait]
impl RealizationStore for InMemoryRealizationRepository {
    async fn fetch_all(&self, year: i32) -> Result<Vec<RealizationRecord>, StoreError> {
        let cells = self.cells.read().await;
        // BTreeMap order is (bu, month, year), so filtering keeps canonical order.
        Ok(cells.values().filter(|record| record.year == year).cloned().collect())
    }

    async fn upsert_cell(
        &self,
        bu: BusinessUnit,
        month: Month,
        year: i32,
        value: Decimal,
    ) -> Result<RealizationRecord, StoreError> {
        check_cell_constraints(year, value)?;

        let mut cells = self.cells.write().await;
        let record = cells
            .entry(CellKey::new(bu, month, year))
            .and_modify(|existing| {
                existing.value = value;
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| RealizationRecord::new(bu, month, year, value));
        Ok(record.clone())
    }
}
