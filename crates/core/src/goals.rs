use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::{saturating_sum, RealizationMatrix};
use crate::attainment::{attainment, GoalAttainment};
use crate::domain::{BusinessUnit, Month};

/// Targets for one business unit. Absent values mean "no goal".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSet {
    pub annual: Decimal,
    #[serde(default)]
    pub monthly: BTreeMap<Month, Decimal>,
}

impl GoalSet {
    pub fn annual(annual: Decimal) -> Self {
        Self { annual, monthly: BTreeMap::new() }
    }

    pub fn with_month(mut self, month: Month, goal: Decimal) -> Self {
        self.monthly.insert(month, goal);
        self
    }

    pub fn for_month(&self, month: Month) -> Decimal {
        self.monthly.get(&month).copied().unwrap_or(Decimal::ZERO)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalBook {
    goals: BTreeMap<BusinessUnit, GoalSet>,
}

impl GoalBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, bu: BusinessUnit, goals: GoalSet) -> Self {
        self.set(bu, goals);
        self
    }

    pub fn set(&mut self, bu: BusinessUnit, goals: GoalSet) {
        self.goals.insert(bu, goals);
    }

    pub fn get(&self, bu: BusinessUnit) -> Option<&GoalSet> {
        self.goals.get(&bu)
    }

    pub fn annual_for(&self, bu: BusinessUnit) -> Decimal {
        self.get(bu).map(|goals| goals.annual).unwrap_or(Decimal::ZERO)
    }

    pub fn monthly_for(&self, bu: BusinessUnit, month: Month) -> Decimal {
        self.get(bu).map(|goals| goals.for_month(month)).unwrap_or(Decimal::ZERO)
    }

    pub fn total_annual(&self) -> Decimal {
        saturating_sum(BusinessUnit::ALL.into_iter().map(|bu| self.annual_for(bu)))
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthPerformance {
    pub month: Month,
    pub attainment: GoalAttainment,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuPerformance {
    pub bu: BusinessUnit,
    pub attainment: GoalAttainment,
    pub monthly: Vec<MonthPerformance>,
}

/// Matrix totals reconciled against a goal book. Rebuilt on every read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub year: i32,
    pub business_units: Vec<BuPerformance>,
    pub consolidated: GoalAttainment,
}

impl PerformanceSummary {
    pub fn compute(matrix: &RealizationMatrix, goals: &GoalBook) -> Self {
        let business_units = BusinessUnit::ALL
            .into_iter()
            .map(|bu| BuPerformance {
                bu,
                attainment: attainment(matrix.total_for(bu), goals.annual_for(bu)),
                monthly: Month::ALL
                    .into_iter()
                    .map(|month| MonthPerformance {
                        month,
                        attainment: attainment(
                            matrix.value(bu, month),
                            goals.monthly_for(bu, month),
                        ),
                    })
                    .collect(),
            })
            .collect();

        Self {
            year: matrix.year(),
            business_units,
            consolidated: attainment(matrix.grand_total(), goals.total_annual()),
        }
    }

    pub fn for_bu(&self, bu: BusinessUnit) -> Option<&BuPerformance> {
        self.business_units.iter().find(|performance| performance.bu == bu)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{GoalBook, GoalSet, PerformanceSummary};
    use crate::aggregation::build_matrix;
    use crate::domain::{BusinessUnit, Month, RealizationRecord};

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn scenario_records() -> Vec<RealizationRecord> {
        vec![
            RealizationRecord::new(BusinessUnit::ModeloAtual, Month::Jan, 2026, dec(1000)),
            RealizationRecord::new(BusinessUnit::ModeloAtual, Month::Fev, 2026, dec(500)),
        ]
    }

    #[test]
    fn bu_attainment_uses_annual_goal() {
        let matrix = build_matrix(&scenario_records(), 2026);
        let goals = GoalBook::new().with(BusinessUnit::ModeloAtual, GoalSet::annual(dec(3000)));

        let summary = PerformanceSummary::compute(&matrix, &goals);
        let modelo = summary.for_bu(BusinessUnit::ModeloAtual).expect("modelo_atual present");

        assert_eq!(modelo.attainment.realized, dec(1500));
        assert_eq!(modelo.attainment.percentage, dec(50));
        assert!(!modelo.attainment.is_above_goal);
    }

    #[test]
    fn every_bu_and_month_is_reported() {
        let matrix = build_matrix(&scenario_records(), 2026);
        let summary = PerformanceSummary::compute(&matrix, &GoalBook::new());

        assert_eq!(summary.business_units.len(), BusinessUnit::ALL.len());
        assert!(summary.business_units.iter().all(|bu| bu.monthly.len() == 12));
        let franquia = summary.for_bu(BusinessUnit::Franquia).expect("franquia present");
        assert_eq!(franquia.attainment.percentage, Decimal::ZERO);
        assert!(!franquia.attainment.is_above_goal);
    }

    #[test]
    fn monthly_goals_drive_month_attainment() {
        let matrix = build_matrix(&scenario_records(), 2026);
        let goals = GoalBook::new().with(
            BusinessUnit::ModeloAtual,
            GoalSet::annual(dec(3000)).with_month(Month::Jan, dec(800)),
        );

        let summary = PerformanceSummary::compute(&matrix, &goals);
        let modelo = summary.for_bu(BusinessUnit::ModeloAtual).expect("modelo_atual present");

        let january = &modelo.monthly[Month::Jan.index()];
        assert_eq!(january.attainment.percentage, dec(125));
        assert_eq!(january.attainment.display_percentage, dec(100));
        assert!(january.attainment.is_above_goal);

        let february = &modelo.monthly[Month::Fev.index()];
        assert_eq!(february.attainment.goal, Decimal::ZERO);
        assert_eq!(february.attainment.percentage, Decimal::ZERO);
    }

    #[test]
    fn consolidated_compares_grand_total_with_summed_goals() {
        let mut records = scenario_records();
        records.push(RealizationRecord::new(BusinessUnit::O2Tax, Month::Mar, 2026, dec(500)));
        let matrix = build_matrix(&records, 2026);
        let goals = GoalBook::new()
            .with(BusinessUnit::ModeloAtual, GoalSet::annual(dec(3000)))
            .with(BusinessUnit::O2Tax, GoalSet::annual(dec(1000)));

        let summary = PerformanceSummary::compute(&matrix, &goals);

        assert_eq!(summary.consolidated.realized, dec(2000));
        assert_eq!(summary.consolidated.goal, dec(4000));
        assert_eq!(summary.consolidated.percentage, dec(50));
    }
}
