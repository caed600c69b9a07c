use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
/// Smallest bar width for a tier with a non-zero count.
pub const MIN_TIER_WIDTH_PERCENT: Decimal = Decimal::from_parts(8, 0, 0, false, 0);

/// Realized value measured against a goal.
///
/// `percentage` is kept unrounded and uncapped; only the gauge uses the
/// capped `display_percentage`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalAttainment {
    pub realized: Decimal,
    pub goal: Decimal,
    pub percentage: Decimal,
    pub is_above_goal: bool,
    pub display_percentage: Decimal,
}

/// What a radial gauge needs to draw one card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeReading {
    pub realized: Decimal,
    pub goal: Decimal,
    pub display_percentage: Decimal,
    pub is_above_goal: bool,
}

/// A ratio too large for `Decimal` saturates at `Decimal::MAX`.
pub fn attainment(realized: Decimal, goal: Decimal) -> GoalAttainment {
    let percentage = if goal > Decimal::ZERO {
        realized
            .checked_div(goal)
            .and_then(|ratio| ratio.checked_mul(HUNDRED))
            .unwrap_or(Decimal::MAX)
    } else {
        Decimal::ZERO
    };

    GoalAttainment {
        realized,
        goal,
        percentage,
        is_above_goal: percentage >= HUNDRED,
        display_percentage: percentage.min(HUNDRED),
    }
}

impl GoalAttainment {
    /// Uncapped percentage rounded to the nearest integer, for the numeric label.
    pub fn label_percentage(&self) -> Decimal {
        self.percentage.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn label(&self) -> String {
        format!("{}%", self.label_percentage())
    }

    pub fn gauge(&self) -> GaugeReading {
        GaugeReading {
            realized: self.realized,
            goal: self.goal,
            display_percentage: self.display_percentage,
            is_above_goal: self.is_above_goal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCount {
    pub label: String,
    pub count: u64,
    pub order: u32,
}

impl TierCount {
    pub fn new(label: impl Into<String>, count: u64, order: u32) -> Self {
        Self { label: label.into(), count, order }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWidth {
    pub label: String,
    pub count: u64,
    pub width_percent: Decimal,
}

/// Bar widths for a stacked tier breakdown, sorted by `order`.
///
/// Widths are relative to the largest tier. Zero-count tiers get no width;
/// any other tier is floored at [`MIN_TIER_WIDTH_PERCENT`].
pub fn breakdown_widths(tiers: &[TierCount]) -> Vec<TierWidth> {
    let max_count = tiers.iter().map(|tier| tier.count).max().unwrap_or(0).max(1);
    let max_count = Decimal::from(max_count);

    let mut ordered: Vec<&TierCount> = tiers.iter().collect();
    ordered.sort_by_key(|tier| tier.order);

    ordered
        .into_iter()
        .map(|tier| {
            let width_percent = if tier.count == 0 {
                Decimal::ZERO
            } else {
                (Decimal::from(tier.count) / max_count * HUNDRED).max(MIN_TIER_WIDTH_PERCENT)
            };
            TierWidth { label: tier.label.clone(), count: tier.count, width_percent }
        })
        .collect()
}
