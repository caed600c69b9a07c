pub mod aggregation;
pub mod attainment;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod goals;
pub mod service;
pub mod store;

pub use aggregation::{build_matrix, grand_total, total_for, DomainInconsistency, RealizationMatrix};
pub use attainment::{
    attainment, breakdown_widths, GaugeReading, GoalAttainment, TierCount, TierWidth,
};
pub use cache::{CacheState, FetchTicket, RealizationCache};
pub use domain::{BusinessUnit, CellKey, Month, RealizationRecord};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use goals::{BuPerformance, GoalBook, GoalSet, MonthPerformance, PerformanceSummary};
pub use service::{FetchPolicy, RealizationService};
pub use store::{RealizationStore, StoreError};
