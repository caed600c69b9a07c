pub mod business_unit;
pub mod month;
pub mod realization;

pub use business_unit::BusinessUnit;
pub use month::Month;
pub use realization::{CellKey, RealizationRecord};
