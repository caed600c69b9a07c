use sqlx::error::ErrorKind;

use goalboard_core::store::StoreError;

pub mod memory;
pub mod realization;

pub use memory::InMemoryRealizationRepository;
pub use realization::SqlRealizationRepository;

/// Maps a sqlx failure onto the store's two-way classification.
///
/// Integrity rejections from the schema are permanent; everything else
/// (pool exhaustion, I/O, missing tables) is treated as transient.
pub(crate) fn store_error(error: sqlx::Error) -> StoreError {
    if let Some(database_error) = error.as_database_error() {
        match database_error.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                return StoreError::ConstraintViolation(database_error.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::Unavailable(error.to_string())
}
