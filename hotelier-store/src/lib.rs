pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod payment_repo;

pub use app_config::Config;
pub use booking_repo::StoreBookingRepository;
pub use catalog_repo::{StoreInventoryRepository, StoreRoomTypeRepository};
pub use database::DbClient;
pub use payment_repo::StorePaymentRepository;

use hotelier_core::CoreError;

/// Unique violations are lost races; check violations are bad input; the rest is opaque.
pub(crate) fn storage_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return CoreError::StorageConflict(db.message().to_string()),
            Some("23514") => return CoreError::InvalidRequest(db.message().to_string()),
            _ => {}
        }
    }
    CoreError::Storage(err.to_string())
}

pub(crate) fn corrupt(what: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(format!("unreadable {}: {}", what, err))
}
