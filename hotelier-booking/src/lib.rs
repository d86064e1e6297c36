pub mod code;
pub mod manager;
pub mod memory;
pub mod tax;

pub use manager::{BookingManager, BookingSettings, CreateBookingRequest, CreatedBooking, ReleaseReport};
pub use memory::InMemoryBookings;
pub use tax::{BasisPointTax, NoTax, TaxPolicy};
