pub mod inventory;
pub mod pricing;
pub mod room_types;
pub mod seed;

pub use inventory::InMemoryInventory;
pub use pricing::PricingOracle;
pub use room_types::InMemoryRoomTypes;
pub use seed::seed_sample;
