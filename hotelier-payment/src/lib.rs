pub mod gateway;
pub mod manager;
pub mod memory;
pub mod order_id;
pub mod signature;
pub mod status_map;

pub use gateway::{MockGateway, SnapGateway};
pub use manager::{NoticeDelivery, PaymentManager, PaymentSettings, ReconcileOutcome, RedeliveryReport, RefundOutcome};
pub use memory::InMemoryPayments;
