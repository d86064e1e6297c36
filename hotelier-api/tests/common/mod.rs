#![allow(dead_code)]

use std::sync::Arc;
use axum::Router;
use chrono::NaiveDate;
use jsonwebtoken::{encode, EncodingKey, Header};
use hotelier_api::middleware::resiliency::CircuitBreaker;
use hotelier_api::middleware::Claims;
use hotelier_api::notifier::{InProcessBookings, InProcessPayments};
use hotelier_api::{app, bookings, catalog, payments, AuthConfig, BookingState, CatalogState, PaymentState};
use hotelier_booking::{BookingManager, BookingSettings, CreateBookingRequest, InMemoryBookings};
use hotelier_catalog::{InMemoryInventory, InMemoryRoomTypes, PricingOracle};
use hotelier_core::booking::RequestedItem;
use hotelier_core::catalog::{InventoryDay, RoomType};
use hotelier_core::identity::Identity;
use hotelier_core::repository::{InventoryRepository, RoomTypeRepository};
use hotelier_payment::signature::expected_signature;
use hotelier_payment::{InMemoryPayments, MockGateway, PaymentManager, PaymentSettings};

pub const SERVER_KEY: &str = "SB-Mid-server-flow";
pub const JWT_SECRET: &str = "flow-secret";
pub const INTERNAL_TOKEN: &str = "flow-internal";

/// Both managers wired to each other in one process, over in-memory storage.
pub struct Harness {
    pub bookings: Arc<BookingManager>,
    pub payments: Arc<PaymentManager>,
    pub oracle: PricingOracle,
    pub inventory: Arc<InMemoryInventory>,
    pub booking_repo: Arc<InMemoryBookings>,
    pub payment_repo: Arc<InMemoryPayments>,
    pub room: RoomType,
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Deluxe at 100000, with 2025-09-02 overridden to 115000; five rooms per night.
pub async fn harness() -> Harness {
    let room_types = Arc::new(InMemoryRoomTypes::new());
    let inventory = Arc::new(InMemoryInventory::new());
    let room = RoomType::new("Deluxe", 100_000, 2);
    room_types.upsert_room_type(&room).await.unwrap();
    inventory
        .upsert_day(&InventoryDay::new(room.id, date("2025-09-01"), 5))
        .await
        .unwrap();
    inventory
        .upsert_day(&InventoryDay::new(room.id, date("2025-09-02"), 5).with_override(115_000))
        .await
        .unwrap();
    let oracle = PricingOracle::new(room_types, inventory.clone());

    let booking_repo = Arc::new(InMemoryBookings::new());
    let payment_repo = Arc::new(InMemoryPayments::new());
    let payments_link = Arc::new(InProcessPayments::new());
    let bookings_link = Arc::new(InProcessBookings::new());

    let bookings = Arc::new(BookingManager::new(
        booking_repo.clone(),
        oracle.clone(),
        payments_link.clone(),
        BookingSettings::default(),
    ));
    let payments = Arc::new(PaymentManager::new(
        payment_repo.clone(),
        Arc::new(MockGateway),
        bookings_link.clone(),
        bookings_link.clone(),
        PaymentSettings {
            server_key: SERVER_KEY.to_string(),
            allow_simulation: true,
            ..PaymentSettings::default()
        },
    ));
    assert!(payments_link.bind(payments.clone()));
    assert!(bookings_link.bind(bookings.clone()));

    Harness {
        bookings,
        payments,
        oracle,
        inventory,
        booking_repo,
        payment_repo,
        room,
    }
}

impl Harness {
    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            secret: JWT_SECRET.to_string(),
            internal_token: INTERNAL_TOKEN.to_string(),
        }
    }

    /// All three services behind one router.
    pub fn router(&self) -> Router {
        self.router_with_breaker(CircuitBreaker::new("test-gateway", 5, std::time::Duration::from_secs(30)))
    }

    pub fn router_with_breaker(&self, breaker: CircuitBreaker) -> Router {
        let routes = Router::new()
            .merge(catalog::routes(CatalogState {
                auth: self.auth(),
                oracle: self.oracle.clone(),
            }))
            .merge(bookings::routes(BookingState {
                auth: self.auth(),
                bookings: self.bookings.clone(),
            }))
            .merge(payments::routes(PaymentState {
                auth: self.auth(),
                payments: self.payments.clone(),
                gateway_breaker: Arc::new(breaker),
            }));
        app(routes)
    }

    pub async fn available(&self, day: &str) -> i32 {
        self.inventory
            .day(self.room.id, date(day))
            .await
            .map(|d| d.available)
            .unwrap_or_default()
    }

    pub fn stay(&self, quantity: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            check_in: date("2025-09-01"),
            check_out: date("2025-09-03"),
            guests: 2,
            items: vec![RequestedItem {
                room_type_id: self.room.id,
                quantity,
            }],
            guest_name: None,
        }
    }
}

pub fn guest(user_id: &str) -> Identity {
    Identity::new(user_id, format!("{}@example.com", user_id))
}

/// Signed provider notification body.
pub fn notification(order_id: &str, transaction_status: &str) -> Vec<u8> {
    let status_code = "200";
    let gross_amount = "430000.00";
    serde_json::json!({
        "order_id": order_id,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "transaction_status": transaction_status,
        "fraud_status": "accept",
        "transaction_time": "2025-08-01 10:15:00",
        "transaction_id": "tx-flow",
        "signature_key": expected_signature(order_id, status_code, gross_amount, SERVER_KEY),
    })
    .to_string()
    .into_bytes()
}

pub fn token(user_id: &str, role: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        role: role.to_string(),
        name: None,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}
