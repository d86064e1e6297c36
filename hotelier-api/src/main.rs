use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use axum::Router;
use hotelier_api::notifier::{BookingServiceClient, PaymentServiceClient};
use hotelier_api::state::{booking_settings, gateway_breaker, payment_settings};
use hotelier_api::{app, bookings, catalog, payments, worker, AuthConfig, BookingState, CatalogState, PaymentState};
use hotelier_booking::BookingManager;
use hotelier_catalog::{seed_sample, PricingOracle};
use hotelier_core::payment::PaymentGateway;
use hotelier_payment::{MockGateway, PaymentManager, SnapGateway};
use hotelier_store::app_config::{Config, GatewayMode, ServiceKind};
use hotelier_store::{
    DbClient, StoreBookingRepository, StoreInventoryRepository, StorePaymentRepository, StoreRoomTypeRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hotelier_api=debug,hotelier_booking=debug,hotelier_payment=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting {:?} service on port {}", config.server.service, config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let auth = AuthConfig::from(&config.auth);
    let routes = match config.server.service {
        ServiceKind::Catalog => catalog_routes(&config, &db, auth).await?,
        ServiceKind::Booking => booking_routes(&config, &db, auth)?,
        ServiceKind::Payment => payment_routes(&config, &db, auth)?,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(routes)).await?;
    Ok(())
}

fn oracle(db: &DbClient) -> PricingOracle {
    PricingOracle::new(
        Arc::new(StoreRoomTypeRepository::new(db.pool.clone())),
        Arc::new(StoreInventoryRepository::new(db.pool.clone())),
    )
}

async fn catalog_routes(config: &Config, db: &DbClient, auth: AuthConfig) -> anyhow::Result<Router> {
    let oracle = oracle(db);
    if config.booking.seed_sample {
        seed_sample(
            oracle.room_types().as_ref(),
            oracle.inventory().as_ref(),
            chrono::Utc::now().date_naive(),
        )
        .await
        .context("Failed to seed sample catalog")?;
    }
    Ok(catalog::routes(CatalogState { auth, oracle }))
}

fn booking_routes(config: &Config, db: &DbClient, auth: AuthConfig) -> anyhow::Result<Router> {
    let payments = PaymentServiceClient::new(&config.services, &config.auth.internal_token)
        .context("Failed to build payment service client")?;
    let manager = Arc::new(BookingManager::new(
        Arc::new(StoreBookingRepository::new(db.pool.clone())),
        oracle(db),
        Arc::new(payments),
        booking_settings(config),
    ));

    tokio::spawn(worker::start_release_worker(
        manager.clone(),
        Duration::from_secs(config.booking.release_interval_secs),
    ));

    Ok(bookings::routes(BookingState {
        auth,
        bookings: manager,
    }))
}

fn payment_routes(config: &Config, db: &DbClient, auth: AuthConfig) -> anyhow::Result<Router> {
    let gateway: Arc<dyn PaymentGateway> = match config.payment.gateway {
        GatewayMode::Mock => {
            tracing::warn!("Using mock payment gateway; status simulation is enabled");
            Arc::new(MockGateway)
        }
        GatewayMode::Snap => Arc::new(
            SnapGateway::new(
                config.payment.gateway_url.clone(),
                config.payment.server_key.clone(),
                Duration::from_millis(config.payment.gateway_timeout_ms),
            )
            .context("Failed to build payment gateway client")?,
        ),
    };

    let booking_service = Arc::new(
        BookingServiceClient::new(&config.services, &config.auth.internal_token)
            .context("Failed to build booking service client")?,
    );
    let manager = Arc::new(PaymentManager::new(
        Arc::new(StorePaymentRepository::new(db.pool.clone())),
        gateway,
        booking_service.clone(),
        booking_service,
        payment_settings(config),
    ));

    tokio::spawn(worker::start_redelivery_worker(
        manager.clone(),
        Duration::from_secs(config.payment.redelivery_interval_secs),
    ));

    Ok(payments::routes(PaymentState {
        auth,
        payments: manager,
        gateway_breaker: Arc::new(gateway_breaker(&config.payment)),
    }))
}
