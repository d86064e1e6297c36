use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};
use hotelier_booking::BookingManager;
use hotelier_payment::PaymentManager;

/// Periodically re-sends booking notices that could not be delivered when the
/// payment changed status.
pub async fn start_redelivery_worker(payments: Arc<PaymentManager>, every: Duration) {
    // interval() panics on a zero period
    let every = every.max(Duration::from_secs(1));
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Notice redelivery worker started, running every {:?}", every);

    loop {
        ticker.tick().await;
        match payments.redeliver_pending().await {
            Ok(report) if report.failed > 0 => {
                error!("{} booking notices still undeliverable", report.failed);
            }
            Ok(_) => {}
            Err(e) => error!("Notice redelivery failed: {}", e),
        }
    }
}

/// Periodically returns rooms whose release failed after a cancel or refund.
pub async fn start_release_worker(bookings: Arc<BookingManager>, every: Duration) {
    let every = every.max(Duration::from_secs(1));
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Inventory release worker started, running every {:?}", every);

    loop {
        ticker.tick().await;
        match bookings.release_pending().await {
            Ok(report) if report.failed > 0 => {
                error!("{} bookings still hold rooms they should have released", report.failed);
            }
            Ok(_) => {}
            Err(e) => error!("Inventory release pass failed: {}", e),
        }
    }
}
