use sha2::{Digest, Sha512};
use hotelier_core::payment::ProviderNotification;
use hotelier_core::{CoreError, CoreResult};

/// `hex(sha512(order_id + status_code + gross_amount + server_key))`
pub fn expected_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject the notification unless its `signature_key` matches. An empty key never matches.
pub fn verify_notification(notification: &ProviderNotification, server_key: &str) -> CoreResult<()> {
    let expected = expected_signature(
        &notification.order_id,
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );
    let supplied = notification.signature_key.trim().to_ascii_lowercase();
    if supplied.is_empty() || !constant_time_eq(expected.as_bytes(), supplied.as_bytes()) {
        return Err(CoreError::InvalidSignature);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
