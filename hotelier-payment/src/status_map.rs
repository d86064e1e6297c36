use hotelier_core::payment::PaymentStatus;

/// Internal status for a provider notification, plus whether the vocabulary was known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedStatus {
    pub status: PaymentStatus,
    pub recognized: bool,
}

/// Provider `transaction_status` / `fraud_status` to internal payment status.
/// Unknown values, including a capture with any fraud verdict other than
/// accept or challenge, stay PENDING.
pub fn map_provider_status(transaction_status: &str, fraud_status: &str) -> MappedStatus {
    let transaction = transaction_status.trim().to_ascii_lowercase();
    let fraud = fraud_status.trim().to_ascii_lowercase();

    let status = match (transaction.as_str(), fraud.as_str()) {
        ("capture", "accept") | ("settlement", _) => PaymentStatus::Paid,
        ("capture", "challenge") | ("pending", _) => PaymentStatus::Pending,
        ("deny", _) | ("cancel", _) => PaymentStatus::Failed,
        ("expire", _) => PaymentStatus::Expired,
        _ => {
            return MappedStatus {
                status: PaymentStatus::Pending,
                recognized: false,
            }
        }
    };
    MappedStatus { status, recognized: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_vocabulary() {
        let cases = [
            ("settlement", "", PaymentStatus::Paid, true),
            ("capture", "accept", PaymentStatus::Paid, true),
            ("capture", "challenge", PaymentStatus::Pending, true),
            ("capture", "deny", PaymentStatus::Pending, false),
            ("capture", "", PaymentStatus::Pending, false),
            ("pending", "", PaymentStatus::Pending, true),
            ("deny", "", PaymentStatus::Failed, true),
            ("cancel", "", PaymentStatus::Failed, true),
            ("expire", "", PaymentStatus::Expired, true),
            ("SETTLEMENT", "", PaymentStatus::Paid, true),
            ("Capture", "ACCEPT", PaymentStatus::Paid, true),
        ];
        for (transaction, fraud, expected, recognized) in cases {
            let mapped = map_provider_status(transaction, fraud);
            assert_eq!(mapped.status, expected, "{}/{}", transaction, fraud);
            assert_eq!(mapped.recognized, recognized, "{}/{}", transaction, fraud);
        }
    }

    #[test]
    fn test_unknown_vocabulary_stays_pending() {
        let mapped = map_provider_status("authorize", "");
        assert_eq!(mapped.status, PaymentStatus::Pending);
        assert!(!mapped.recognized);
    }
}
