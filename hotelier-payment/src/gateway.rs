use async_trait::async_trait;
use std::time::Duration;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;
use hotelier_core::payment::{GatewayRefund, GatewayRefundRequest, GatewaySession, PaymentGateway, SessionRequest};
use hotelier_core::{CoreError, CoreResult};

pub const MOCK_REDIRECT_BASE: &str = "https://mock-payments.local/redirect";

/// Local development gateway: every session succeeds with a random token.
#[derive(Debug, Default, Clone)]
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> CoreResult<GatewaySession> {
        let token = Uuid::new_v4().to_string();
        debug!("Mock session {} for order {}", token, request.order_id);
        Ok(GatewaySession {
            redirect_url: format!("{}/{}", MOCK_REDIRECT_BASE, token),
            token,
        })
    }

    async fn refund(&self, request: &GatewayRefundRequest) -> CoreResult<GatewayRefund> {
        Ok(GatewayRefund {
            reference: format!("mock-{}", request.idempotency_key),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Snap-style HTTP gateway authenticated with the merchant server key.
pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

#[derive(Deserialize)]
struct SnapTransaction {
    token: String,
    redirect_url: String,
}

#[derive(Deserialize)]
struct SnapRefund {
    #[serde(default)]
    refund_key: Option<String>,
    #[serde(default)]
    refund_chargeback_id: Option<serde_json::Value>,
}

impl SnapGateway {
    pub fn new(base_url: impl Into<String>, server_key: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::GatewayUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server_key: server_key.into(),
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, body: serde_json::Value) -> CoreResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::GatewayUnavailable(format!("{} returned {}", path, status)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| CoreError::GatewayUnavailable(format!("unreadable response from {}: {}", path, e)))
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn create_session(&self, request: &SessionRequest) -> CoreResult<GatewaySession> {
        let body = json!({
            "transaction_details": {
                "order_id": request.order_id,
                "gross_amount": request.amount,
            },
            "customer_details": {
                "email": request.customer_email.expose(),
                "first_name": request.customer_name,
            },
            "item_details": request.line_items.iter().map(|item| json!({
                "id": item.id,
                "name": item.name,
                "price": item.price,
                "quantity": item.quantity,
            })).collect::<Vec<_>>(),
        });
        let created: SnapTransaction = self.post("/snap/v1/transactions", body).await?;
        Ok(GatewaySession {
            token: created.token,
            redirect_url: created.redirect_url,
        })
    }

    async fn refund(&self, request: &GatewayRefundRequest) -> CoreResult<GatewayRefund> {
        let body = json!({
            "refund_key": request.idempotency_key,
            "amount": request.amount,
            "reason": request.reason,
        });
        let path = format!("/v2/{}/refund", request.order_id);
        let refunded: SnapRefund = self.post(&path, body).await?;
        let reference = refunded
            .refund_chargeback_id
            .map(|id| id.to_string())
            .or(refunded.refund_key)
            .unwrap_or_else(|| request.idempotency_key.clone());
        Ok(GatewayRefund { reference })
    }

    fn name(&self) -> &'static str {
        "snap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotelier_shared::Masked;

    #[tokio::test]
    async fn test_mock_gateway_session() {
        let request = SessionRequest {
            order_id: "abc-1".into(),
            amount: 430_000,
            currency: "IDR".into(),
            customer_email: Masked("guest@example.com".into()),
            customer_name: "Guest".into(),
            line_items: vec![],
        };

        let session = MockGateway.create_session(&request).await.unwrap();
        assert_eq!(session.redirect_url, format!("{}/{}", MOCK_REDIRECT_BASE, session.token));
        assert!(Uuid::parse_str(&session.token).is_ok());
    }

    #[tokio::test]
    async fn test_snap_gateway_unreachable_is_gateway_unavailable() {
        let gateway = SnapGateway::new("http://127.0.0.1:9", "key", Duration::from_millis(200)).unwrap();
        let request = GatewayRefundRequest {
            order_id: "abc-1".into(),
            amount: 1,
            reason: String::new(),
            idempotency_key: "refund-abc-1".into(),
        };

        let err = gateway.refund(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::GatewayUnavailable(_)));
    }
}
