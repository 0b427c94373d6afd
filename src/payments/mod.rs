mod midtrans;

pub use midtrans::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Buyer details forwarded to the gateway's checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCustomer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Idempotency/order key; always the local payment id
    pub order_id: String,
    pub amount: i64,
    pub customer: GatewayCustomer,
    /// Where the gateway sends the buyer once they finish
    pub finish_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub token: String,
    pub redirect_url: String,
}

/// Transaction state as reported by the gateway's own status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Outbound payment gateway operations.
///
/// Injected into the payment engine at start-up so tests can swap in a double.
/// Implementations must bound every call with a timeout and report transport
/// failures as retryable `AppError::Gateway` errors.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logging (e.g., "midtrans")
    fn provider_name(&self) -> &'static str;

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    async fn get_transaction_status(&self, order_id: &str) -> Result<TransactionStatus>;
}
