use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::config::GatewayConfig;
use crate::error::{AppError, Result};

use super::{CheckoutRequest, CheckoutSession, PaymentGateway, TransactionStatus};

const SNAP_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";
const SNAP_PRODUCTION_URL: &str = "https://app.midtrans.com/snap/v1/transactions";
const API_SANDBOX_URL: &str = "https://api.sandbox.midtrans.com";
const API_PRODUCTION_URL: &str = "https://api.midtrans.com";

#[derive(Debug, Serialize)]
struct SnapTransactionRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    customer_details: CustomerDetails<'a>,
    callbacks: Callbacks<'a>,
}

#[derive(Debug, Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Callbacks<'a> {
    finish: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapErrorResponse {
    #[serde(default)]
    error_messages: Vec<String>,
}

/// Midtrans Snap (checkout) and Core API (status) client.
#[derive(Debug, Clone)]
pub struct MidtransClient {
    client: Client,
    server_key: String,
    snap_url: &'static str,
    api_url: &'static str,
}

impl MidtransClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let (snap_url, api_url) = if config.production {
            (SNAP_PRODUCTION_URL, API_PRODUCTION_URL)
        } else {
            (SNAP_SANDBOX_URL, API_SANDBOX_URL)
        };

        Ok(Self {
            client,
            server_key: config.server_key.clone(),
            snap_url,
            api_url,
        })
    }

    /// Server key as HTTP Basic credentials (key as username, empty password).
    fn auth_header(&self) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:", self.server_key)))
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    fn provider_name(&self) -> &'static str {
        "midtrans"
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let body = SnapTransactionRequest {
            transaction_details: TransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.amount,
            },
            customer_details: CustomerDetails {
                first_name: &request.customer.name,
                email: &request.customer.email,
            },
            callbacks: Callbacks {
                finish: &request.finish_url,
            },
        };

        let response = self
            .client
            .post(self.snap_url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<SnapErrorResponse>(&error_text)
                .map(|e| e.error_messages.join("; "))
                .unwrap_or(error_text);
            return Err(AppError::gateway(
                format!("Midtrans Snap error ({}): {}", status, detail),
                status.is_server_error(),
            ));
        }

        let session: SnapTransactionResponse = response.json().await.map_err(|e| {
            AppError::gateway(format!("Failed to parse Midtrans Snap response: {}", e), false)
        })?;

        Ok(CheckoutSession {
            token: session.token,
            redirect_url: session.redirect_url,
        })
    }

    async fn get_transaction_status(&self, order_id: &str) -> Result<TransactionStatus> {
        let url = format!(
            "{}/v2/{}/status",
            self.api_url,
            urlencoding::encode(order_id)
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::gateway(
                format!("Midtrans status error ({}): {}", status, error_text),
                status.is_server_error(),
            ));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::gateway(format!("Failed to parse Midtrans status response: {}", e), false)
        })?;

        // Midtrans answers unknown orders with HTTP 200 and an in-body status_code of 404
        if body.get("status_code").and_then(|v| v.as_str()) == Some("404") {
            return Err(AppError::gateway(
                format!("Midtrans has no transaction for order {}", order_id),
                false,
            ));
        }

        serde_json::from_value(body).map_err(|e| {
            AppError::gateway(format!("Unexpected Midtrans status payload: {}", e), false)
        })
    }
}

/// Inbound HTTP notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

/// SHA-512 hex digest over `order_id + status_code + gross_amount + server_key`.
pub fn compute_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time check of a notification's `signature_key`.
pub fn verify_signature(notification: &GatewayNotification, server_key: &str) -> bool {
    let expected = compute_signature(
        &notification.order_id,
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );
    let supplied = notification.signature_key.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
