use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown, inactive or out-of-window promo code. The three cases are
    /// deliberately indistinguishable.
    #[error("Invalid promo code")]
    InvalidPromo,

    #[error("Promo code quota exhausted")]
    PromoExhausted,

    #[error("Promo code not found")]
    PromoNotFound,

    #[error("User already holds a successful payment")]
    DuplicatePayment,

    #[error("Invalid notification signature")]
    InvalidSignature,

    #[error("Gateway status mismatch: notification claimed {claimed}, gateway reports {actual}")]
    StatusMismatch { claimed: String, actual: String },

    #[error("Payment not found for order {0}")]
    PaymentNotFound(String),

    /// Network, timeout or upstream failure talking to the payment gateway.
    #[error("Payment gateway error: {message}")]
    Gateway { message: String, retryable: bool },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn gateway(message: impl Into<String>, retryable: bool) -> Self {
        AppError::Gateway {
            message: message.into(),
            retryable,
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Gateway { retryable: true, .. } | AppError::Pool(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        // Timeouts and connection failures are transient; decode errors are not.
        let retryable = e.is_timeout() || e.is_connect() || e.is_request();
        AppError::gateway(e.to_string(), retryable)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retryable = None;
        let (status, error, details) = match &self {
            AppError::InvalidPromo => (
                StatusCode::BAD_REQUEST,
                "Invalid promo code",
                Some("Kode promo tidak valid atau sudah tidak berlaku".to_string()),
            ),
            AppError::PromoExhausted => (
                StatusCode::CONFLICT,
                "Promo sold out",
                Some("Kuota kode promo sudah habis".to_string()),
            ),
            AppError::PromoNotFound => (StatusCode::NOT_FOUND, "Promo code not found", None),
            AppError::DuplicatePayment => (
                StatusCode::CONFLICT,
                "Already paid",
                Some("License has already been purchased for this account".to_string()),
            ),
            // Logged with order context where the notification is rejected
            AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, "Invalid signature", None),
            AppError::StatusMismatch { .. } => (StatusCode::CONFLICT, "Status mismatch", None),
            AppError::PaymentNotFound(order_id) => (
                StatusCode::NOT_FOUND,
                "Payment not found",
                Some(order_id.clone()),
            ),
            AppError::Gateway {
                message,
                retryable: r,
            } => {
                tracing::error!("Payment gateway error: {}", message);
                retryable = Some(*r);
                let status = if *r {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, "Payment gateway unavailable", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
