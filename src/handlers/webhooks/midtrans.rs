use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::db::AppState;
use crate::error::AppError;
use crate::payments::GatewayNotification;

/// Midtrans HTTP notification endpoint.
///
/// Any 2xx tells Midtrans to stop retrying, so outcomes that a retry cannot
/// fix (unknown order, a second SUCCESS for an already-licensed user) are
/// acknowledged with 200 after logging. Forged or disputed notifications and
/// transient failures get an error status.
pub async fn handle_midtrans_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let notification: GatewayNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Failed to parse Midtrans notification: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    match state.engine.handle_notification(&notification).await {
        Ok(payment) => {
            tracing::debug!(
                order_id = %notification.order_id,
                status = ?payment.status,
                "Midtrans notification processed"
            );
            (StatusCode::OK, "OK").into_response()
        }
        Err(AppError::PaymentNotFound(order_id)) => {
            tracing::warn!(
                order_id = %order_id,
                "Midtrans notification for unknown order acknowledged"
            );
            (StatusCode::OK, "Payment not found").into_response()
        }
        Err(AppError::DuplicatePayment) => {
            tracing::error!(
                order_id = %notification.order_id,
                "Second successful payment for an already-licensed user; needs refund"
            );
            (StatusCode::OK, "Already licensed").into_response()
        }
        Err(e) => e.into_response(),
    }
}
