use axum::{extract::State, response::Redirect};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Query;
use crate::models::PaymentStatus;
use crate::util::append_query_params;

#[derive(Debug, Deserialize)]
pub struct FinishQuery {
    pub order_id: String,
}

/// Landing point for the gateway's finish redirect.
///
/// Sends the buyer on to the app with the payment's stored status. Status
/// parameters the gateway appends are ignored: only a verified notification
/// moves a payment, so the redirect may well say "pending" for a while.
pub async fn payment_finish(
    State(state): State<AppState>,
    Query(query): Query<FinishQuery>,
) -> Result<Redirect> {
    let conn = state.db.get()?;

    let payment = queries::get_payment_by_order_id(&conn, &query.order_id)?
        .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;

    let status = match payment.status {
        PaymentStatus::Success => "success",
        PaymentStatus::Pending => "pending",
        PaymentStatus::Failed => "failed",
    };

    let redirect_url = append_query_params(
        &state.app_url,
        &[("order_id", &payment.gateway_order_id), ("status", status)],
    );
    Ok(Redirect::temporary(&redirect_url))
}
