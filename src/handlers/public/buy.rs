use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::billing::CheckoutOutcome;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::models::PaymentStatus;

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub user_id: String,
    #[serde(default)]
    pub promo_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RetryRequest {
    pub user_id: String,
}

/// Checkout result. `redirect_url` is absent when nothing was left to pay.
#[derive(Debug, Serialize)]
pub struct BuyResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl From<CheckoutOutcome> for BuyResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        let redirect_url = outcome.redirect_url().map(String::from);
        let payment = outcome.payment();
        Self {
            payment_id: payment.id.clone(),
            status: payment.status,
            amount: payment.amount,
            redirect_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub paid: bool,
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<BuyRequest>,
) -> Result<Json<BuyResponse>> {
    let outcome = state
        .engine
        .create_payment(&request.user_id, request.promo_code.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

/// Re-request a gateway session for a PENDING payment whose checkout failed.
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(request): Json<RetryRequest>,
) -> Result<Json<BuyResponse>> {
    let outcome = state
        .engine
        .retry_checkout(&request.user_id, &payment_id)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>> {
    let paid = state.engine.get_payment_status(&user_id)?;
    Ok(Json(PaymentStatusResponse { paid }))
}
