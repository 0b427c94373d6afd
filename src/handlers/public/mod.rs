mod buy;
mod callback;
mod pricing;

pub use buy::*;
pub use callback::*;
pub use pricing::*;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/pricing", get(get_pricing))
        .route("/promos/{code}/slots", get(get_promo_slots))
        .route("/payments", post(create_payment))
        .route("/payments/{payment_id}/retry", post(retry_payment))
        .route("/users/{user_id}/payment-status", get(get_payment_status))
        .route("/payment/finish", get(payment_finish))
}
