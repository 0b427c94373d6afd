mod midtrans;

pub use midtrans::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/midtrans", post(handle_midtrans_webhook))
}
