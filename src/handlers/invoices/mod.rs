mod customers;
mod ledger;
mod settings;

pub use customers::*;
pub use ledger::*;
pub use settings::*;

use axum::{
    Router,
    routing::{post, put},
};

use crate::db::AppState;

/// Invoicing routes. Each handler requires the owner to hold a paid license.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}/customers", post(create_customer))
        .route("/users/{user_id}/invoices", post(create_invoice))
        .route("/users/{user_id}/settings", put(update_settings))
        .route("/invoices/{invoice_id}/paid", post(mark_invoice_paid))
}
