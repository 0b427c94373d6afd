//! Invoicely - invoicing for small businesses, paid for with a one-time license
//!
//! This library provides the license payment engine (pricing, promo codes,
//! gateway checkout and notification reconciliation), the invoice ledger,
//! the overdue reminder sweep, and the HTTP handlers that expose them.

pub mod billing;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod invoices;
pub mod models;
pub mod payments;
pub mod reminders;
pub mod util;

use axum::Router;

use crate::db::AppState;

/// All routes, with state attached.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router())
        .merge(handlers::webhooks::router())
        .merge(handlers::invoices::router())
        .with_state(state)
}
