//! Reconciling gateway notifications against local payment state.

use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{Payment, PaymentStatus};

use super::checkout::{apply_success_effects, duplicate_on_conflict};

/// Map the gateway's transaction vocabulary onto a payment status.
///
/// Matching is case-sensitive. Unknown statuses fail closed.
pub fn map_gateway_status(transaction_status: &str, fraud_status: Option<&str>) -> PaymentStatus {
    match (transaction_status, fraud_status) {
        ("capture", Some("challenge")) => PaymentStatus::Pending,
        ("capture", Some("accept")) => PaymentStatus::Success,
        ("capture", _) => PaymentStatus::Failed,
        ("settlement", _) => PaymentStatus::Success,
        ("pending", _) => PaymentStatus::Pending,
        ("deny" | "cancel" | "expire" | "failure", _) => PaymentStatus::Failed,
        _ => PaymentStatus::Failed,
    }
}

/// Apply a confirmed gateway status to the payment behind `order_id`.
///
/// Runs in one IMMEDIATE transaction and reads the prior status inside it.
/// A payment that is already SUCCESS or FAILED is returned untouched, so
/// replayed or concurrent deliveries never repeat activation or the promo
/// counter bump.
pub fn reconcile_payment(
    conn: &mut Connection,
    order_id: &str,
    status: PaymentStatus,
    transaction_id: Option<&str>,
) -> Result<Payment> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let payment = queries::get_payment_by_order_id(&tx, order_id)?
        .ok_or_else(|| AppError::PaymentNotFound(order_id.to_string()))?;

    if payment.status.is_terminal() {
        tracing::info!(
            payment_id = %payment.id,
            stored = ?payment.status,
            notified = ?status,
            "Notification for terminal payment ignored"
        );
        return Ok(payment);
    }

    let moved = queries::transition_payment_status(&tx, &payment.id, status, transaction_id)
        .map_err(duplicate_on_conflict)?;
    if !moved {
        return Err(AppError::Internal(format!(
            "Payment {} left PENDING inside a write transaction",
            payment.id
        )));
    }

    let updated = queries::get_payment_by_id(&tx, &payment.id)?
        .ok_or_else(|| AppError::PaymentNotFound(order_id.to_string()))?;

    if status == PaymentStatus::Success {
        apply_success_effects(&tx, &updated)?;
    }
    tx.commit()?;

    if status != PaymentStatus::Pending {
        tracing::info!(
            payment_id = %updated.id,
            user_id = %updated.user_id,
            status = ?updated.status,
            "Payment reconciled"
        );
    }

    Ok(updated)
}
