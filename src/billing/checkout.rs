//! Payment creation: the storage half of a checkout.

use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{CreatePayment, Payment, PaymentStatus, User};

use super::pricing::resolve_pricing;

/// Payment row plus the buyer it belongs to.
#[derive(Debug)]
pub struct PreparedPayment {
    pub payment: Payment,
    pub user: User,
}

/// Map a partial-unique-index violation on SUCCESS payments to `DuplicatePayment`.
pub(crate) fn duplicate_on_conflict(err: AppError) -> AppError {
    if queries::is_constraint_violation(&err) {
        AppError::DuplicatePayment
    } else {
        err
    }
}

/// Side effects of a payment reaching SUCCESS: activate the user, issue the
/// license and bump the promo's reporting counter. Must run inside the
/// transaction that performed the transition.
pub(crate) fn apply_success_effects(conn: &Connection, payment: &Payment) -> Result<()> {
    if queries::activate_user(conn, &payment.user_id)? {
        tracing::info!(user_id = %payment.user_id, "User activated");
    }
    queries::activate_license(conn, &payment.user_id)?;

    if let Some(code) = &payment.promo_code {
        queries::increment_promo_uses(conn, code)?;
        if let Some(promo) = queries::get_promo_code_by_code(conn, code)? {
            let used = queries::count_successful_promo_payments(conn, code)?;
            if used > promo.max_uses {
                tracing::warn!(
                    promo_code = %code,
                    used,
                    max_uses = promo.max_uses,
                    payment_id = %payment.id,
                    "Promo quota exceeded at settlement; payment kept as SUCCESS"
                );
            }
        }
    }
    Ok(())
}

/// Price the checkout and insert the payment row.
///
/// A zero price is settled on the spot: the SUCCESS payment, user activation
/// and promo counter happen in one IMMEDIATE transaction. Anything else is
/// inserted PENDING and waits for a gateway session.
pub fn prepare_payment(
    conn: &mut Connection,
    user_id: &str,
    promo_code: Option<&str>,
    base_price: i64,
    now: i64,
) -> Result<PreparedPayment> {
    let user = queries::get_user_by_id(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    // Fast path only; the partial unique index is authoritative
    if queries::has_successful_payment(conn, user_id)? {
        return Err(AppError::DuplicatePayment);
    }

    let pricing = resolve_pricing(conn, base_price, promo_code, now)?;
    let promo_code_id = match &pricing.promo_code {
        Some(code) => queries::get_promo_code_by_code(conn, code)?.map(|p| p.id),
        None => None,
    };

    let status = if pricing.discounted_price == 0 {
        PaymentStatus::Success
    } else {
        PaymentStatus::Pending
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let payment = queries::create_payment(
        &tx,
        &CreatePayment {
            user_id: user.id.clone(),
            amount: pricing.discounted_price,
            status,
            promo_code: pricing.promo_code.clone(),
            promo_code_id,
        },
    )
    .map_err(duplicate_on_conflict)?;

    if status == PaymentStatus::Success {
        apply_success_effects(&tx, &payment)?;
    }
    tx.commit()?;

    tracing::info!(
        payment_id = %payment.id,
        user_id = %user.id,
        amount = payment.amount,
        status = ?payment.status,
        promo_code = payment.promo_code.as_deref().unwrap_or("-"),
        "Payment created"
    );

    Ok(PreparedPayment { payment, user })
}

/// Load the owner's PENDING payment so a new gateway session can be requested.
pub fn prepare_retry(conn: &Connection, user_id: &str, payment_id: &str) -> Result<PreparedPayment> {
    let payment = queries::get_payment_by_id(conn, payment_id)?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;

    match payment.status {
        PaymentStatus::Pending => {}
        PaymentStatus::Success => return Err(AppError::DuplicatePayment),
        PaymentStatus::Failed => {
            return Err(AppError::BadRequest(
                "Payment has failed; start a new checkout instead".into(),
            ));
        }
    }

    let user = queries::get_user_by_id(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(PreparedPayment { payment, user })
}
