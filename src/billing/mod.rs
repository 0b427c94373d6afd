//! Payment & licensing engine.
//!
//! Pricing, the payment lifecycle and gateway reconciliation. Storage work is
//! done in plain functions over a `Connection` (see the submodules); the
//! engine wires them to the pool and the injected gateway client.

mod checkout;
mod notification;
mod pricing;

pub use checkout::{PreparedPayment, prepare_payment, prepare_retry};
pub use notification::{map_gateway_status, reconcile_payment};
pub use pricing::{PricingInfo, apply_discount, find_usable_promo, resolve_pricing};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::models::{Payment, PaymentStatus};
use crate::payments::{
    CheckoutRequest, GatewayCustomer, GatewayNotification, PaymentGateway, verify_signature,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// License price before discounts, in whole currency units
    pub base_price: i64,
    /// Gateway server key, the secret behind notification signatures
    pub server_key: String,
    /// Where the gateway sends buyers after checkout
    pub finish_url: String,
}

/// Result of starting a checkout.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Nothing to pay; the payment is already SUCCESS and the user active.
    Completed { payment: Payment },
    /// Send the buyer to the gateway.
    Redirect { payment: Payment, redirect_url: String },
}

impl CheckoutOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            CheckoutOutcome::Completed { payment } | CheckoutOutcome::Redirect { payment, .. } => {
                payment
            }
        }
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            CheckoutOutcome::Completed { .. } => None,
            CheckoutOutcome::Redirect { redirect_url, .. } => Some(redirect_url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromoSlots {
    pub remaining_slots: i64,
    pub total_slots: i64,
}

#[derive(Clone)]
pub struct PaymentEngine {
    db: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    config: EngineConfig,
}

impl PaymentEngine {
    pub fn new(db: DbPool, gateway: Arc<dyn PaymentGateway>, config: EngineConfig) -> Self {
        Self { db, gateway, config }
    }

    pub fn resolve_pricing(&self, promo_code: Option<&str>) -> Result<PricingInfo> {
        let conn = self.db.get()?;
        resolve_pricing(&conn, self.config.base_price, promo_code, Utc::now().timestamp())
    }

    pub fn calculate_final_price(&self, promo_code: Option<&str>) -> Result<i64> {
        Ok(self.resolve_pricing(promo_code)?.discounted_price)
    }

    /// Start a license checkout for `user_id`.
    ///
    /// If the gateway call fails the PENDING payment stays in place and can be
    /// picked up again with [`PaymentEngine::retry_checkout`].
    pub async fn create_payment(
        &self,
        user_id: &str,
        promo_code: Option<&str>,
    ) -> Result<CheckoutOutcome> {
        let prepared = {
            let mut conn = self.db.get()?;
            prepare_payment(
                &mut conn,
                user_id,
                promo_code,
                self.config.base_price,
                Utc::now().timestamp(),
            )?
        };

        if prepared.payment.status == PaymentStatus::Success {
            return Ok(CheckoutOutcome::Completed {
                payment: prepared.payment,
            });
        }

        self.request_checkout(prepared).await
    }

    /// Request a fresh gateway session for an existing PENDING payment.
    pub async fn retry_checkout(&self, user_id: &str, payment_id: &str) -> Result<CheckoutOutcome> {
        let prepared = {
            let conn = self.db.get()?;
            prepare_retry(&conn, user_id, payment_id)?
        };
        self.request_checkout(prepared).await
    }

    async fn request_checkout(&self, prepared: PreparedPayment) -> Result<CheckoutOutcome> {
        let PreparedPayment { mut payment, user } = prepared;

        let request = CheckoutRequest {
            order_id: payment.gateway_order_id.clone(),
            amount: payment.amount,
            customer: GatewayCustomer {
                name: user.name,
                email: user.email,
            },
            finish_url: self.config.finish_url.clone(),
        };

        let session = match self.gateway.create_checkout_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    provider = self.gateway.provider_name(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Checkout session request failed; payment left PENDING"
                );
                return Err(e);
            }
        };

        let conn = self.db.get()?;
        queries::set_payment_checkout(&conn, &payment.id, &session.token, &session.redirect_url)?;

        payment.gateway_token = Some(session.token);
        payment.redirect_url = Some(session.redirect_url.clone());

        Ok(CheckoutOutcome::Redirect {
            payment,
            redirect_url: session.redirect_url,
        })
    }

    /// Whether the user holds a SUCCESS payment.
    pub fn get_payment_status(&self, user_id: &str) -> Result<bool> {
        let conn = self.db.get()?;
        queries::has_successful_payment(&conn, user_id)
    }

    /// Remaining quota for an active promo, from the live SUCCESS count.
    pub fn get_remaining_promo_slots(&self, code: &str) -> Result<PromoSlots> {
        let conn = self.db.get()?;
        let promo = queries::get_promo_code_by_code(&conn, code.trim())?
            .filter(|p| p.is_active)
            .ok_or(AppError::PromoNotFound)?;
        let used = queries::count_successful_promo_payments(&conn, &promo.code)?;

        Ok(PromoSlots {
            remaining_slots: (promo.max_uses - used).max(0),
            total_slots: promo.max_uses,
        })
    }

    /// Verify and apply an inbound gateway notification.
    ///
    /// Nothing is written unless the signature checks out and the gateway's
    /// status endpoint agrees with the claimed status.
    pub async fn handle_notification(&self, notification: &GatewayNotification) -> Result<Payment> {
        if !verify_signature(notification, &self.config.server_key) {
            tracing::warn!(
                order_id = %notification.order_id,
                transaction_status = %notification.transaction_status,
                "Notification signature mismatch"
            );
            return Err(AppError::InvalidSignature);
        }

        let confirmed = self
            .gateway
            .get_transaction_status(&notification.order_id)
            .await?;

        if confirmed.transaction_status != notification.transaction_status {
            tracing::warn!(
                order_id = %notification.order_id,
                claimed = %notification.transaction_status,
                actual = %confirmed.transaction_status,
                "Notification status disagrees with gateway"
            );
            return Err(AppError::StatusMismatch {
                claimed: notification.transaction_status.clone(),
                actual: confirmed.transaction_status,
            });
        }

        let fraud_status = confirmed
            .fraud_status
            .as_deref()
            .or(notification.fraud_status.as_deref());
        let status = map_gateway_status(&confirmed.transaction_status, fraud_status);
        let transaction_id = confirmed
            .transaction_id
            .as_deref()
            .or(notification.transaction_id.as_deref());

        let mut conn = self.db.get()?;
        reconcile_payment(&mut conn, &notification.order_id, status, transaction_id)
    }
}
