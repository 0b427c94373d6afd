//! License pricing and promo-code resolution.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{DiscountType, PromoCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingInfo {
    pub original_price: i64,
    pub discounted_price: i64,
    pub promo_code: Option<String>,
    pub promo_description: Option<String>,
}

impl PricingInfo {
    fn base(price: i64) -> Self {
        Self {
            original_price: price,
            discounted_price: price,
            promo_code: None,
            promo_description: None,
        }
    }
}

/// Apply a discount to `base`, never going below zero.
///
/// Percentage discounts round to the nearest whole currency unit.
pub fn apply_discount(base: i64, discount_type: DiscountType, value: i64) -> i64 {
    let price = match discount_type {
        DiscountType::Percentage => {
            (base as f64 * (1.0 - value as f64 / 100.0)).round() as i64
        }
        DiscountType::Fixed => base.saturating_sub(value),
    };
    price.max(0)
}

fn describe_promo(promo: &PromoCode, remaining: i64) -> String {
    if promo.discount_value == 100 {
        format!("Gratis akses penuh! Tersisa {} slot", remaining)
    } else {
        format!("{} (tersisa {} slot)", promo.description, remaining)
    }
}

/// Look up a promo that can be applied right now.
///
/// Unknown, inactive and out-of-window codes all fail with the same
/// `InvalidPromo` so callers cannot probe which codes exist. Returns the promo
/// and its live SUCCESS-payment count.
pub fn find_usable_promo(conn: &Connection, code: &str, now: i64) -> Result<(PromoCode, i64)> {
    let promo = queries::get_promo_code_by_code(conn, code)?
        .filter(|p| p.is_usable_at(now))
        .ok_or(AppError::InvalidPromo)?;

    let used = queries::count_successful_promo_payments(conn, &promo.code)?;
    if used >= promo.max_uses {
        return Err(AppError::PromoExhausted);
    }

    Ok((promo, used))
}

/// Resolve the license price for an optional promo code. Read-only.
pub fn resolve_pricing(
    conn: &Connection,
    base_price: i64,
    promo_code: Option<&str>,
    now: i64,
) -> Result<PricingInfo> {
    let code = match promo_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => return Ok(PricingInfo::base(base_price)),
    };

    let (promo, used) = find_usable_promo(conn, code, now)?;
    let remaining = promo.max_uses - used;

    Ok(PricingInfo {
        original_price: base_price,
        discounted_price: apply_discount(base_price, promo.discount_type, promo.discount_value),
        promo_description: Some(describe_promo(&promo, remaining)),
        promo_code: Some(promo.code),
    })
}
