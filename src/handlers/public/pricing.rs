use axum::extract::State;
use serde::Deserialize;

use crate::billing::{PricingInfo, PromoSlots};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Query};

#[derive(Debug, Deserialize)]
pub struct PricingQuery {
    #[serde(default)]
    pub promo: Option<String>,
}

/// License price, with the promo applied when one is given.
pub async fn get_pricing(
    State(state): State<AppState>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<PricingInfo>> {
    let pricing = state.engine.resolve_pricing(query.promo.as_deref())?;
    Ok(Json(pricing))
}

pub async fn get_promo_slots(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PromoSlots>> {
    let slots = state.engine.get_remaining_promo_slots(&code)?;
    Ok(Json(slots))
}
