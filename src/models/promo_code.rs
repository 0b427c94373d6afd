use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: String,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    /// Percent (0-100) for `Percentage`, whole currency units for `Fixed`
    pub discount_value: i64,
    pub max_uses: i64,
    /// Reporting counter only. Quota checks count SUCCESS payments instead.
    pub current_uses: i64,
    pub is_active: bool,
    pub start_date: i64,
    pub end_date: i64,
    pub created_at: i64,
}

impl PromoCode {
    /// Active and inside its validity window (both ends inclusive).
    pub fn is_usable_at(&self, now: i64) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePromoCode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub start_date: i64,
    pub end_date: i64,
}

fn default_true() -> bool {
    true
}
