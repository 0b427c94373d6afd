use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    /// SUCCESS and FAILED never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    /// Final price after discount, in whole currency units
    pub amount: i64,
    pub status: PaymentStatus,
    /// Raw promo code string as entered at checkout
    pub promo_code: Option<String>,
    pub promo_code_id: Option<String>,
    /// Order key sent to the gateway (the payment id)
    pub gateway_order_id: String,
    pub gateway_token: Option<String>,
    pub redirect_url: Option<String>,
    /// Gateway's own transaction id, learned from notifications
    pub transaction_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug)]
pub struct CreatePayment {
    pub user_id: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub promo_code: Option<String>,
    pub promo_code_id: Option<String>,
}
