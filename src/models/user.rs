use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Flips to true exactly once, when the user's license payment succeeds
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    Inactive,
    Active,
}

/// Per-user account settings, created alongside the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub user_id: String,
    pub license_key: Option<String>,
    pub license_status: LicenseStatus,
    pub invoice_prefix: String,
    /// Last invoice sequence number issued
    pub invoice_counter: i64,
    /// Tax rate in percent applied to new invoices
    pub tax_rate: f64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettings {
    pub invoice_prefix: Option<String>,
    pub tax_rate: Option<f64>,
}
