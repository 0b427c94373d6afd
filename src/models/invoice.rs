use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    Sent,
    Overdue,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub user_id: String,
    pub customer_id: String,
    /// e.g. INV-0007
    pub number: String,
    pub status: InvoiceStatus,
    pub issue_date: i64,
    pub due_date: i64,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub paid_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoice {
    pub customer_id: String,
    pub due_date: i64,
    pub items: Vec<CreateInvoiceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceReminder {
    pub id: String,
    pub invoice_id: String,
    pub sent_at: i64,
    /// Whether the email actually went out (false = logged only)
    pub delivered: bool,
}

/// Overdue invoice joined with what a reminder email needs.
#[derive(Debug, Clone)]
pub struct OverdueInvoice {
    pub invoice: Invoice,
    pub customer_name: String,
    pub customer_email: String,
    pub sender_name: String,
}
