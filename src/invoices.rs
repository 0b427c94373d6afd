//! Customer and invoice ledger operations.
//!
//! Everything here is gated on the owner holding a paid license.

use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    CreateCustomer, CreateInvoice, Customer, Invoice, InvoiceStatus, InvoiceWithItems, Settings,
    UpdateSettings,
};

/// Fail with `Forbidden` unless the user has a SUCCESS license payment.
pub fn require_license(conn: &Connection, user_id: &str) -> Result<()> {
    if queries::get_user_by_id(conn, user_id)?.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }
    if !queries::has_successful_payment(conn, user_id)? {
        return Err(AppError::Forbidden(
            "An active license is required for invoicing".into(),
        ));
    }
    Ok(())
}

fn out_of_range() -> AppError {
    AppError::BadRequest("Invoice total out of range".into())
}

/// Tax in whole currency units, rounded to nearest.
pub fn compute_tax(subtotal: i64, tax_rate: f64) -> i64 {
    (subtotal as f64 * tax_rate / 100.0).round() as i64
}

pub fn create_customer(conn: &Connection, user_id: &str, input: &CreateCustomer) -> Result<Customer> {
    require_license(conn, user_id)?;

    let name = input.name.trim();
    let email = input.email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest("name and email are required".into()));
    }

    queries::create_customer(
        conn,
        user_id,
        &CreateCustomer {
            name: name.to_string(),
            email: email.to_lowercase(),
        },
    )
}

/// Change the invoice prefix and/or tax rate used for future invoices.
pub fn update_settings(conn: &Connection, user_id: &str, input: &UpdateSettings) -> Result<Settings> {
    require_license(conn, user_id)?;

    let invoice_prefix = match input.invoice_prefix.as_deref().map(str::trim) {
        Some("") => return Err(AppError::BadRequest("invoice_prefix must not be empty".into())),
        other => other.map(String::from),
    };
    if input
        .tax_rate
        .is_some_and(|rate| !(0.0..=100.0).contains(&rate))
    {
        return Err(AppError::BadRequest(
            "tax_rate must be between 0 and 100".into(),
        ));
    }

    queries::update_settings(
        conn,
        user_id,
        &UpdateSettings {
            invoice_prefix,
            tax_rate: input.tax_rate,
        },
    )?;

    let settings = queries::get_settings(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("Settings not found".into()))?;
    tracing::info!(
        user_id = %user_id,
        invoice_prefix = %settings.invoice_prefix,
        tax_rate = settings.tax_rate,
        "Invoice settings updated"
    );
    Ok(settings)
}

/// Issue a numbered invoice. The counter bump, header and items commit together.
pub fn create_invoice(
    conn: &mut Connection,
    user_id: &str,
    input: &CreateInvoice,
    now: i64,
) -> Result<InvoiceWithItems> {
    require_license(conn, user_id)?;

    if input.items.is_empty() {
        return Err(AppError::BadRequest("Invoice needs at least one item".into()));
    }
    if input
        .items
        .iter()
        .any(|item| item.quantity <= 0 || item.unit_price < 0)
    {
        return Err(AppError::BadRequest(
            "Item quantity must be positive and unit price non-negative".into(),
        ));
    }
    if input.due_date < now {
        return Err(AppError::BadRequest("due_date is in the past".into()));
    }

    queries::get_customer_by_id(conn, &input.customer_id)?
        .filter(|c| c.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;

    let settings = queries::get_settings(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("Settings not found".into()))?;

    let amounts = input
        .items
        .iter()
        .map(|item| item.quantity.checked_mul(item.unit_price))
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(out_of_range)?;
    let subtotal = amounts
        .iter()
        .try_fold(0i64, |acc, amount| acc.checked_add(*amount))
        .ok_or_else(out_of_range)?;
    let tax = compute_tax(subtotal, settings.tax_rate);
    let total = subtotal.checked_add(tax).ok_or_else(out_of_range)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let number = queries::next_invoice_number(&tx, user_id)?;
    let invoice = queries::insert_invoice(
        &tx,
        user_id,
        &input.customer_id,
        &number,
        now,
        input.due_date,
        subtotal,
        tax,
        total,
    )?;
    let items = input
        .items
        .iter()
        .zip(amounts)
        .map(|(item, amount)| queries::insert_invoice_item(&tx, &invoice.id, item, amount))
        .collect::<Result<Vec<_>>>()?;
    tx.commit()?;

    tracing::info!(
        invoice_id = %invoice.id,
        number = %invoice.number,
        total = invoice.total,
        "Invoice issued"
    );

    Ok(InvoiceWithItems { invoice, items })
}

/// Mark an invoice paid. Paying an already-paid invoice is a no-op.
pub fn mark_invoice_paid(conn: &Connection, invoice_id: &str, now: i64) -> Result<Invoice> {
    let invoice = queries::get_invoice_by_id(conn, invoice_id)?
        .ok_or_else(|| AppError::NotFound("Invoice not found".into()))?;
    require_license(conn, &invoice.user_id)?;

    if invoice.status == InvoiceStatus::Paid {
        return Ok(invoice);
    }

    queries::mark_invoice_paid(conn, invoice_id, now)?;
    tracing::info!(invoice_id = %invoice.id, number = %invoice.number, "Invoice paid");

    queries::get_invoice_by_id(conn, invoice_id)?
        .ok_or_else(|| AppError::NotFound("Invoice not found".into()))
}
