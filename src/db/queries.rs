use chrono::Utc;
use rusqlite::{Connection, params, types::Value};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    CUSTOMER_COLS, INVOICE_COLS, INVOICE_ITEM_COLS, INVOICE_REMINDER_COLS, PAYMENT_COLS,
    PROMO_CODE_COLS, SETTINGS_COLS, USER_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// True when the error is a UNIQUE / CHECK / FK constraint failure.
pub fn is_constraint_violation(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    key_column: &'static str,
    key: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, key_column: &'static str, key: &str) -> Self {
        Self {
            table,
            key_column,
            key: key.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.key.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            sets.join(", "),
            self.key_column
        );
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Users ============

/// Create a user together with their default settings row.
pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        params![&id, &email, &input.name, now, now],
    )?;
    conn.execute(
        "INSERT INTO settings (user_id, updated_at) VALUES (?1, ?2)",
        params![&id, now],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        is_active: false,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

/// Set `is_active`. Returns false if the user was already active (or missing).
pub fn activate_user(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET is_active = 1, updated_at = ?1 WHERE id = ?2 AND is_active = 0",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Settings ============

pub fn get_settings(conn: &Connection, user_id: &str) -> Result<Option<Settings>> {
    query_one(
        conn,
        &format!("SELECT {} FROM settings WHERE user_id = ?1", SETTINGS_COLS),
        &[&user_id],
    )
}

pub fn update_settings(conn: &Connection, user_id: &str, input: &UpdateSettings) -> Result<bool> {
    UpdateBuilder::new("settings", "user_id", user_id)
        .with_updated_at()
        .set_opt("invoice_prefix", input.invoice_prefix.clone())
        .set_opt("tax_rate", input.tax_rate)
        .execute(conn)
}

/// Generate a license key in LIC-XXXX-XXXX-XXXX-XXXX format.
pub fn generate_license_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".chars().collect();

    let mut part = || -> String {
        (0..4)
            .map(|_| chars[rng.gen_range(0..chars.len())])
            .collect()
    };

    format!("LIC-{}-{}-{}-{}", part(), part(), part(), part())
}

/// Mark the user's license active, issuing a key if none exists yet.
pub fn activate_license(conn: &Connection, user_id: &str) -> Result<()> {
    let key = generate_license_key();
    conn.execute(
        "UPDATE settings
         SET license_status = 'active', license_key = COALESCE(license_key, ?1), updated_at = ?2
         WHERE user_id = ?3",
        params![key, now(), user_id],
    )?;
    Ok(())
}

/// Atomically bump the invoice counter and return the formatted invoice number.
pub fn next_invoice_number(conn: &Connection, user_id: &str) -> Result<String> {
    let (prefix, counter): (String, i64) = conn
        .query_row(
            "UPDATE settings SET invoice_counter = invoice_counter + 1, updated_at = ?1
             WHERE user_id = ?2
             RETURNING invoice_prefix, invoice_counter",
            params![now(), user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound("Settings not found".into())
            }
            other => other.into(),
        })?;
    Ok(format!("{}-{:04}", prefix, counter))
}

// ============ Promo Codes ============

pub fn create_promo_code(conn: &Connection, input: &CreatePromoCode) -> Result<PromoCode> {
    let id = gen_id();
    let now = now();
    let code = input.code.trim().to_string();

    conn.execute(
        "INSERT INTO promo_codes (id, code, description, discount_type, discount_value, max_uses, current_uses, is_active, start_date, end_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10)",
        params![
            &id,
            &code,
            &input.description,
            input.discount_type.as_ref(),
            input.discount_value,
            input.max_uses,
            input.is_active,
            input.start_date,
            input.end_date,
            now
        ],
    )?;

    Ok(PromoCode {
        id,
        code,
        description: input.description.clone(),
        discount_type: input.discount_type,
        discount_value: input.discount_value,
        max_uses: input.max_uses,
        current_uses: 0,
        is_active: input.is_active,
        start_date: input.start_date,
        end_date: input.end_date,
        created_at: now,
    })
}

/// Exact (case-sensitive) code lookup.
pub fn get_promo_code_by_code(conn: &Connection, code: &str) -> Result<Option<PromoCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM promo_codes WHERE code = ?1", PROMO_CODE_COLS),
        &[&code],
    )
}

pub fn set_promo_code_active(conn: &Connection, code: &str, active: bool) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE promo_codes SET is_active = ?1 WHERE code = ?2",
        params![active, code],
    )?;
    Ok(affected > 0)
}

/// Live usage count: SUCCESS payments that carried this code.
pub fn count_successful_promo_payments(conn: &Connection, code: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE promo_code = ?1 AND status = 'success'",
        params![code],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

pub fn increment_promo_uses(conn: &Connection, code: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE promo_codes SET current_uses = current_uses + 1 WHERE code = ?1",
        params![code],
    )?;
    Ok(affected > 0)
}

/// Reset `current_uses` to the live SUCCESS-payment count, for one code or all.
/// Returns the number of promo rows whose counter changed.
pub fn recount_promo_usage(conn: &Connection, code: Option<&str>) -> Result<usize> {
    let recount = "(SELECT COUNT(*) FROM payments
                    WHERE payments.promo_code = promo_codes.code AND payments.status = 'success')";
    let affected = match code {
        Some(code) => conn.execute(
            &format!(
                "UPDATE promo_codes SET current_uses = {0} WHERE code = ?1 AND current_uses != {0}",
                recount
            ),
            params![code],
        )?,
        None => conn.execute(
            &format!(
                "UPDATE promo_codes SET current_uses = {0} WHERE current_uses != {0}",
                recount
            ),
            [],
        )?,
    };
    Ok(affected)
}

// ============ Payments ============

/// Insert a payment. The payment id doubles as the gateway order id.
pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payments (id, user_id, amount, status, promo_code, promo_code_id, gateway_order_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.user_id,
            input.amount,
            input.status.as_ref(),
            &input.promo_code,
            &input.promo_code_id,
            &id,
            now,
            now
        ],
    )?;

    Ok(Payment {
        gateway_order_id: id.clone(),
        id,
        user_id: input.user_id.clone(),
        amount: input.amount,
        status: input.status,
        promo_code: input.promo_code.clone(),
        promo_code_id: input.promo_code_id.clone(),
        gateway_token: None,
        redirect_url: None,
        transaction_id: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_payment_by_id(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        &[&id],
    )
}

pub fn get_payment_by_order_id(conn: &Connection, order_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE gateway_order_id = ?1",
            PAYMENT_COLS
        ),
        &[&order_id],
    )
}

pub fn has_successful_payment(conn: &Connection, user_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE user_id = ?1 AND status = 'success')",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn list_payments_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE user_id = ?1 ORDER BY created_at DESC",
            PAYMENT_COLS
        ),
        &[&user_id],
    )
}

/// Persist the checkout session the gateway handed back.
pub fn set_payment_checkout(
    conn: &Connection,
    id: &str,
    token: &str,
    redirect_url: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE payments SET gateway_token = ?1, redirect_url = ?2, updated_at = ?3 WHERE id = ?4",
        params![token, redirect_url, now(), id],
    )?;
    Ok(())
}

/// Move a PENDING payment to `status`.
///
/// Compare-and-swap on `status = 'pending'`: returns false when the payment was
/// already terminal, so concurrent deliveries cannot both win the transition.
pub fn transition_payment_status(
    conn: &Connection,
    id: &str,
    status: PaymentStatus,
    transaction_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments
         SET status = ?1, transaction_id = COALESCE(?2, transaction_id), updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![status.as_ref(), transaction_id, now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Customers ============

pub fn create_customer(conn: &Connection, user_id: &str, input: &CreateCustomer) -> Result<Customer> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO customers (id, user_id, name, email, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, user_id, &input.name, &input.email, now],
    )?;

    Ok(Customer {
        id,
        user_id: user_id.to_string(),
        name: input.name.clone(),
        email: input.email.clone(),
        created_at: now,
    })
}

pub fn get_customer_by_id(conn: &Connection, id: &str) -> Result<Option<Customer>> {
    query_one(
        conn,
        &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLS),
        &[&id],
    )
}

// ============ Invoices ============

#[allow(clippy::too_many_arguments)]
pub fn insert_invoice(
    conn: &Connection,
    user_id: &str,
    customer_id: &str,
    number: &str,
    issue_date: i64,
    due_date: i64,
    subtotal: i64,
    tax: i64,
    total: i64,
) -> Result<Invoice> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO invoices (id, user_id, customer_id, number, status, issue_date, due_date, subtotal, tax, total, created_at)
         VALUES (?1, ?2, ?3, ?4, 'sent', ?5, ?6, ?7, ?8, ?9, ?10)",
        params![&id, user_id, customer_id, number, issue_date, due_date, subtotal, tax, total, now],
    )?;

    Ok(Invoice {
        id,
        user_id: user_id.to_string(),
        customer_id: customer_id.to_string(),
        number: number.to_string(),
        status: InvoiceStatus::Sent,
        issue_date,
        due_date,
        subtotal,
        tax,
        total,
        paid_at: None,
        created_at: now,
    })
}

pub fn insert_invoice_item(
    conn: &Connection,
    invoice_id: &str,
    input: &CreateInvoiceItem,
    amount: i64,
) -> Result<InvoiceItem> {
    let id = gen_id();

    conn.execute(
        "INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, invoice_id, &input.description, input.quantity, input.unit_price, amount],
    )?;

    Ok(InvoiceItem {
        id,
        invoice_id: invoice_id.to_string(),
        description: input.description.clone(),
        quantity: input.quantity,
        unit_price: input.unit_price,
        amount,
    })
}

pub fn get_invoice_by_id(conn: &Connection, id: &str) -> Result<Option<Invoice>> {
    query_one(
        conn,
        &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLS),
        &[&id],
    )
}

pub fn list_invoice_items(conn: &Connection, invoice_id: &str) -> Result<Vec<InvoiceItem>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid",
            INVOICE_ITEM_COLS
        ),
        &[&invoice_id],
    )
}

/// Returns false when the invoice was already paid (or does not exist).
pub fn mark_invoice_paid(conn: &Connection, id: &str, paid_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE invoices SET status = 'paid', paid_at = ?1 WHERE id = ?2 AND status != 'paid'",
        params![paid_at, id],
    )?;
    Ok(affected > 0)
}

pub fn mark_invoice_overdue(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE invoices SET status = 'overdue' WHERE id = ?1 AND status = 'sent'",
        params![id],
    )?;
    Ok(())
}

/// Unpaid invoices past `due_before` with no reminder sent after `reminded_before`.
pub fn list_invoices_due_for_reminder(
    conn: &Connection,
    due_before: i64,
    reminded_before: i64,
) -> Result<Vec<OverdueInvoice>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.{}, c.name, c.email, u.name
         FROM invoices i
         JOIN customers c ON c.id = i.customer_id
         JOIN users u ON u.id = i.user_id
         WHERE i.status IN ('sent', 'overdue')
           AND i.due_date < ?1
           AND NOT EXISTS (
               SELECT 1 FROM invoice_reminders r
               WHERE r.invoice_id = i.id AND r.sent_at > ?2
           )
         ORDER BY i.due_date",
        INVOICE_COLS.replace(", ", ", i.")
    ))?;

    let rows = stmt
        .query_map(params![due_before, reminded_before], |row| {
            use super::from_row::FromRow;
            Ok(OverdueInvoice {
                invoice: Invoice::from_row(row)?,
                customer_name: row.get(12)?,
                customer_email: row.get(13)?,
                sender_name: row.get(14)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn create_invoice_reminder(
    conn: &Connection,
    invoice_id: &str,
    sent_at: i64,
    delivered: bool,
) -> Result<InvoiceReminder> {
    let id = gen_id();
    conn.execute(
        "INSERT INTO invoice_reminders (id, invoice_id, sent_at, delivered) VALUES (?1, ?2, ?3, ?4)",
        params![&id, invoice_id, sent_at, delivered],
    )?;
    Ok(InvoiceReminder {
        id,
        invoice_id: invoice_id.to_string(),
        sent_at,
        delivered,
    })
}

pub fn list_reminders_for_invoice(
    conn: &Connection,
    invoice_id: &str,
) -> Result<Vec<InvoiceReminder>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM invoice_reminders WHERE invoice_id = ?1 ORDER BY sent_at",
            INVOICE_REMINDER_COLS
        ),
        &[&invoice_id],
    )
}
