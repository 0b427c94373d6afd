//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum, surfacing bad values as a column type error
/// instead of panicking.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, is_active, created_at, updated_at";

pub const SETTINGS_COLS: &str =
    "user_id, license_key, license_status, invoice_prefix, invoice_counter, tax_rate, updated_at";

pub const PROMO_CODE_COLS: &str = "id, code, description, discount_type, discount_value, max_uses, current_uses, is_active, start_date, end_date, created_at";

pub const PAYMENT_COLS: &str = "id, user_id, amount, status, promo_code, promo_code_id, gateway_order_id, gateway_token, redirect_url, transaction_id, created_at, updated_at";

pub const CUSTOMER_COLS: &str = "id, user_id, name, email, created_at";

pub const INVOICE_COLS: &str = "id, user_id, customer_id, number, status, issue_date, due_date, subtotal, tax, total, paid_at, created_at";

pub const INVOICE_ITEM_COLS: &str = "id, invoice_id, description, quantity, unit_price, amount";

pub const INVOICE_REMINDER_COLS: &str = "id, invoice_id, sent_at, delivered";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            is_active: row.get::<_, i32>(3)? != 0,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for Settings {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Settings {
            user_id: row.get(0)?,
            license_key: row.get(1)?,
            license_status: parse_enum(row, 2, "license_status")?,
            invoice_prefix: row.get(3)?,
            invoice_counter: row.get(4)?,
            tax_rate: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for PromoCode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PromoCode {
            id: row.get(0)?,
            code: row.get(1)?,
            description: row.get(2)?,
            discount_type: parse_enum(row, 3, "discount_type")?,
            discount_value: row.get(4)?,
            max_uses: row.get(5)?,
            current_uses: row.get(6)?,
            is_active: row.get::<_, i32>(7)? != 0,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            promo_code: row.get(4)?,
            promo_code_id: row.get(5)?,
            gateway_order_id: row.get(6)?,
            gateway_token: row.get(7)?,
            redirect_url: row.get(8)?,
            transaction_id: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Customer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Customer {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Invoice {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Invoice {
            id: row.get(0)?,
            user_id: row.get(1)?,
            customer_id: row.get(2)?,
            number: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            issue_date: row.get(5)?,
            due_date: row.get(6)?,
            subtotal: row.get(7)?,
            tax: row.get(8)?,
            total: row.get(9)?,
            paid_at: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl FromRow for InvoiceItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(InvoiceItem {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            description: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
            amount: row.get(5)?,
        })
    }
}

impl FromRow for InvoiceReminder {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(InvoiceReminder {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            sent_at: row.get(2)?,
            delivered: row.get::<_, i32>(3)? != 0,
        })
    }
}
