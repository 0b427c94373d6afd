use rusqlite::Connection;

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- One settings row per user, created with the user
        CREATE TABLE IF NOT EXISTS settings (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            license_key TEXT UNIQUE,
            license_status TEXT NOT NULL DEFAULT 'inactive' CHECK (license_status IN ('inactive', 'active')),
            invoice_prefix TEXT NOT NULL DEFAULT 'INV',
            invoice_counter INTEGER NOT NULL DEFAULT 0,
            tax_rate REAL NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS promo_codes (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            discount_type TEXT NOT NULL CHECK (discount_type IN ('percentage', 'fixed')),
            discount_value INTEGER NOT NULL CHECK (discount_value >= 0),
            max_uses INTEGER NOT NULL CHECK (max_uses >= 0),
            current_uses INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            start_date INTEGER NOT NULL,
            end_date INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );

        -- promo_code keeps the raw string for lookups; promo_code_id is the real link
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            status TEXT NOT NULL CHECK (status IN ('pending', 'success', 'failed')),
            promo_code TEXT,
            promo_code_id TEXT REFERENCES promo_codes(id) ON DELETE SET NULL,
            gateway_order_id TEXT NOT NULL UNIQUE,
            gateway_token TEXT,
            redirect_url TEXT,
            transaction_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);
        CREATE INDEX IF NOT EXISTS idx_payments_promo_status ON payments(promo_code, status);
        -- Authoritative guard: at most one successful payment per user
        CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_one_success_per_user
            ON payments(user_id) WHERE status = 'success';

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_customers_user ON customers(user_id);

        CREATE TABLE IF NOT EXISTS invoices (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            customer_id TEXT NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            number TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('sent', 'overdue', 'paid')),
            issue_date INTEGER NOT NULL,
            due_date INTEGER NOT NULL,
            subtotal INTEGER NOT NULL,
            tax INTEGER NOT NULL,
            total INTEGER NOT NULL,
            paid_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(user_id, number)
        );
        CREATE INDEX IF NOT EXISTS idx_invoices_due ON invoices(status, due_date);

        CREATE TABLE IF NOT EXISTS invoice_items (
            id TEXT PRIMARY KEY,
            invoice_id TEXT NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
            description TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            unit_price INTEGER NOT NULL CHECK (unit_price >= 0),
            amount INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invoice_items_invoice ON invoice_items(invoice_id);

        CREATE TABLE IF NOT EXISTS invoice_reminders (
            id TEXT PRIMARY KEY,
            invoice_id TEXT NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
            sent_at INTEGER NOT NULL,
            delivered INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_invoice_reminders_invoice ON invoice_reminders(invoice_id, sent_at);
        "#,
    )
}
