//! Test utilities and fixtures for Invoicely integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tempfile::TempDir;

// Re-export the main library crate
pub use invoicely::billing::{CheckoutOutcome, EngineConfig, PaymentEngine, PricingInfo};
pub use invoicely::db::{AppState, create_pool, init_db, queries};
pub use invoicely::email::EmailService;
pub use invoicely::error::{AppError, Result};
pub use invoicely::models::*;
pub use invoicely::payments::{
    CheckoutRequest, CheckoutSession, GatewayNotification, PaymentGateway, TransactionStatus,
    compute_signature,
};

pub const BASE_PRICE: i64 = 500_000;
pub const SERVER_KEY: &str = "SB-Mid-server-test-key";
pub const APP_URL: &str = "http://localhost:5173/billing";

/// Gateway double: records calls and answers status queries from a table.
#[derive(Default)]
pub struct MockGateway {
    pub checkout_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub fail_checkout: AtomicBool,
    last_checkout: Mutex<Option<CheckoutRequest>>,
    statuses: Mutex<HashMap<String, TransactionStatus>>,
}

impl MockGateway {
    /// What the gateway's status endpoint reports for `order_id`.
    pub fn set_status(&self, order_id: &str, transaction_status: &str, fraud_status: Option<&str>) {
        self.statuses.lock().unwrap().insert(
            order_id.to_string(),
            TransactionStatus {
                order_id: order_id.to_string(),
                transaction_status: transaction_status.to_string(),
                fraud_status: fraud_status.map(String::from),
                status_code: Some("200".to_string()),
                gross_amount: Some("250000.00".to_string()),
                transaction_id: Some(format!("txn-{}", order_id)),
            },
        );
    }

    pub fn checkout_count(&self) -> usize {
        self.checkout_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.last_checkout.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_checkout.lock().unwrap() = Some(request.clone());

        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(AppError::gateway("operation timed out", true));
        }

        Ok(CheckoutSession {
            token: format!("snap-{}", request.order_id),
            redirect_url: format!(
                "https://app.sandbox.midtrans.com/snap/v4/redirection/snap-{}",
                request.order_id
            ),
        })
    }

    async fn get_transaction_status(&self, order_id: &str) -> Result<TransactionStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| AppError::gateway(format!("no transaction for {}", order_id), false))
    }
}

/// App state on a temp-file database plus the gateway double behind it.
pub struct TestContext {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    _dir: TempDir,
}

impl TestContext {
    pub fn conn(&self) -> PooledConnection<SqliteConnectionManager> {
        self.state.db.get().expect("Failed to get test connection")
    }

    pub fn engine(&self) -> &PaymentEngine {
        &self.state.engine
    }

    /// Full router, as served by the binary.
    pub fn app(&self) -> Router {
        invoicely::app(self.state.clone())
    }

    /// Make the gateway report `transaction_status` and build a correctly
    /// signed notification claiming the same.
    pub fn notify(
        &self,
        order_id: &str,
        transaction_status: &str,
        fraud_status: Option<&str>,
    ) -> GatewayNotification {
        self.gateway.set_status(order_id, transaction_status, fraud_status);
        signed_notification(order_id, transaction_status, fraud_status)
    }
}

pub fn setup() -> TestContext {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("test.db");
    let pool = create_pool(path.to_str().expect("temp path is not UTF-8"))
        .expect("Failed to create pool");
    {
        let conn = pool.get().unwrap();
        init_db(&conn).expect("Failed to initialize schema");
    }

    let gateway = Arc::new(MockGateway::default());
    let engine = PaymentEngine::new(
        pool.clone(),
        gateway.clone(),
        EngineConfig {
            base_price: BASE_PRICE,
            server_key: SERVER_KEY.to_string(),
            finish_url: "http://localhost:3000/payment/finish".to_string(),
        },
    );

    let state = AppState {
        db: pool,
        engine,
        email: EmailService::new(
            None,
            "test@example.com".to_string(),
            Duration::from_secs(5),
        )
        .unwrap(),
        app_url: APP_URL.to_string(),
    };

    TestContext {
        state,
        gateway,
        _dir: dir,
    }
}

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a future timestamp (days from now)
pub fn future_timestamp(days: i64) -> i64 {
    now() + (days * 86400)
}

/// Get a past timestamp (days ago)
pub fn past_timestamp(days: i64) -> i64 {
    now() - (days * 86400)
}

pub fn signed_notification(
    order_id: &str,
    transaction_status: &str,
    fraud_status: Option<&str>,
) -> GatewayNotification {
    let status_code = "200";
    let gross_amount = "250000.00";
    GatewayNotification {
        order_id: order_id.to_string(),
        transaction_status: transaction_status.to_string(),
        fraud_status: fraud_status.map(String::from),
        status_code: status_code.to_string(),
        gross_amount: gross_amount.to_string(),
        signature_key: compute_signature(order_id, status_code, gross_amount, SERVER_KEY),
        transaction_id: Some(format!("txn-{}", order_id)),
        payment_type: Some("bank_transfer".to_string()),
    }
}

pub fn create_test_user(conn: &Connection, email: &str) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Test User {}", email),
        },
    )
    .expect("Failed to create test user")
}

/// Active promo valid from yesterday to a month from now.
pub fn create_test_promo(
    conn: &Connection,
    code: &str,
    discount_type: DiscountType,
    discount_value: i64,
    max_uses: i64,
) -> PromoCode {
    queries::create_promo_code(
        conn,
        &CreatePromoCode {
            code: code.to_string(),
            description: format!("Promo {}", code),
            discount_type,
            discount_value,
            max_uses,
            is_active: true,
            start_date: past_timestamp(1),
            end_date: future_timestamp(30),
        },
    )
    .expect("Failed to create test promo")
}

pub fn create_test_payment(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    status: PaymentStatus,
    promo: Option<&PromoCode>,
) -> Payment {
    queries::create_payment(
        conn,
        &CreatePayment {
            user_id: user_id.to_string(),
            amount,
            status,
            promo_code: promo.map(|p| p.code.clone()),
            promo_code_id: promo.map(|p| p.id.clone()),
        },
    )
    .expect("Failed to create test payment")
}

/// Record `count` SUCCESS payments that used `promo`, each by a fresh user.
pub fn use_promo_slots(conn: &Connection, promo: &PromoCode, count: usize) {
    for i in 0..count {
        let user = create_test_user(conn, &format!("slot{}-{}@example.com", i, promo.code));
        create_test_payment(conn, &user.id, 0, PaymentStatus::Success, Some(promo));
    }
}

/// User holding a SUCCESS license payment.
pub fn create_licensed_user(conn: &Connection, email: &str) -> User {
    let user = create_test_user(conn, email);
    create_test_payment(conn, &user.id, BASE_PRICE, PaymentStatus::Success, None);
    queries::activate_user(conn, &user.id).expect("Failed to activate user");
    queries::activate_license(conn, &user.id).expect("Failed to activate license");
    user
}

pub fn create_test_customer(conn: &Connection, user_id: &str, name: &str) -> Customer {
    queries::create_customer(
        conn,
        user_id,
        &CreateCustomer {
            name: name.to_string(),
            email: format!("{}@customer.test", name.to_lowercase().replace(' ', ".")),
        },
    )
    .expect("Failed to create test customer")
}

pub fn count_payments(conn: &Connection, user_id: &str) -> usize {
    queries::list_payments_for_user(conn, user_id)
        .expect("Failed to list payments")
        .len()
}
