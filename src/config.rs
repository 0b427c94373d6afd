use std::env;

/// Default one-time license price, in whole rupiah.
pub const DEFAULT_LICENSE_PRICE: i64 = 500_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Frontend URL users land on after the gateway's finish redirect
    pub app_url: String,
    pub dev_mode: bool,
    pub license_price: i64,
    pub gateway: GatewayConfig,
    pub email: EmailConfig,
    /// Seconds between overdue reminder sweeps (0 = disabled)
    pub reminder_interval_secs: u64,
    /// Days past due before the first reminder goes out
    pub reminder_grace_days: i64,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server_key: String,
    pub production: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub resend_api_key: Option<String>,
    pub from_email: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("INVOICELY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let app_url = env::var("APP_URL").unwrap_or_else(|_| format!("{}/dashboard", base_url));

        let license_price: i64 = env::var("LICENSE_BASE_PRICE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LICENSE_PRICE);

        let gateway = GatewayConfig {
            server_key: env::var("MIDTRANS_SERVER_KEY").unwrap_or_default(),
            production: env::var("MIDTRANS_PRODUCTION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        };

        let email = EmailConfig {
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            from_email: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Invoicely <billing@invoicely.local>".to_string()),
            timeout_secs: env::var("EMAIL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        };

        let reminder_interval_secs: u64 = env::var("REMINDER_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let reminder_grace_days: i64 = env::var("REMINDER_GRACE_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "invoicely.db".to_string()),
            base_url,
            app_url,
            dev_mode,
            license_price,
            gateway,
            email,
            reminder_interval_secs,
            reminder_grace_days,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
