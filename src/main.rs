use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoicely::billing::{EngineConfig, PaymentEngine};
use invoicely::config::Config;
use invoicely::db::{AppState, create_pool, init_db, queries};
use invoicely::email::EmailService;
use invoicely::models::{CreatePromoCode, CreateUser, DiscountType};
use invoicely::payments::MidtransClient;
use invoicely::reminders::{run_reminder_sweep, spawn_reminder_task};

#[derive(Parser, Debug)]
#[command(name = "invoicely")]
#[command(about = "Invoicing for small businesses with one-time license payments")]
struct Cli {
    /// Seed the database with a demo user and promo codes (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Run the overdue reminder sweep once and exit
    #[arg(long)]
    sweep_now: bool,

    /// Reset promo usage counters to the live SUCCESS-payment count and exit
    #[arg(long)]
    recount_promos: bool,
}

fn seed_dev_data(state: &AppState) -> anyhow::Result<()> {
    let conn = state.db.get()?;

    if queries::get_user_by_email(&conn, "dev@invoicely.local")?.is_some() {
        tracing::info!("Dev data already present, skipping seed");
        return Ok(());
    }

    let user = queries::create_user(
        &conn,
        &CreateUser {
            email: "dev@invoicely.local".into(),
            name: "Dev User".into(),
        },
    )?;

    let now = Utc::now().timestamp();
    let year = 365 * 86400;
    for (code, description, discount_type, discount_value, max_uses) in [
        ("HALF", "Diskon 50% peluncuran", DiscountType::Fixed, 250_000, 10),
        ("FREE100", "Akses gratis", DiscountType::Percentage, 100, 5),
    ] {
        queries::create_promo_code(
            &conn,
            &CreatePromoCode {
                code: code.into(),
                description: description.into(),
                discount_type,
                discount_value,
                max_uses,
                is_active: true,
                start_date: now,
                end_date: now + year,
            },
        )?;
    }

    tracing::info!("Seeded dev user {} with promo codes HALF and FREE100", user.id);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoicely=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.gateway.server_key.is_empty() {
        tracing::warn!("MIDTRANS_SERVER_KEY is not set; checkouts and notifications will fail");
    }

    let db_pool = create_pool(&config.database_path).context("Failed to create database pool")?;
    {
        let conn = db_pool.get().context("Failed to get connection")?;
        init_db(&conn).context("Failed to initialize database")?;
    }

    let gateway = MidtransClient::new(&config.gateway)?;
    let engine = PaymentEngine::new(
        db_pool.clone(),
        Arc::new(gateway),
        EngineConfig {
            base_price: config.license_price,
            server_key: config.gateway.server_key.clone(),
            finish_url: format!("{}/payment/finish", config.base_url),
        },
    );

    let state = AppState {
        db: db_pool,
        engine,
        email: EmailService::new(
            config.email.resend_api_key.clone(),
            config.email.from_email.clone(),
            Duration::from_secs(config.email.timeout_secs),
        )
        .context("Failed to build email client")?,
        app_url: config.app_url.clone(),
    };

    if cli.recount_promos {
        let conn = state.db.get()?;
        let changed = queries::recount_promo_usage(&conn, None)?;
        tracing::info!("Recounted promo usage, {} counters corrected", changed);
        return Ok(());
    }

    if cli.sweep_now {
        let report = run_reminder_sweep(
            &state.db,
            &state.email,
            Utc::now().timestamp(),
            config.reminder_grace_days,
        )
        .await?;
        tracing::info!(
            "Reminder sweep: {} reminded, {} delivered, {} failed",
            report.reminded,
            report.delivered,
            report.failed
        );
        return Ok(());
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set INVOICELY_ENV=dev)");
        } else {
            seed_dev_data(&state)?;
        }
    }

    spawn_reminder_task(
        state.clone(),
        config.reminder_interval_secs,
        config.reminder_grace_days,
    );

    let mut app = invoicely::app(state).layer(TraceLayer::new_for_http());
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Invoicely server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
