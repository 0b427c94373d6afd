//! Overdue invoice reminder sweep.

use std::time::Duration;

use chrono::Utc;

use crate::db::{AppState, DbPool, queries};
use crate::email::{EmailSendResult, EmailService};
use crate::error::Result;
use crate::models::OverdueInvoice;

const SECONDS_PER_DAY: i64 = 86400;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Invoices that got a reminder row
    pub reminded: usize,
    /// Reminders actually emailed
    pub delivered: usize,
    /// Invoices skipped because of an error
    pub failed: usize,
}

/// Remind customers about unpaid invoices past due.
///
/// An invoice qualifies when its due date is more than `grace_days` before
/// `now` and it has had no reminder in the last day. Each invoice is handled
/// on its own; one failure is logged and the sweep moves on.
pub async fn run_reminder_sweep(
    db: &DbPool,
    email: &EmailService,
    now: i64,
    grace_days: i64,
) -> Result<SweepReport> {
    let due = {
        let conn = db.get()?;
        queries::list_invoices_due_for_reminder(
            &conn,
            now - grace_days * SECONDS_PER_DAY,
            now - SECONDS_PER_DAY,
        )?
    };

    let mut report = SweepReport::default();
    for overdue in &due {
        match remind(db, email, overdue, now).await {
            Ok(delivered) => {
                report.reminded += 1;
                if delivered {
                    report.delivered += 1;
                }
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    invoice_id = %overdue.invoice.id,
                    error = %e,
                    "Failed to process overdue reminder"
                );
            }
        }
    }

    if !due.is_empty() {
        tracing::info!(
            reminded = report.reminded,
            delivered = report.delivered,
            failed = report.failed,
            "Reminder sweep finished"
        );
    }
    Ok(report)
}

async fn remind(
    db: &DbPool,
    email: &EmailService,
    overdue: &OverdueInvoice,
    now: i64,
) -> Result<bool> {
    {
        let conn = db.get()?;
        queries::mark_invoice_overdue(&conn, &overdue.invoice.id)?;
    }

    let delivered = match email.send_overdue_reminder(overdue).await {
        Ok(EmailSendResult::Sent) => true,
        Ok(EmailSendResult::NoApiKey) => false,
        Err(e) => {
            tracing::warn!(
                invoice_id = %overdue.invoice.id,
                error = %e,
                "Reminder email failed; recording undelivered reminder"
            );
            false
        }
    };

    let conn = db.get()?;
    queries::create_invoice_reminder(&conn, &overdue.invoice.id, now, delivered)?;
    Ok(delivered)
}

/// Run the sweep every `interval_secs` in the background (0 disables it).
pub fn spawn_reminder_task(state: AppState, interval_secs: u64, grace_days: i64) {
    if interval_secs == 0 {
        tracing::info!("Overdue reminder sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            let now = Utc::now().timestamp();
            if let Err(e) = run_reminder_sweep(&state.db, &state.email, now, grace_days).await {
                tracing::warn!("Reminder sweep failed: {}", e);
            }
        }
    });

    tracing::info!(
        "Background reminder sweep started (runs every {} seconds)",
        interval_secs
    );
}
