//! Email service for overdue invoice reminders.
//!
//! Supports two modes:
//! 1. Send via Resend API (when an API key is configured)
//! 2. Log only (no API key; the reminder is recorded as undelivered)

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::OverdueInvoice;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Format whole rupiah with dot thousands separators (e.g., "Rp 1.250.000").
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// Result of attempting to send a reminder email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was sent successfully via Resend
    Sent,
    /// No API key configured; the reminder was only logged
    NoApiKey,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Email service using Resend API.
#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    api_url: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            from_email,
            api_url: RESEND_API_URL.to_string(),
            http_client,
        })
    }

    /// Remind a customer that an invoice is past due.
    pub async fn send_overdue_reminder(&self, overdue: &OverdueInvoice) -> Result<EmailSendResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(
                invoice_id = %overdue.invoice.id,
                number = %overdue.invoice.number,
                to = %overdue.customer_email,
                "No Resend API key configured, overdue reminder logged only"
            );
            return Ok(EmailSendResult::NoApiKey);
        };

        let invoice = &overdue.invoice;
        let subject = format!(
            "Pengingat: invoice {} dari {} telah jatuh tempo",
            invoice.number, overdue.sender_name
        );
        let due = format_date(invoice.due_date);
        let total = format_rupiah(invoice.total);
        let text = format!(
            "Halo {},\n\nInvoice {} dari {} sebesar {} telah jatuh tempo pada {} dan belum kami terima pembayarannya.\n\nMohon segera lakukan pembayaran. Abaikan email ini jika pembayaran sudah dilakukan.",
            overdue.customer_name, invoice.number, overdue.sender_name, total, due
        );
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Invoice {} telah jatuh tempo</h2>
<p>Halo {},</p>
<p>Invoice <strong>{}</strong> dari <strong>{}</strong> telah jatuh tempo pada {} dan belum kami terima pembayarannya.</p>
<div style="background: #f5f5f5; padding: 20px; border-radius: 8px; text-align: center;">
<span style="font-size: 24px; font-weight: bold; color: #333;">{}</span>
</div>
<p>Mohon segera lakukan pembayaran.</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">Abaikan email ini jika pembayaran sudah dilakukan.</p>
</body>
</html>"#,
            invoice.number, overdue.customer_name, invoice.number, overdue.sender_name, due, total
        );

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![overdue.customer_email.as_str()],
            subject,
            text,
            html,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                AppError::Internal(format!("Email service error: {}", e))
            })?;

        if response.status().is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                AppError::Internal("Email service response error".into())
            })?;

            tracing::info!(
                to = %overdue.customer_email,
                invoice_id = %invoice.id,
                "Overdue reminder sent via Resend"
            );
            Ok(EmailSendResult::Sent)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "Resend API returned error"
            );
            Err(AppError::Internal(format!(
                "Email service error: {} - {}",
                status, body
            )))
        }
    }
}
