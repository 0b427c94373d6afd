use axum::{extract::State, http::StatusCode};
use chrono::Utc;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::invoices;
use crate::models::{CreateInvoice, Invoice, InvoiceWithItems};

pub async fn create_invoice(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(input): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<InvoiceWithItems>)> {
    let mut conn = state.db.get()?;
    let invoice = invoices::create_invoice(&mut conn, &user_id, &input, Utc::now().timestamp())?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Invoice>> {
    let conn = state.db.get()?;
    let invoice = invoices::mark_invoice_paid(&conn, &invoice_id, Utc::now().timestamp())?;
    Ok(Json(invoice))
}
