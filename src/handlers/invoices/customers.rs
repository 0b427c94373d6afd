use axum::{extract::State, http::StatusCode};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::invoices;
use crate::models::{CreateCustomer, Customer};

pub async fn create_customer(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(input): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>)> {
    let conn = state.db.get()?;
    let customer = invoices::create_customer(&conn, &user_id, &input)?;
    Ok((StatusCode::CREATED, Json(customer)))
}
