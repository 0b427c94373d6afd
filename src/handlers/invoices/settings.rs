use axum::extract::State;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::invoices;
use crate::models::{Settings, UpdateSettings};

pub async fn update_settings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(input): Json<UpdateSettings>,
) -> Result<Json<Settings>> {
    let conn = state.db.get()?;
    let settings = invoices::update_settings(&conn, &user_id, &input)?;
    Ok(Json(settings))
}
