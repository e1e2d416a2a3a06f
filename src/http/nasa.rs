use axum::{
    extract::{Query, State},
    Json,
};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::services::{ApodQuery, ApodResult};

/// `GET /api/v1/nasa/apod`
pub async fn get_apod(
    State(state): State<AppState>,
    Query(query): Query<ApodQuery>,
) -> Result<Json<ApodResult>, ApiError> {
    let result = state.nasa.apod(&query).await?;
    Ok(Json(result))
}
