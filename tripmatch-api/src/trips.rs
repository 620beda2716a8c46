use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};
use tripmatch_core::trip::TripDraft;

use crate::error::AppError;
use crate::middleware::UserClaims;
use crate::state::AppState;

/// POST /v1/travel/trips
pub async fn create_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(draft): Json<TripDraft>,
) -> Result<Json<Value>, AppError> {
    let trip = state.travel.registry.create(&claims.sub, draft).await?;

    Ok(Json(json!({
        "success": true,
        "trip_id": trip.id,
    })))
}

/// GET /v1/travel/trips/mine
pub async fn my_trips(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<Value>, AppError> {
    let trips = state.travel.registry.my_trips(&claims.sub).await?;

    Ok(Json(json!({
        "success": true,
        "trips": trips,
    })))
}
