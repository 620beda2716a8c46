use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tripmatch_core::matching::{MatchAction, MatchStatus};
use tripmatch_core::{MatchId, TripId};

use crate::error::AppError;
use crate::middleware::UserClaims;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub trip_id: Option<TripId>,
    pub matched_trip_id: Option<TripId>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/travel/matches
pub async fn request_match(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<Value>, AppError> {
    let (Some(trip_id), Some(matched_trip_id)) = (req.trip_id, req.matched_trip_id) else {
        return Err(AppError::ValidationError(
            "trip_id and matched_trip_id are required".to_string(),
        ));
    };

    let created = state
        .travel
        .coordinator
        .request_match(&claims.sub, trip_id, matched_trip_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "match_id": created.id,
        "status": created.status,
    })))
}

/// POST /v1/travel/matches/{id}/respond
pub async fn respond_match(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Value>, AppError> {
    let action = match req.action.as_deref().map(str::parse::<MatchAction>) {
        Some(Ok(action @ (MatchAction::Accept | MatchAction::Reject))) => action,
        _ => {
            return Err(AppError::ValidationError(
                "action must be accept or reject".to_string(),
            ))
        }
    };

    let updated = state
        .travel
        .coordinator
        .respond_match(&claims.sub, match_id, action)
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": updated.status,
        "contact_unlocked": updated.status == MatchStatus::Accepted,
    })))
}

/// POST /v1/travel/matches/{id}/cancel
pub async fn cancel_match(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .travel
        .coordinator
        .cancel_match(&claims.sub, match_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": updated.status,
    })))
}

/// GET /v1/travel/matches/received
pub async fn received_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<Value>, AppError> {
    let requests = state.travel.coordinator.list_received(&claims.sub).await?;

    Ok(Json(json!({
        "success": true,
        "requests": requests,
    })))
}
