use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tripmatch_core::matching::MatchStatus;
use tripmatch_core::search::Page;
use tripmatch_core::trip::TripStatus;
use tripmatch_core::{HostId, MatchId, TripId};

use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockHostRequest {
    pub reason: Option<String>,
}

fn admin_page(state: &AppState, query: &ListQuery) -> Page {
    let max = state.rules.admin_max_limit;
    Page::new(query.page, query.limit, max, max)
}

fn parse_status<T: std::str::FromStr<Err = String>>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    raw.filter(|s| !s.is_empty())
        .map(str::parse::<T>)
        .transpose()
        .map_err(AppError::ValidationError)
}

// ============================================================================
// Listing Handlers
// ============================================================================

/// GET /v1/admin/travel/trips
pub async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let status = parse_status::<TripStatus>(query.status.as_deref())?;
    let page = admin_page(&state, &query);
    let trips = state.travel.registry.admin_list_trips(status, page).await?;

    Ok(Json(json!({
        "success": true,
        "page": page.page,
        "trips": trips,
    })))
}

/// GET /v1/admin/travel/matches
pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let status = parse_status::<MatchStatus>(query.status.as_deref())?;
    let page = admin_page(&state, &query);
    let matches = state.travel.coordinator.admin_list_matches(status, page).await?;

    Ok(Json(json!({
        "success": true,
        "page": page.page,
        "matches": matches,
    })))
}

// ============================================================================
// Cancellation Handlers
// ============================================================================

/// POST /v1/admin/travel/trips/{id}/cancel
pub async fn cancel_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(trip_id): Path<TripId>,
) -> Result<Json<Value>, AppError> {
    let summary = state.travel.registry.cancel(&claims.actor(), trip_id).await?;

    Ok(Json(json!({
        "success": true,
        "cancelled_matches": summary.cancelled_matches,
    })))
}

/// POST /v1/admin/travel/matches/{id}/cancel
pub async fn cancel_match(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .travel
        .coordinator
        .admin_cancel_match(&claims.actor(), match_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": updated.status,
    })))
}

/// POST /v1/admin/hosts/{id}/block
///
/// The body is optional; `{"reason": "..."}` is recorded with the block.
pub async fn block_host(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(host_id): Path<HostId>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let req: BlockHostRequest = if body.is_empty() {
        BlockHostRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::ValidationError(format!("Invalid body: {}", e)))?
    };

    let summary = state
        .travel
        .cascade
        .cascade_from_host_block(&claims.actor(), host_id, req.reason.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "cancelled_trips": summary.cancelled_trips,
        "cancelled_matches": summary.cancelled_matches,
    })))
}
