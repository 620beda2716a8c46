use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tripmatch_core::search::{Page, TripSearch};
use tripmatch_core::TripId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub from_country: Option<String>,
    pub to_country: Option<String>,
    pub date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /v1/travel/public/search
pub async fn search_trips(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let required = "from_country, to_country, date required".to_string();
    let (Some(from_country), Some(to_country), Some(date)) =
        (query.from_country, query.to_country, query.date)
    else {
        return Err(AppError::ValidationError(required));
    };
    if from_country.trim().is_empty() || to_country.trim().is_empty() {
        return Err(AppError::ValidationError(required));
    }
    let travel_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("Invalid date: {}", date)))?;

    let rules = &state.rules;
    let page = Page::new(
        query.page,
        query.limit,
        rules.search_default_limit,
        rules.search_max_limit,
    );
    let search = TripSearch {
        from_country,
        to_country,
        travel_date,
    };
    let results = state.travel.registry.search(&search, page).await?;

    Ok(Json(json!({
        "success": true,
        "page": page.page,
        "results": results,
    })))
}

/// GET /v1/travel/public/browse
pub async fn browse_trips(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let rules = &state.rules;
    let page = Page::new(query.page, query.limit, rules.browse_max_limit, rules.browse_max_limit);
    let today = Utc::now().date_naive();

    let trips = state
        .travel
        .registry
        .browse_window(today, rules.browse_horizon_days, page)
        .await?;

    Ok(Json(json!({
        "success": true,
        "page": page.page,
        "limit": page.limit,
        "trips": trips,
    })))
}

/// GET /v1/travel/public/trips/{id}
pub async fn preview_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> Result<Json<Value>, AppError> {
    let trip = state.travel.registry.preview(trip_id).await?;

    Ok(Json(json!({
        "success": true,
        "trip": trip,
    })))
}
