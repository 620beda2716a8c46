use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod error;
pub mod matches;
pub mod middleware;
pub mod public;
pub mod state;
pub mod trips;

pub use state::{AppState, AuthConfig};

use middleware::{admin_auth_middleware, user_auth_middleware};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/v1/travel/public/search", get(public::search_trips))
        .route("/v1/travel/public/browse", get(public::browse_trips))
        .route("/v1/travel/public/trips/{id}", get(public::preview_trip));

    let hosts = Router::new()
        .route("/v1/travel/trips", post(trips::create_trip))
        .route("/v1/travel/trips/mine", get(trips::my_trips))
        .route("/v1/travel/matches", post(matches::request_match))
        .route("/v1/travel/matches/received", get(matches::received_requests))
        .route("/v1/travel/matches/{id}/respond", post(matches::respond_match))
        .route("/v1/travel/matches/{id}/cancel", post(matches::cancel_match))
        .route_layer(from_fn_with_state(state.clone(), user_auth_middleware));

    let admins = Router::new()
        .route("/v1/admin/travel/trips", get(admin::list_trips))
        .route("/v1/admin/travel/matches", get(admin::list_matches))
        .route("/v1/admin/travel/trips/{id}/cancel", post(admin::cancel_trip))
        .route("/v1/admin/travel/matches/{id}/cancel", post(admin::cancel_match))
        .route("/v1/admin/hosts/{id}/block", post(admin::block_host))
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .merge(public)
        .merge(hosts)
        .merge(admins)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
