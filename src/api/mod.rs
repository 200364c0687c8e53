//! REST API for the fleet optimizer

pub mod handlers;
pub mod service;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use service::FleetService;

pub fn router(service: Arc<FleetService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        // Optimization
        .route("/api/v1/optimization", post(handlers::run_optimization))
        .route("/api/v1/comparison", get(handlers::get_comparison))
        .route("/api/v1/schedule/optimization", post(handlers::run_schedule_optimization))
        // Network
        .route("/api/v1/routes/geometry", get(handlers::get_route_geometry))
        .route("/api/v1/track/issues", get(handlers::get_track_issues))
        // Last-run views
        .route("/api/v1/dashboard", get(handlers::get_dashboard))
        .route("/api/v1/maintenance", get(handlers::get_maintenance))
        .route("/api/v1/fleet/efficiency", get(handlers::get_fleet_efficiency))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
