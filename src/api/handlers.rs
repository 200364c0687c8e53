//! REST API handlers for the fleet optimizer
//!
//! These handlers use the shared FleetService.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use super::service::{
    Dashboard, FleetEfficiency, FleetService, MaintenanceSchedule, RouteGeometries, ScheduleOptimization, TrackIssues,
};
use crate::capability::CapabilityReport;
use crate::compare::Comparison;
use crate::error::FleetError;
use crate::models::ConstraintsRequest;
use crate::report::OptimizationRunResult;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OptimizationRequest {
    #[serde(default)]
    pub constraints: Option<ConstraintsRequest>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub capabilities: CapabilityReport,
}

#[derive(Serialize)]
pub struct OptimizationResponse {
    pub status: &'static str,
    pub message: String,
    pub results: OptimizationRunResult,
    pub output_files: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(code: StatusCode, message: impl Into<String>, duration: Option<f64>) -> ApiError {
    (code, Json(ErrorResponse { status: "error", message: message.into(), duration }))
}

fn no_run_yet() -> ApiError {
    api_error(
        StatusCode::NOT_FOUND,
        "No optimization has been run yet. POST /api/v1/optimization first.",
        None,
    )
}

/// An empty body runs with defaults. Anything else must be a valid request object.
fn parse_optimization_request(body: &[u8]) -> Result<OptimizationRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(OptimizationRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        let code = match e.classify() {
            Category::Data => StatusCode::UNPROCESSABLE_ENTITY,
            Category::Syntax | Category::Eof | Category::Io => StatusCode::BAD_REQUEST,
        };
        api_error(code, format!("Invalid optimization request: {}", e), None)
    })
}

fn status_for(e: &FleetError) -> StatusCode {
    if e.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize)]
pub struct ComparisonQuery {
    pub min_service: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<FleetService>;

/// GET /api/v1/health
pub async fn health(State(service): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", capabilities: service.capabilities() })
}

/// POST /api/v1/optimization
pub async fn run_optimization(
    State(service): State<AppState>,
    body: Bytes,
) -> Result<Json<OptimizationResponse>, ApiError> {
    let started = Instant::now();
    let request = parse_optimization_request(&body)?;
    let constraints = service.constraints_or_default(request.constraints);

    match service.optimize(constraints).await {
        Ok(run) => {
            let distribution = run.result.operational_status_distribution;
            Ok(Json(OptimizationResponse {
                status: "success",
                message: format!(
                    "Optimization completed: {} in service, {} standby, {} maintenance",
                    distribution.service, distribution.standby, distribution.maintenance
                ),
                output_files: crate::pipeline::describe_outputs(run.outputs.as_ref()),
                results: run.result,
                timestamp: chrono::Local::now().to_rfc3339(),
            }))
        }
        Err(e) => {
            let duration = started.elapsed().as_secs_f64();
            error!("Optimization failed after {:.2}s: {}", duration, e);
            Err(api_error(status_for(&e), e.to_string(), Some(duration)))
        }
    }
}

/// GET /api/v1/comparison?min_service=N
pub async fn get_comparison(
    State(service): State<AppState>,
    Query(params): Query<ComparisonQuery>,
) -> Result<Json<Comparison>, ApiError> {
    let constraints = service.constraints_or_default(Some(ConstraintsRequest { min_service: params.min_service }));
    match service.comparison(constraints).await {
        Ok(comparison) => Ok(Json(comparison)),
        Err(e) => Err(api_error(status_for(&e), e.to_string(), None)),
    }
}

/// GET /api/v1/dashboard
pub async fn get_dashboard(State(service): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    service.dashboard().await.map(Json).ok_or_else(no_run_yet)
}

/// GET /api/v1/maintenance
pub async fn get_maintenance(State(service): State<AppState>) -> Result<Json<MaintenanceSchedule>, ApiError> {
    service.maintenance_schedule().await.map(Json).ok_or_else(no_run_yet)
}

/// GET /api/v1/fleet/efficiency
pub async fn get_fleet_efficiency(State(service): State<AppState>) -> Result<Json<FleetEfficiency>, ApiError> {
    service.fleet_efficiency().await.map(Json).ok_or_else(no_run_yet)
}

/// GET /api/v1/routes/geometry
pub async fn get_route_geometry(State(service): State<AppState>) -> Json<RouteGeometries> {
    Json(service.route_geometry())
}

/// GET /api/v1/track/issues
pub async fn get_track_issues(State(service): State<AppState>) -> Json<TrackIssues> {
    Json(service.track_issues())
}

/// POST /api/v1/schedule/optimization
pub async fn run_schedule_optimization(
    State(service): State<AppState>,
) -> Result<Json<ScheduleOptimization>, ApiError> {
    service.schedule_optimization().await.map(Json).ok_or_else(no_run_yet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_body_is_default_request() {
        for body in ["", "  \n"] {
            let request = parse_optimization_request(body.as_bytes()).unwrap();
            assert!(request.constraints.is_none());
        }
    }

    #[test]
    fn test_request_errors_map_to_client_status() {
        let status = |body: &str| parse_optimization_request(body.as_bytes()).unwrap_err().0;
        assert_eq!(status("{not json"), StatusCode::BAD_REQUEST);
        assert_eq!(status(r#"{"constraints": {"min_service": "abc"}}"#), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(r#"{"constraints": {"min_service": -5}}"#), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
