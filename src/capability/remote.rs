//! HTTP adapters for the model service
//!
//! Wire contract (JSON over HTTP):
//!   GET  /{capability}/health
//!   POST /delay/train             {records}
//!   POST /delay/predict           {dwell_time, distance, load_factor, time_of_day, passenger_density, route_complexity}
//!                                 -> number | {"PredictedDelayMinutes": number}
//!   POST /readiness/train         {service_set, history_set, maintenance_set}
//!   POST /readiness/score         {train} -> number
//!   POST /readiness/maintenance   {train} -> {action}
//!   POST /selection/optimize      {trains, min_service_count} -> {status, details: [{train_id, selected_for_induction}]}
//!   POST /scheduling/optimize     {trains, routes, time_horizon_hours, constraints}
//!                                 -> {performance_metrics: {efficiency}, conflicts_resolved?, time_slots_optimized?}

use async_trait::async_trait;
use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{
    CapabilityKind, DelayModel, ReadinessModel, ScheduleOutcome, ScheduleSolver, SelectionOutcome,
    SelectionSolver,
};
use crate::error::{FleetError, Result};
use crate::fleet::{route_geometry, RouteGeometry};
use crate::models::{Constraints, MaintenanceAction, ScheduleRecord, ScoredTrain, TrainFeatureRecord};

pub const DELAY: &str = "delay";
pub const READINESS: &str = "readiness";
pub const SELECTION: &str = "selection";
pub const SCHEDULING: &str = "scheduling";

// ============================================================================
// Client
// ============================================================================

pub struct ModelServiceClient {
    base_url: String,
    client: reqwest::Client,
}

impl ModelServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FleetError::AdapterUnavailable { adapter: "model service", reason: e.to_string() })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self, capability: &'static str) -> Result<()> {
        let url = format!("{}/{}/health", self.base_url, capability);
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify(capability, e))?;
        Ok(())
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        capability: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}/{}/{}", self.base_url, capability, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify(capability, e))?;
        response.json::<R>().await.map_err(|e| FleetError::AdapterExecution {
            adapter: capability,
            reason: format!("malformed response from {}: {}", path, e),
        })
    }

    async fn post_ack<B: Serialize + ?Sized>(&self, capability: &'static str, path: &str, body: &B) -> Result<()> {
        let url = format!("{}/{}/{}", self.base_url, capability, path);
        self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify(capability, e))?;
        Ok(())
    }
}

fn classify(adapter: &'static str, e: reqwest::Error) -> FleetError {
    if e.is_connect() || e.is_builder() {
        FleetError::AdapterUnavailable { adapter, reason: e.to_string() }
    } else {
        FleetError::AdapterExecution { adapter, reason: e.to_string() }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct DelayQuery {
    dwell_time: u32,
    distance: f64,
    load_factor: f64,
    time_of_day: u8,
    passenger_density: f64,
    route_complexity: f64,
}

impl From<&TrainFeatureRecord> for DelayQuery {
    fn from(t: &TrainFeatureRecord) -> Self {
        Self {
            dwell_time: t.dwell_time_seconds,
            distance: t.distance_km,
            load_factor: t.scheduled_load_factor,
            time_of_day: t.time_of_day,
            passenger_density: t.passenger_density,
            route_complexity: t.route_complexity,
        }
    }
}

/// The delay service answers either with a bare number or a keyed object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DelayPrediction {
    Minutes(f64),
    Keyed {
        #[serde(rename = "PredictedDelayMinutes", alias = "Predicted Delay Minutes")]
        minutes: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct MaintenanceReply {
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectionReply {
    status: String,
    #[serde(default)]
    details: Vec<SelectionDetail>,
}

#[derive(Debug, Deserialize)]
struct SelectionDetail {
    train_id: String,
    #[serde(default)]
    selected_for_induction: u8,
}

#[derive(Debug, Deserialize)]
struct ScheduleReply {
    performance_metrics: Option<PerformanceMetrics>,
    conflicts_resolved: Option<u32>,
    time_slots_optimized: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PerformanceMetrics {
    efficiency: Option<f64>,
}

// ============================================================================
// Adapters
// ============================================================================

pub struct RemoteDelayModel {
    client: Arc<ModelServiceClient>,
}

impl RemoteDelayModel {
    pub fn new(client: Arc<ModelServiceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DelayModel for RemoteDelayModel {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }

    fn algorithm(&self) -> &'static str {
        "RandomForest + LinearRegression ensemble (model service)"
    }

    async fn train(&self, history: &[ScheduleRecord]) -> Result<()> {
        self.client.post_ack(DELAY, "train", &json!({ "records": history })).await
    }

    async fn predict(&self, train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        let reply: DelayPrediction = self.client.post(DELAY, "predict", &DelayQuery::from(train)).await?;
        let minutes = match reply {
            DelayPrediction::Minutes(m) => m,
            // A keyed reply without a value means "no opinion": keep the baseline.
            DelayPrediction::Keyed { minutes } => minutes.unwrap_or(train.baseline_delay_minutes),
        };
        if !minutes.is_finite() {
            return Err(FleetError::AdapterExecution {
                adapter: DELAY,
                reason: format!("non-finite prediction for {}", train.train_id),
            });
        }
        Ok(minutes)
    }
}

pub struct RemoteReadinessModel {
    client: Arc<ModelServiceClient>,
}

impl RemoteReadinessModel {
    pub fn new(client: Arc<ModelServiceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReadinessModel for RemoteReadinessModel {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }

    fn algorithm(&self) -> &'static str {
        "XGBoost multi-model readiness (model service)"
    }

    async fn train(
        &self,
        service_set: &[TrainFeatureRecord],
        history_set: &[TrainFeatureRecord],
        maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()> {
        let body = json!({
            "service_set": service_set,
            "history_set": history_set,
            "maintenance_set": maintenance_set,
        });
        self.client.post_ack(READINESS, "train", &body).await
    }

    async fn readiness(&self, train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        let score: f64 = self.client.post(READINESS, "score", &json!({ "train": train })).await?;
        if !score.is_finite() {
            return Err(FleetError::AdapterExecution {
                adapter: READINESS,
                reason: format!("non-finite readiness for {}", train.train_id),
            });
        }
        Ok(score)
    }

    async fn maintenance(&self, train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<MaintenanceAction> {
        let reply: MaintenanceReply = self.client.post(READINESS, "maintenance", &json!({ "train": train })).await?;
        match reply.action {
            None => Ok(MaintenanceAction::Normal),
            Some(action) => MaintenanceAction::parse(&action).ok_or_else(|| FleetError::AdapterExecution {
                adapter: READINESS,
                reason: format!("unknown maintenance action '{}'", action),
            }),
        }
    }
}

pub struct RemoteSelectionSolver {
    client: Arc<ModelServiceClient>,
}

impl RemoteSelectionSolver {
    pub fn new(client: Arc<ModelServiceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SelectionSolver for RemoteSelectionSolver {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }

    fn algorithm(&self) -> &'static str {
        "PuLP linear programming (model service)"
    }

    async fn optimize(&self, fleet: &[ScoredTrain], min_service: usize) -> Result<SelectionOutcome> {
        let body = json!({ "trains": fleet, "min_service_count": min_service });
        let reply: SelectionReply = self.client.post(SELECTION, "optimize", &body).await?;
        let selected_trains: Vec<String> = reply
            .details
            .into_iter()
            .filter(|d| d.selected_for_induction == 1)
            .map(|d| d.train_id)
            .collect();
        Ok(SelectionOutcome {
            status: reply.status,
            selected_count: selected_trains.len(),
            selected_trains,
        })
    }
}

/// Scheduling request body. Known lines carry their track geometry along.
fn schedule_request(
    fleet: &[ScoredTrain],
    routes: &[String],
    time_horizon_hours: u32,
    constraints: &Constraints,
) -> Value {
    let geometry: Vec<&RouteGeometry> = routes.iter().filter_map(|r| route_geometry(r)).collect();
    json!({
        "trains": fleet,
        "routes": routes,
        "route_geometry": geometry,
        "time_horizon_hours": time_horizon_hours,
        "constraints": constraints,
    })
}

pub struct RemoteScheduleSolver {
    client: Arc<ModelServiceClient>,
}

impl RemoteScheduleSolver {
    pub fn new(client: Arc<ModelServiceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScheduleSolver for RemoteScheduleSolver {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }

    fn algorithm(&self) -> &'static str {
        "OR-Tools constraint programming (model service)"
    }

    async fn optimize_schedule(
        &self,
        fleet: &[ScoredTrain],
        routes: &[String],
        time_horizon_hours: u32,
        constraints: &Constraints,
        _rng: &mut StdRng,
    ) -> Result<ScheduleOutcome> {
        let body = schedule_request(fleet, routes, time_horizon_hours, constraints);
        let reply: ScheduleReply = self.client.post(SCHEDULING, "optimize", &body).await?;
        let efficiency = reply
            .performance_metrics
            .and_then(|m| m.efficiency)
            .ok_or_else(|| FleetError::AdapterExecution {
                adapter: SCHEDULING,
                reason: "reply carries no performance_metrics.efficiency".to_string(),
            })?;
        Ok(ScheduleOutcome {
            efficiency,
            conflicts_resolved: reply.conflicts_resolved,
            time_slots_optimized: reply.time_slots_optimized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_prediction_accepts_both_shapes() {
        let bare: DelayPrediction = serde_json::from_str("1.75").unwrap();
        assert!(matches!(bare, DelayPrediction::Minutes(m) if (m - 1.75).abs() < 1e-9));

        let keyed: DelayPrediction = serde_json::from_str(r#"{"PredictedDelayMinutes": 2.5}"#).unwrap();
        assert!(matches!(keyed, DelayPrediction::Keyed { minutes: Some(m) } if (m - 2.5).abs() < 1e-9));

        let empty: DelayPrediction = serde_json::from_str(r#"{"confidence": 0.9}"#).unwrap();
        assert!(matches!(empty, DelayPrediction::Keyed { minutes: None }));
    }

    #[test]
    fn test_selection_reply_defaults() {
        let reply: SelectionReply = serde_json::from_str(
            r#"{"status": "Optimal", "details": [{"train_id": "KRISHNA", "selected_for_induction": 1}, {"train_id": "NILA"}]}"#,
        )
        .unwrap();
        assert_eq!(reply.status, "Optimal");
        assert_eq!(reply.details.iter().filter(|d| d.selected_for_induction == 1).count(), 1);
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ModelServiceClient::new("http://models.local:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://models.local:9000");
    }

    #[test]
    fn test_schedule_request_attaches_known_geometry() {
        let routes = vec!["Red Line".to_string(), "Depot Shuttle".to_string()];
        let body = schedule_request(&[], &routes, 24, &Constraints { min_service: 13 });

        assert_eq!(body["routes"].as_array().map(|r| r.len()), Some(2));
        let geometry = body["route_geometry"].as_array().unwrap();
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0]["route_id"], "RED_LINE");
        assert_eq!(geometry[0]["curve_count"], 23);
        assert_eq!(body["constraints"]["min_service"], 13);
    }
}
