//! External model capabilities consumed by the optimization pipeline
//!
//! Each capability has two variants behind one trait: a remote adapter that
//! talks to the model service over HTTP, and a synthetic adapter that
//! produces statistically plausible stand-ins. The variant is chosen once at
//! startup by `CapabilitySet::probe`; the pipeline only sees the traits.

pub mod remote;
pub mod synthetic;

use async_trait::async_trait;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{Constraints, MaintenanceAction, ScheduleRecord, ScoredTrain, TrainFeatureRecord};

pub use remote::ModelServiceClient;

/// Which variant backs a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Remote,
    Synthetic,
}

/// Predicts per-train delay in minutes.
#[async_trait]
pub trait DelayModel: Send + Sync {
    fn kind(&self) -> CapabilityKind;
    fn algorithm(&self) -> &'static str;

    async fn train(&self, history: &[ScheduleRecord]) -> Result<()>;

    /// Raw model output, before any optimization improvement is applied.
    async fn predict(&self, train: &TrainFeatureRecord, rng: &mut StdRng) -> Result<f64>;
}

/// Scores readiness in [0, 1] and recommends a maintenance action.
#[async_trait]
pub trait ReadinessModel: Send + Sync {
    fn kind(&self) -> CapabilityKind;
    fn algorithm(&self) -> &'static str;

    async fn train(
        &self,
        service_set: &[TrainFeatureRecord],
        history_set: &[TrainFeatureRecord],
        maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()>;

    async fn readiness(&self, train: &TrainFeatureRecord, rng: &mut StdRng) -> Result<f64>;

    async fn maintenance(&self, train: &TrainFeatureRecord, rng: &mut StdRng) -> Result<MaintenanceAction>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub status: String,
    pub selected_count: usize,
    pub selected_trains: Vec<String>,
}

/// Chooses which trains enter service under a minimum-service constraint.
#[async_trait]
pub trait SelectionSolver: Send + Sync {
    fn kind(&self) -> CapabilityKind;
    fn algorithm(&self) -> &'static str;

    async fn optimize(&self, fleet: &[ScoredTrain], min_service: usize) -> Result<SelectionOutcome>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleOutcome {
    pub efficiency: f64,
    pub conflicts_resolved: Option<u32>,
    pub time_slots_optimized: Option<u32>,
}

/// Builds a timetable over the given routes and reports its efficiency.
#[async_trait]
pub trait ScheduleSolver: Send + Sync {
    fn kind(&self) -> CapabilityKind;
    fn algorithm(&self) -> &'static str;

    async fn optimize_schedule(
        &self,
        fleet: &[ScoredTrain],
        routes: &[String],
        time_horizon_hours: u32,
        constraints: &Constraints,
        rng: &mut StdRng,
    ) -> Result<ScheduleOutcome>;
}

/// The four capabilities a run needs
#[derive(Clone)]
pub struct CapabilitySet {
    pub delay: Arc<dyn DelayModel>,
    pub readiness: Arc<dyn ReadinessModel>,
    pub selection: Arc<dyn SelectionSolver>,
    pub scheduling: Arc<dyn ScheduleSolver>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    pub delay: CapabilityKind,
    pub readiness: CapabilityKind,
    pub selection: CapabilityKind,
    pub scheduling: CapabilityKind,
}

impl CapabilitySet {
    /// Every capability backed by its synthetic variant.
    pub fn synthetic() -> Self {
        Self {
            delay: Arc::new(synthetic::SyntheticDelayModel),
            readiness: Arc::new(synthetic::SyntheticReadinessModel),
            selection: Arc::new(synthetic::SyntheticSelectionSolver),
            scheduling: Arc::new(synthetic::SyntheticScheduleSolver),
        }
    }

    /// Probe the model service once and pick a variant per capability.
    pub async fn probe(model_service_url: Option<&str>, timeout: Duration) -> Self {
        let mut set = Self::synthetic();
        let Some(url) = model_service_url else {
            info!("No model service configured; all capabilities synthetic");
            return set;
        };

        let client = match ModelServiceClient::new(url, timeout) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("Model service client could not be built: {}", e);
                return set;
            }
        };

        if probe_one(&client, remote::DELAY).await {
            set.delay = Arc::new(remote::RemoteDelayModel::new(client.clone()));
        }
        if probe_one(&client, remote::READINESS).await {
            set.readiness = Arc::new(remote::RemoteReadinessModel::new(client.clone()));
        }
        if probe_one(&client, remote::SELECTION).await {
            set.selection = Arc::new(remote::RemoteSelectionSolver::new(client.clone()));
        }
        if probe_one(&client, remote::SCHEDULING).await {
            set.scheduling = Arc::new(remote::RemoteScheduleSolver::new(client));
        }

        set
    }

    pub fn report(&self) -> CapabilityReport {
        CapabilityReport {
            delay: self.delay.kind(),
            readiness: self.readiness.kind(),
            selection: self.selection.kind(),
            scheduling: self.scheduling.kind(),
        }
    }
}

async fn probe_one(client: &ModelServiceClient, capability: &'static str) -> bool {
    match client.health(capability).await {
        Ok(()) => {
            info!("✓ {} capability available at {}", capability, client.base_url());
            true
        }
        Err(e) => {
            warn!("⚠ {} capability unavailable, using synthetic fallback: {}", capability, e);
            false
        }
    }
}
