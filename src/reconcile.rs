//! Status assignment and minimum-service enforcement
//!
//! The service predicate requires `critical_jobs_open == 0`, the maintenance
//! predicate fires on `critical_jobs_open > 0`, so the two never overlap and
//! a train with open critical jobs can never be placed in service. Keep the
//! service check first if these rules change.

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{MaintenanceAction, OperationalStatus, ScoredTrain, TrainRecord};

pub const SERVICE_READINESS_THRESHOLD: f64 = 0.8;
pub const MAINTENANCE_READINESS_THRESHOLD: f64 = 0.5;

pub const BASELINE_SCHEDULING_ACCURACY: f64 = 85.2;
pub const MAX_SCHEDULING_ACCURACY: f64 = 99.8;
/// Share of the efficiency gap that carries over into scheduling accuracy
pub const ACCURACY_GAP_CAPTURE: f64 = 0.8;
pub const MAX_ENERGY_EFFICIENCY: f64 = 95.0;
/// Readiness assumed for the fleet before any assessment
pub const BASELINE_READINESS: f64 = 0.75;

pub fn qualifies_for_service(t: &ScoredTrain) -> bool {
    t.ai_readiness_score > SERVICE_READINESS_THRESHOLD
        && t.features.certificate_valid
        && t.features.critical_jobs_open == 0
}

pub fn requires_maintenance(t: &ScoredTrain) -> bool {
    t.ai_readiness_score < MAINTENANCE_READINESS_THRESHOLD
        || t.features.critical_jobs_open > 0
        || t.maintenance_recommendation == MaintenanceAction::ScheduleMaintenance
}

pub fn assign_status(t: &ScoredTrain) -> OperationalStatus {
    if qualifies_for_service(t) {
        OperationalStatus::Service
    } else if requires_maintenance(t) {
        OperationalStatus::Maintenance
    } else {
        OperationalStatus::Standby
    }
}

pub fn assign_all(scored: Vec<ScoredTrain>) -> Vec<TrainRecord> {
    scored
        .into_iter()
        .map(|s| {
            let status = assign_status(&s);
            TrainRecord { scored: s, final_operational_status: status }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromotionReport {
    pub service_before_promotion: usize,
    pub promoted: Vec<String>,
    /// Trains still missing after every standby train was promoted
    pub shortfall: usize,
}

/// Top up service from standby, best readiness first (roster order on ties).
/// Never demotes and never touches maintenance trains.
pub fn enforce_min_service(records: &mut [TrainRecord], min_service: usize) -> PromotionReport {
    let service_before = count_status(records, OperationalStatus::Service);
    let needed = min_service.saturating_sub(service_before);
    if needed == 0 {
        return PromotionReport { service_before_promotion: service_before, ..Default::default() };
    }

    let mut standby: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_in(OperationalStatus::Standby))
        .map(|(i, _)| i)
        .collect();
    // sort_by is stable, so equal scores keep roster order
    standby.sort_by(|&a, &b| records[b].readiness().total_cmp(&records[a].readiness()));

    let mut promoted = Vec::with_capacity(needed);
    for idx in standby.into_iter().take(needed) {
        records[idx].final_operational_status = OperationalStatus::Service;
        debug!("Promoted {} to service (readiness {:.3})", records[idx].train_id(), records[idx].readiness());
        promoted.push(records[idx].train_id().to_string());
    }

    let shortfall = needed - promoted.len();
    if shortfall > 0 {
        warn!(
            "Minimum service of {} not reachable: {} trains short after promoting all standby",
            min_service, shortfall
        );
    }

    PromotionReport { service_before_promotion: service_before, promoted, shortfall }
}

pub fn count_status(records: &[TrainRecord], status: OperationalStatus) -> usize {
    records.iter().filter(|r| r.is_in(status)).count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusDistribution {
    pub service: usize,
    pub standby: usize,
    pub maintenance: usize,
}

impl StatusDistribution {
    pub fn of(records: &[TrainRecord]) -> Self {
        Self {
            service: count_status(records, OperationalStatus::Service),
            standby: count_status(records, OperationalStatus::Standby),
            maintenance: count_status(records, OperationalStatus::Maintenance),
        }
    }

    pub fn total(&self) -> usize {
        self.service + self.standby + self.maintenance
    }
}

/// Apply the post-model optimization gain to a raw delay prediction.
/// Returns `(predicted, improvement)` where improvement is measured against
/// the train's baseline delay.
pub fn apply_delay_improvement(raw_minutes: f64, improvement_factor: f64, baseline_minutes: f64) -> (f64, f64) {
    let predicted = (raw_minutes * (1.0 - improvement_factor)).max(0.0);
    (predicted, baseline_minutes - predicted)
}

pub fn optimized_scheduling_accuracy(scheduling_efficiency: f64) -> f64 {
    let gain = (scheduling_efficiency - BASELINE_SCHEDULING_ACCURACY) * ACCURACY_GAP_CAPTURE;
    (BASELINE_SCHEDULING_ACCURACY + gain).min(MAX_SCHEDULING_ACCURACY)
}

pub fn optimized_energy_efficiency(baseline_mean: f64, improvement_points: f64) -> f64 {
    (baseline_mean + improvement_points).min(MAX_ENERGY_EFFICIENCY)
}

pub fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}
