//! Optimization run results and their persisted form

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::models::{MaintenanceAction, OperationalStatus, TrainRecord, TrainResultRow};
use crate::reconcile::{PromotionReport, StatusDistribution};

pub const RESULTS_CSV: &str = "optimization_results.csv";
pub const SUMMARY_JSON: &str = "optimization_summary.json";

/// Where a stage's values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageSource {
    /// The remote model answered
    Remote,
    /// The synthetic variant was selected at startup
    Synthetic,
    /// The remote model failed during this run and was substituted
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub scheduling_accuracy: f64,
    pub average_delay_minutes: f64,
    pub energy_efficiency: f64,
    pub service_trains: usize,
    pub ai_readiness_avg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayStageReport {
    pub algorithm: String,
    pub source: StageSource,
    pub trains_analyzed: usize,
    pub average_delay_reduction_minutes: f64,
    /// Reduction across the fleet, counting a round trip per train
    pub total_delay_savings_per_day: f64,
    pub prediction_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessStageReport {
    pub algorithm: String,
    pub source: StageSource,
    pub average_readiness_score: f64,
    pub trains_ready_for_service: usize,
    pub maintenance_required: usize,
    pub assessment_accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionStageReport {
    pub algorithm: String,
    pub source: StageSource,
    pub solver_status: String,
    pub solver_selected_count: usize,
    pub solver_selected_trains: Vec<String>,
    pub trains_selected_for_service: usize,
    pub resource_utilization: f64,
    pub constraint_satisfaction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulingStageReport {
    pub algorithm: String,
    pub source: StageSource,
    pub routes: Vec<String>,
    pub time_horizon_hours: u32,
    pub scheduling_efficiency: f64,
    pub conflicts_resolved: u32,
    pub time_slots_optimized: u32,
    pub route_utilization_improvement: f64,
}

/// After minus before, per headline metric
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceDelta {
    pub scheduling_accuracy_points: f64,
    pub delay_reduction_minutes: f64,
    pub energy_efficiency_points: f64,
    pub service_trains: i64,
    pub ai_readiness_points: f64,
}

impl PerformanceDelta {
    pub fn between(before: &PerformanceSnapshot, after: &PerformanceSnapshot) -> Self {
        Self {
            scheduling_accuracy_points: after.scheduling_accuracy - before.scheduling_accuracy,
            delay_reduction_minutes: before.average_delay_minutes - after.average_delay_minutes,
            energy_efficiency_points: after.energy_efficiency - before.energy_efficiency,
            service_trains: after.service_trains as i64 - before.service_trains as i64,
            ai_readiness_points: after.ai_readiness_avg - before.ai_readiness_avg,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainDetail {
    pub train_id: String,
    pub final_operational_status: OperationalStatus,
    pub predicted_delay_minutes: f64,
    pub ai_readiness_score: f64,
    pub maintenance_recommendation: MaintenanceAction,
}

impl From<&TrainRecord> for TrainDetail {
    fn from(r: &TrainRecord) -> Self {
        Self {
            train_id: r.train_id().to_string(),
            final_operational_status: r.final_operational_status,
            predicted_delay_minutes: r.scored.predicted_delay_minutes,
            ai_readiness_score: r.scored.ai_readiness_score,
            maintenance_recommendation: r.scored.maintenance_recommendation,
        }
    }
}

/// Everything one optimization run produced
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationRunResult {
    pub run_id: String,
    pub seed: u64,
    pub optimization_duration: f64,
    pub total_trains_analyzed: usize,
    pub data_source: String,
    pub min_service: usize,
    pub models_used: Vec<String>,
    pub before_optimization: PerformanceSnapshot,
    pub after_optimization: PerformanceSnapshot,
    pub delay_prediction_results: DelayStageReport,
    pub readiness_assessment_results: ReadinessStageReport,
    pub constraint_optimization_results: SelectionStageReport,
    pub scheduling_optimization_results: SchedulingStageReport,
    pub overall_performance_improvement: PerformanceDelta,
    pub operational_status_distribution: StatusDistribution,
    pub promotion: PromotionReport,
    pub detailed_train_analysis: Vec<TrainDetail>,
    #[serde(skip)]
    pub trains: Vec<TrainRecord>,
}

impl OptimizationRunResult {
    /// The result without per-train detail, as written to the summary file.
    pub fn summary(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("detailed_train_analysis");
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistedOutputs {
    pub results_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Write the per-train table and the JSON summary into `dir`.
pub fn persist(result: &OptimizationRunResult, dir: &Path) -> Result<PersistedOutputs> {
    fs::create_dir_all(dir)?;

    let results_csv = dir.join(RESULTS_CSV);
    let mut writer = csv::Writer::from_path(&results_csv)?;
    for record in &result.trains {
        writer.serialize(TrainResultRow::from(record))?;
    }
    writer.flush()?;

    let summary_json = dir.join(SUMMARY_JSON);
    fs::write(&summary_json, serde_json::to_string_pretty(&result.summary()?)?)?;

    info!("Results saved to {} and {}", results_csv.display(), summary_json.display());
    Ok(PersistedOutputs { results_csv, summary_json })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::config::FleetConfig;
    use crate::models::Constraints;
    use crate::pipeline::{optimize, FleetContext};

    fn snapshot(accuracy: f64, delay: f64, service: usize) -> PerformanceSnapshot {
        PerformanceSnapshot {
            scheduling_accuracy: accuracy,
            average_delay_minutes: delay,
            energy_efficiency: 75.0,
            service_trains: service,
            ai_readiness_avg: 0.75,
        }
    }

    #[test]
    fn test_delta_signs() {
        let delta = PerformanceDelta::between(&snapshot(85.2, 2.0, 15), &snapshot(93.0, 1.5, 13));
        assert!((delta.scheduling_accuracy_points - 7.8).abs() < 1e-9);
        assert!((delta.delay_reduction_minutes - 0.5).abs() < 1e-9);
        assert_eq!(delta.service_trains, -2);
        assert_eq!(delta.energy_efficiency_points, 0.0);
    }

    #[tokio::test]
    async fn test_summary_drops_train_detail() {
        let ctx = FleetContext::new(FleetConfig::ephemeral(), CapabilitySet::synthetic(), None);
        let result = optimize(&ctx, Constraints::default(), "test-run".to_string()).await;

        let full = serde_json::to_value(&result).unwrap();
        assert_eq!(full["detailed_train_analysis"].as_array().unwrap().len(), 25);
        assert!(full.get("trains").is_none());

        let summary = result.summary().unwrap();
        assert!(summary.get("detailed_train_analysis").is_none());
        assert_eq!(summary["run_id"], "test-run");
        assert_eq!(summary["delay_prediction_results"]["source"], "synthetic");
    }
}
