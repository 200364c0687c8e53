//! Non-pipelined vs pipelined analytics
//!
//! The non-pipelined view is what a direct aggregation over the fleet table
//! gives: baseline means and a certificate/job-card service count. The
//! pipelined view is a full optimization run over the same fleet.

use serde::Serialize;
use std::time::Instant;

use crate::models::{Constraints, TrainFeatureRecord};
use crate::pipeline::{optimize, FleetContext};
use crate::reconcile::{mean, StatusDistribution};
use crate::report::{OptimizationRunResult, StageSource};
use crate::synth::synthesize_seeded;

#[derive(Debug, Clone, Serialize)]
pub struct NonPipelinedResults {
    pub method: &'static str,
    pub total_trains: usize,
    pub avg_energy_efficiency: f64,
    pub avg_delay_minutes: f64,
    pub service_trains: usize,
    pub open_critical_jobs: u32,
    pub trains_with_open_jobs: usize,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSources {
    pub delay: StageSource,
    pub readiness: StageSource,
    pub selection: StageSource,
    pub scheduling: StageSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelinedResults {
    pub method: &'static str,
    pub total_trains: usize,
    pub avg_energy_efficiency: f64,
    pub avg_delay_minutes: f64,
    pub service_trains: usize,
    pub avg_readiness: f64,
    pub scheduling_accuracy: f64,
    pub status_distribution: StatusDistribution,
    pub stage_sources: StageSources,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub non_pipelined: NonPipelinedResults,
    pub pipelined: PipelinedResults,
    pub timestamp: String,
}

pub fn non_pipelined(fleet: &[TrainFeatureRecord]) -> NonPipelinedResults {
    let started = Instant::now();
    let service_trains = fleet
        .iter()
        .filter(|t| t.certificate_valid && !t.has_open_critical_jobs())
        .count();
    NonPipelinedResults {
        method: "Non-Pipelined (direct aggregation)",
        total_trains: fleet.len(),
        avg_energy_efficiency: mean(fleet.iter().map(|t| t.energy_efficiency_baseline)),
        avg_delay_minutes: mean(fleet.iter().map(|t| t.baseline_delay_minutes)),
        service_trains,
        open_critical_jobs: fleet.iter().map(|t| t.critical_jobs_open).sum(),
        trains_with_open_jobs: fleet.iter().filter(|t| t.has_open_critical_jobs()).count(),
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    }
}

pub fn pipelined(result: &OptimizationRunResult) -> PipelinedResults {
    let after = &result.after_optimization;
    PipelinedResults {
        method: "Pipelined (model-driven)",
        total_trains: result.total_trains_analyzed,
        avg_energy_efficiency: after.energy_efficiency,
        avg_delay_minutes: after.average_delay_minutes,
        service_trains: after.service_trains,
        avg_readiness: after.ai_readiness_avg,
        scheduling_accuracy: after.scheduling_accuracy,
        status_distribution: result.operational_status_distribution,
        stage_sources: StageSources {
            delay: result.delay_prediction_results.source,
            readiness: result.readiness_assessment_results.source,
            selection: result.constraint_optimization_results.source,
            scheduling: result.scheduling_optimization_results.source,
        },
        processing_time_ms: result.optimization_duration * 1000.0,
    }
}

/// Both views over the same seeded fleet. Nothing is persisted.
pub async fn compare(ctx: &FleetContext, constraints: Constraints) -> crate::Result<Comparison> {
    ctx.check_constraints(&constraints)?;
    let fleet = synthesize_seeded(&ctx.config.roster, ctx.history.as_ref(), ctx.config.seed);
    let non_pipelined = non_pipelined(&fleet);

    let run_id = format!("compare-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
    let result = optimize(ctx, constraints, run_id).await;

    Ok(Comparison {
        non_pipelined,
        pipelined: pipelined(&result),
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}
