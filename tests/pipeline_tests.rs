//! End-to-end pipeline tests with misbehaving model adapters.
//!
//! Every capability is replaced by a test double that errors or hangs, and
//! the run must still complete with fully populated results.
//!
//! Run: cargo test --test pipeline_tests

use async_trait::async_trait;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metro_fleet_ops::capability::{
    CapabilityKind, CapabilitySet, DelayModel, ReadinessModel, ScheduleOutcome, ScheduleSolver,
    SelectionOutcome, SelectionSolver,
};
use metro_fleet_ops::config::FleetConfig;
use metro_fleet_ops::history::ScheduleHistory;
use metro_fleet_ops::models::{
    Constraints, MaintenanceAction, OperationalStatus, ScheduleRecord, ScoredTrain, TrainFeatureRecord,
};
use metro_fleet_ops::pipeline::{run_optimization, FleetContext};
use metro_fleet_ops::report::{StageSource, RESULTS_CSV, SUMMARY_JSON};
use metro_fleet_ops::{FleetError, Result};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

fn broken(adapter: &'static str) -> FleetError {
    FleetError::AdapterExecution { adapter, reason: "model crashed".to_string() }
}

struct FailingDelay;

#[async_trait]
impl DelayModel for FailingDelay {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Failing delay model"
    }
    async fn train(&self, _history: &[ScheduleRecord]) -> Result<()> {
        Ok(())
    }
    async fn predict(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        Err(broken("delay"))
    }
}

/// Answers the first two trains with an inflated delay, then fails.
#[derive(Default)]
struct FlakyDelay {
    calls: AtomicUsize,
}

#[async_trait]
impl DelayModel for FlakyDelay {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Flaky delay model"
    }
    async fn train(&self, _history: &[ScheduleRecord]) -> Result<()> {
        Ok(())
    }
    async fn predict(&self, train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= 2 {
            return Err(broken("delay"));
        }
        Ok(train.baseline_delay_minutes * 10.0)
    }
}

/// Never finishes training; only the adapter timeout gets the run past it.
struct HangingDelay;

#[async_trait]
impl DelayModel for HangingDelay {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Hanging delay model"
    }
    async fn train(&self, _history: &[ScheduleRecord]) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
    async fn predict(&self, train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        Ok(train.baseline_delay_minutes)
    }
}

struct FailingReadiness;

#[async_trait]
impl ReadinessModel for FailingReadiness {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Failing readiness model"
    }
    async fn train(
        &self,
        _service_set: &[TrainFeatureRecord],
        _history_set: &[TrainFeatureRecord],
        _maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()> {
        Err(broken("readiness"))
    }
    async fn readiness(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        Err(broken("readiness"))
    }
    async fn maintenance(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<MaintenanceAction> {
        Err(broken("readiness"))
    }
}

/// Scores the first two trains far below the fallback band, then fails.
#[derive(Default)]
struct FlakyReadiness {
    calls: AtomicUsize,
}

#[async_trait]
impl ReadinessModel for FlakyReadiness {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Flaky readiness model"
    }
    async fn train(
        &self,
        _service_set: &[TrainFeatureRecord],
        _history_set: &[TrainFeatureRecord],
        _maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()> {
        Ok(())
    }
    async fn readiness(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= 2 {
            return Err(broken("readiness"));
        }
        Ok(0.1)
    }
    async fn maintenance(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<MaintenanceAction> {
        Ok(MaintenanceAction::Normal)
    }
}

/// Scores every train inside the standby band.
struct StandbyReadiness;

#[async_trait]
impl ReadinessModel for StandbyReadiness {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Standby readiness model"
    }
    async fn train(
        &self,
        _service_set: &[TrainFeatureRecord],
        _history_set: &[TrainFeatureRecord],
        _maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()> {
        Ok(())
    }
    async fn readiness(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        Ok(0.7)
    }
    async fn maintenance(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<MaintenanceAction> {
        Ok(MaintenanceAction::Normal)
    }
}

/// Scores every train as ready so the status rule alone decides.
struct PerfectReadiness;

#[async_trait]
impl ReadinessModel for PerfectReadiness {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Perfect readiness model"
    }
    async fn train(
        &self,
        _service_set: &[TrainFeatureRecord],
        _history_set: &[TrainFeatureRecord],
        _maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()> {
        Ok(())
    }
    async fn readiness(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        Ok(0.95)
    }
    async fn maintenance(&self, _train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<MaintenanceAction> {
        Ok(MaintenanceAction::Normal)
    }
}

struct FailingSelection;

#[async_trait]
impl SelectionSolver for FailingSelection {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Failing selection solver"
    }
    async fn optimize(&self, _fleet: &[ScoredTrain], _min_service: usize) -> Result<SelectionOutcome> {
        Err(FleetError::AdapterUnavailable { adapter: "selection", reason: "solver missing".to_string() })
    }
}

struct FailingSchedule;

#[async_trait]
impl ScheduleSolver for FailingSchedule {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Remote
    }
    fn algorithm(&self) -> &'static str {
        "Failing schedule solver"
    }
    async fn optimize_schedule(
        &self,
        _fleet: &[ScoredTrain],
        _routes: &[String],
        _time_horizon_hours: u32,
        _constraints: &Constraints,
        _rng: &mut StdRng,
    ) -> Result<ScheduleOutcome> {
        Err(broken("scheduling"))
    }
}

fn all_failing() -> CapabilitySet {
    CapabilitySet {
        delay: Arc::new(FailingDelay),
        readiness: Arc::new(FailingReadiness),
        selection: Arc::new(FailingSelection),
        scheduling: Arc::new(FailingSchedule),
    }
}

fn context(capabilities: CapabilitySet) -> FleetContext {
    FleetContext::new(FleetConfig::ephemeral(), capabilities, None)
}

// ---------------------------------------------------------------------------
// Fault isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_every_adapter_failing_still_succeeds() {
    let ctx = context(all_failing());
    let run = run_optimization(&ctx, Constraints { min_service: 13 }).await.unwrap();
    let result = &run.result;

    assert_eq!(result.total_trains_analyzed, 25);
    assert_eq!(result.trains.len(), 25);
    assert_eq!(result.delay_prediction_results.source, StageSource::Fallback);
    assert_eq!(result.readiness_assessment_results.source, StageSource::Fallback);
    assert_eq!(result.constraint_optimization_results.source, StageSource::Fallback);
    assert_eq!(result.scheduling_optimization_results.source, StageSource::Fallback);
    assert_eq!(result.constraint_optimization_results.solver_status, "Assumed");

    for train in &result.trains {
        assert!(train.scored.predicted_delay_minutes >= 0.0);
        assert!((0.6..=1.0).contains(&train.scored.ai_readiness_score));
        // Fallback delay is baseline scaled by the optimization gain
        let baseline = train.features().baseline_delay_minutes;
        assert!(train.scored.predicted_delay_minutes <= baseline * 0.85 + 1e-9);
        assert!(train.scored.predicted_delay_minutes >= baseline * 0.65 - 1e-9);
    }

    let distribution = result.operational_status_distribution;
    assert_eq!(distribution.total(), 25);
    let promotion = &result.promotion;
    assert_eq!(
        distribution.service + promotion.shortfall,
        promotion.service_before_promotion.max(13)
    );
    if promotion.service_before_promotion <= 13 && promotion.shortfall == 0 {
        assert_eq!(distribution.service, 13);
    }
}

#[tokio::test]
async fn test_promotion_lands_exactly_on_min_service() {
    let mut hits = 0;
    for seed in 0..5 {
        let mut config = FleetConfig::ephemeral();
        config.seed = seed;
        let mut capabilities = all_failing();
        capabilities.readiness = Arc::new(StandbyReadiness);
        let ctx = FleetContext::new(config, capabilities, None);
        let run = run_optimization(&ctx, Constraints { min_service: 13 }).await.unwrap();
        let result = &run.result;

        assert_eq!(result.promotion.service_before_promotion, 0);
        if result.promotion.shortfall == 0 {
            assert_eq!(result.operational_status_distribution.service, 13, "seed {}", seed);
            assert_eq!(result.promotion.promoted.len(), 13);
            hits += 1;
        }
    }
    assert!(hits > 0, "every seed fell short of 13 standby trains");
}

#[tokio::test]
async fn test_delay_failure_midway_replaces_whole_stage() {
    let delay = Arc::new(FlakyDelay::default());
    let mut capabilities = CapabilitySet::synthetic();
    capabilities.delay = delay.clone();
    let ctx = context(capabilities);

    let run = run_optimization(&ctx, Constraints::default()).await.unwrap();
    assert_eq!(run.result.delay_prediction_results.source, StageSource::Fallback);
    assert_eq!(delay.calls.load(Ordering::SeqCst), 3);

    // The two answers before the failure are discarded along with the rest
    for train in &run.result.trains {
        let baseline = train.features().baseline_delay_minutes;
        assert!(train.scored.predicted_delay_minutes <= baseline * 0.85 + 1e-9, "{}", train.train_id());
        assert!(train.scored.predicted_delay_minutes >= baseline * 0.65 - 1e-9, "{}", train.train_id());
    }
}

#[tokio::test]
async fn test_readiness_failure_midway_replaces_whole_stage() {
    let mut capabilities = CapabilitySet::synthetic();
    capabilities.readiness = Arc::new(FlakyReadiness::default());
    let ctx = context(capabilities);

    let run = run_optimization(&ctx, Constraints::default()).await.unwrap();
    assert_eq!(run.result.readiness_assessment_results.source, StageSource::Fallback);
    assert_eq!(run.result.delay_prediction_results.source, StageSource::Synthetic);
    for train in &run.result.trains {
        let score = train.scored.ai_readiness_score;
        assert!((0.6..=1.0).contains(&score), "{} scored {}", train.train_id(), score);
    }
}

#[tokio::test]
async fn test_open_jobs_never_in_service() {
    let ctx = context(all_failing());
    let run = run_optimization(&ctx, Constraints::default()).await.unwrap();

    for train in &run.result.trains {
        if train.features().critical_jobs_open > 0 {
            assert_ne!(train.final_operational_status, OperationalStatus::Service, "{}", train.train_id());
        }
    }
}

#[tokio::test]
async fn test_hanging_adapter_times_out_into_fallback() {
    let mut config = FleetConfig::ephemeral();
    config.adapter_timeout = Duration::from_millis(50);
    let mut capabilities = CapabilitySet::synthetic();
    capabilities.delay = Arc::new(HangingDelay);
    let ctx = FleetContext::new(config, capabilities, None);

    let run = run_optimization(&ctx, Constraints::default()).await.unwrap();
    assert_eq!(run.result.delay_prediction_results.source, StageSource::Fallback);
    assert_eq!(run.result.readiness_assessment_results.source, StageSource::Synthetic);
    assert!(run.result.optimization_duration < 10.0);
}

// ---------------------------------------------------------------------------
// Status rule and promotion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_status_rule_with_perfect_readiness() {
    let mut capabilities = CapabilitySet::synthetic();
    capabilities.readiness = Arc::new(PerfectReadiness);
    let ctx = context(capabilities);

    let run = run_optimization(&ctx, Constraints { min_service: 0 }).await.unwrap();
    for train in &run.result.trains {
        let f = train.features();
        let expected = if f.critical_jobs_open > 0 {
            OperationalStatus::Maintenance
        } else if f.certificate_valid {
            OperationalStatus::Service
        } else {
            OperationalStatus::Standby
        };
        assert_eq!(train.final_operational_status, expected, "{}", train.train_id());
    }
    assert!(run.result.promotion.promoted.is_empty());
}

#[tokio::test]
async fn test_min_service_zero_promotes_nobody() {
    let ctx = context(CapabilitySet::synthetic());
    let run = run_optimization(&ctx, Constraints { min_service: 0 }).await.unwrap();
    let promotion = &run.result.promotion;

    assert!(promotion.promoted.is_empty());
    assert_eq!(promotion.shortfall, 0);
    assert_eq!(run.result.operational_status_distribution.service, promotion.service_before_promotion);
}

#[tokio::test]
async fn test_min_service_above_fleet_rejected() {
    let ctx = context(CapabilitySet::synthetic());
    let err = run_optimization(&ctx, Constraints { min_service: 26 }).await.unwrap_err();
    assert!(matches!(err, FleetError::ConstraintUnsatisfiable { min_service: 26, fleet_size: 25 }));
}

#[tokio::test]
async fn test_promoted_trains_were_standby_by_readiness() {
    let ctx = context(CapabilitySet::synthetic());
    let strict = run_optimization(&ctx, Constraints { min_service: 0 }).await.unwrap();
    let promoted = run_optimization(&ctx, Constraints { min_service: 25 }).await.unwrap();

    // Same seed, same scores; only promotion differs
    for id in &promoted.result.promotion.promoted {
        let before = strict.result.trains.iter().find(|t| t.train_id() == id.as_str()).unwrap();
        assert_eq!(before.final_operational_status, OperationalStatus::Standby);
        let after = promoted.result.trains.iter().find(|t| t.train_id() == id.as_str()).unwrap();
        assert_eq!(after.final_operational_status, OperationalStatus::Service);
    }
}

// ---------------------------------------------------------------------------
// Reproducibility and persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_same_seed_same_statuses() {
    let ctx = context(CapabilitySet::synthetic());
    let a = run_optimization(&ctx, Constraints::default()).await.unwrap();
    let b = run_optimization(&ctx, Constraints::default()).await.unwrap();

    let statuses = |r: &metro_fleet_ops::report::OptimizationRunResult| {
        r.trains.iter().map(|t| (t.train_id().to_string(), t.final_operational_status)).collect::<Vec<_>>()
    };
    assert_eq!(statuses(&a.result), statuses(&b.result));
    assert_eq!(a.result.after_optimization.energy_efficiency, b.result.after_optimization.energy_efficiency);
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let ctx = Arc::new(context(CapabilitySet::synthetic()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            tokio::spawn(async move { run_optimization(&ctx, Constraints::default()).await })
        })
        .collect();

    let mut readiness = Vec::new();
    for handle in handles {
        let run = handle.await.unwrap().unwrap();
        readiness.push(run.result.after_optimization.ai_readiness_avg);
    }
    assert!(readiness.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_results_persisted_to_output_dir() {
    let dir = std::env::temp_dir().join(format!("metro_fleet_ops_test_{}", std::process::id()));
    let mut config = FleetConfig::ephemeral();
    config.output_dir = Some(dir.clone());
    let ctx = FleetContext::new(config, CapabilitySet::synthetic(), None);

    let run = run_optimization(&ctx, Constraints::default()).await.unwrap();
    let outputs = run.outputs.unwrap();
    assert_eq!(outputs.results_csv, dir.join(RESULTS_CSV));

    let mut rdr = csv::Reader::from_path(&outputs.results_csv).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "final_operational_status"));
    assert_eq!(rdr.records().count(), 25);

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join(SUMMARY_JSON)).unwrap()).unwrap();
    assert_eq!(summary["total_trains_analyzed"], 25);
    assert!(summary.get("detailed_train_analysis").is_none());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_history_calibrates_features() {
    let csv = "TrainID,dwell_time,Distance,LoadFactor,hour,DelayMinutes\n\
               KRISHNA,60,12.5,0.5,8,1.5\n\
               KRISHNA,70,12.5,0.7,10,2.5\n";
    let history = ScheduleHistory::from_reader(csv.as_bytes()).unwrap();
    let ctx = FleetContext::new(FleetConfig::ephemeral(), CapabilitySet::synthetic(), Some(history));

    let run = run_optimization(&ctx, Constraints::default()).await.unwrap();
    let krishna = run.result.trains.iter().find(|t| t.train_id() == "KRISHNA").unwrap();
    assert_eq!(krishna.features().dwell_time_seconds, 65);
    assert!((krishna.features().distance_km - 12.5).abs() < 1e-9);
    assert!((krishna.features().baseline_delay_minutes - 2.0).abs() < 1e-9);
    assert!(run.result.data_source.contains("2 schedule history records"));
}
