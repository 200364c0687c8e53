//! Synthetic capability variants
//!
//! Used when the model service is not configured or unreachable, and as the
//! per-stage substitute when a remote call fails. Outputs share the schema
//! and units of the remote adapters.

use async_trait::async_trait;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Beta;
use std::sync::LazyLock;

use super::{
    CapabilityKind, DelayModel, ReadinessModel, ScheduleOutcome, ScheduleSolver, SelectionOutcome,
    SelectionSolver,
};
use crate::error::Result;
use crate::models::{Constraints, MaintenanceAction, ScheduleRecord, ScoredTrain, TrainFeatureRecord};

/// Scheduling efficiency the network runs at without optimization (%)
pub const BASELINE_SCHEDULING_EFFICIENCY: f64 = 85.2;

/// Weights for `MaintenanceAction::ALL`, in order
const MAINTENANCE_WEIGHTS: [u32; 3] = [70, 20, 10];

static READINESS: LazyLock<Option<Beta<f64>>> = LazyLock::new(|| Beta::new(4.0, 1.0).ok());

static MAINTENANCE: LazyLock<Option<WeightedIndex<u32>>> = LazyLock::new(|| {
    if let Ok(dist) = WeightedIndex::new(&MAINTENANCE_WEIGHTS) {
        return Some(dist);
    }
    None
});

/// Readiness in [0.6, 1.0]: Beta(4, 1) scaled into the upper band.
pub fn synthetic_readiness(rng: &mut impl Rng) -> f64 {
    match READINESS.as_ref() {
        Some(beta) => (beta.sample(rng) * 0.4 + 0.6).clamp(0.6, 1.0),
        None => rng.gen_range(0.6..=1.0),
    }
}

/// Normal 70%, monitor 20%, schedule maintenance 10%.
pub fn synthetic_maintenance(rng: &mut impl Rng) -> MaintenanceAction {
    match MAINTENANCE.as_ref() {
        Some(dist) => MaintenanceAction::ALL[dist.sample(rng)],
        None => MaintenanceAction::Normal,
    }
}

pub fn synthetic_efficiency(rng: &mut impl Rng) -> f64 {
    BASELINE_SCHEDULING_EFFICIENCY + rng.gen_range(5.0..15.0)
}

/// Without a model the raw prediction is the baseline delay; the pipeline's
/// improvement step then yields baseline x U(0.65, 0.85).
pub struct SyntheticDelayModel;

#[async_trait]
impl DelayModel for SyntheticDelayModel {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Synthetic
    }

    fn algorithm(&self) -> &'static str {
        "baseline delay with synthetic 15-35% reduction"
    }

    async fn train(&self, _history: &[ScheduleRecord]) -> Result<()> {
        Ok(())
    }

    async fn predict(&self, train: &TrainFeatureRecord, _rng: &mut StdRng) -> Result<f64> {
        Ok(train.baseline_delay_minutes)
    }
}

pub struct SyntheticReadinessModel;

#[async_trait]
impl ReadinessModel for SyntheticReadinessModel {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Synthetic
    }

    fn algorithm(&self) -> &'static str {
        "Beta(4,1) readiness with weighted maintenance draw"
    }

    async fn train(
        &self,
        _service_set: &[TrainFeatureRecord],
        _history_set: &[TrainFeatureRecord],
        _maintenance_set: &[TrainFeatureRecord],
    ) -> Result<()> {
        Ok(())
    }

    async fn readiness(&self, _train: &TrainFeatureRecord, rng: &mut StdRng) -> Result<f64> {
        Ok(synthetic_readiness(rng))
    }

    async fn maintenance(&self, _train: &TrainFeatureRecord, rng: &mut StdRng) -> Result<MaintenanceAction> {
        Ok(synthetic_maintenance(rng))
    }
}

/// Treats the minimum-service constraint as trivially satisfied.
pub struct SyntheticSelectionSolver;

impl SyntheticSelectionSolver {
    pub fn outcome(min_service: usize) -> SelectionOutcome {
        SelectionOutcome {
            status: "Assumed".to_string(),
            selected_count: min_service,
            selected_trains: Vec::new(),
        }
    }
}

#[async_trait]
impl SelectionSolver for SyntheticSelectionSolver {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Synthetic
    }

    fn algorithm(&self) -> &'static str {
        "constraint value assumed satisfied"
    }

    async fn optimize(&self, _fleet: &[ScoredTrain], min_service: usize) -> Result<SelectionOutcome> {
        Ok(Self::outcome(min_service))
    }
}

pub struct SyntheticScheduleSolver;

#[async_trait]
impl ScheduleSolver for SyntheticScheduleSolver {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Synthetic
    }

    fn algorithm(&self) -> &'static str {
        "baseline efficiency plus synthetic 5-15 point gain"
    }

    async fn optimize_schedule(
        &self,
        _fleet: &[ScoredTrain],
        _routes: &[String],
        _time_horizon_hours: u32,
        _constraints: &Constraints,
        rng: &mut StdRng,
    ) -> Result<ScheduleOutcome> {
        Ok(ScheduleOutcome {
            efficiency: synthetic_efficiency(rng),
            conflicts_resolved: None,
            time_slots_optimized: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_synthetic_readiness_band() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5_000 {
            let r = synthetic_readiness(&mut rng);
            assert!((0.6..=1.0).contains(&r), "readiness {} out of band", r);
        }
    }

    #[test]
    fn test_synthetic_efficiency_band() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let e = synthetic_efficiency(&mut rng);
            assert!((90.2..100.2).contains(&e));
        }
    }

    #[test]
    fn test_maintenance_draw_mostly_normal() {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = (0..10_000)
            .filter(|_| synthetic_maintenance(&mut rng) == MaintenanceAction::Normal)
            .count();
        assert!(normal > 6_500 && normal < 7_500, "normal drawn {} times", normal);
    }

    #[test]
    fn test_maintenance_draw_reaches_every_action() {
        let mut rng = StdRng::seed_from_u64(7);
        let draws: Vec<MaintenanceAction> = (0..10_000).map(|_| synthetic_maintenance(&mut rng)).collect();
        let scheduled = draws.iter().filter(|a| **a == MaintenanceAction::ScheduleMaintenance).count();
        let monitor = draws.iter().filter(|a| **a == MaintenanceAction::Monitor).count();

        assert!((800..1_200).contains(&scheduled), "schedule maintenance drawn {} times", scheduled);
        assert!((1_700..2_300).contains(&monitor), "monitor drawn {} times", monitor);
    }

    #[test]
    fn test_synthetic_readiness_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 20_000;
        let mean = (0..n).map(|_| synthetic_readiness(&mut rng)).sum::<f64>() / n as f64;
        // 0.6 + 0.4 * E[Beta(4, 1)] = 0.92
        assert!((mean - 0.92).abs() < 0.01, "mean was {}", mean);
    }

    #[tokio::test]
    async fn test_selection_assumes_constraint() {
        let outcome = SyntheticSelectionSolver.optimize(&[], 13).await.unwrap();
        assert_eq!(outcome.selected_count, 13);
        assert!(outcome.selected_trains.is_empty());
    }
}
