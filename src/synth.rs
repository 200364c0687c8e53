//! Feature synthesizer
//!
//! Builds one `TrainFeatureRecord` per roster entry. Fields come from fixed
//! distributions driven by the caller's seeded RNG, so the same roster and
//! seed always produce the same fleet. When schedule history is available,
//! a train's operational fields are calibrated to its recorded averages.
//!
//! | Field                      | Distribution                      |
//! |----------------------------|-----------------------------------|
//! | baseline delay (min)       | Exponential, mean 2.1             |
//! | dwell time (s)             | Uniform integer [45, 90)          |
//! | distance (km)              | Uniform [2.5, 25.6)               |
//! | scheduled load factor      | Beta(2, 3)                        |
//! | time of day (h)            | Uniform integer [6, 22)           |
//! | passenger density          | Uniform [0.2, 0.9)                |
//! | route complexity           | Uniform [0.8, 2.0)                |
//! | mileage (km)               | Uniform integer [15000, 45000)    |
//! | days since maintenance     | Uniform integer [5, 120)          |
//! | certificate valid          | Bernoulli, p = 0.85               |
//! | open critical jobs         | {0: 0.75, 1: 0.20, 2: 0.05}       |
//! | baseline energy efficiency | Uniform [65, 85)                  |

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Beta, Exp};
use std::sync::LazyLock;

use crate::history::ScheduleHistory;
use crate::models::TrainFeatureRecord;

pub const MEAN_BASELINE_DELAY_MINUTES: f64 = 2.1;
const CRITICAL_JOB_COUNTS: [u32; 3] = [0, 1, 2];
const CRITICAL_JOB_WEIGHTS: [u32; 3] = [75, 20, 5];

static BASELINE_DELAY: LazyLock<Option<Exp<f64>>> =
    LazyLock::new(|| Exp::new(1.0 / MEAN_BASELINE_DELAY_MINUTES).ok());

static LOAD_FACTOR: LazyLock<Option<Beta<f64>>> = LazyLock::new(|| Beta::new(2.0, 3.0).ok());

static CRITICAL_JOBS: LazyLock<Option<WeightedIndex<u32>>> = LazyLock::new(|| {
    if let Ok(dist) = WeightedIndex::new(&CRITICAL_JOB_WEIGHTS) {
        return Some(dist);
    }
    None
});

fn baseline_delay(rng: &mut impl Rng) -> f64 {
    match BASELINE_DELAY.as_ref() {
        Some(exp) => exp.sample(rng),
        None => MEAN_BASELINE_DELAY_MINUTES,
    }
}

fn scheduled_load_factor(rng: &mut impl Rng) -> f64 {
    match LOAD_FACTOR.as_ref() {
        Some(beta) => beta.sample(rng),
        None => 0.4,
    }
}

fn critical_jobs(rng: &mut impl Rng) -> u32 {
    match CRITICAL_JOBS.as_ref() {
        Some(dist) => CRITICAL_JOB_COUNTS[dist.sample(rng)],
        None => 0,
    }
}

/// Synthesize features for the whole roster from an already seeded RNG.
pub fn synthesize_fleet(
    roster: &[String],
    history: Option<&ScheduleHistory>,
    rng: &mut impl Rng,
) -> Vec<TrainFeatureRecord> {
    let profiles = history.map(|h| h.profiles()).unwrap_or_default();

    roster
        .iter()
        .map(|train_id| {
            let mut record = TrainFeatureRecord {
                train_id: train_id.clone(),
                baseline_delay_minutes: baseline_delay(rng),
                dwell_time_seconds: rng.gen_range(45..90),
                distance_km: rng.gen_range(2.5..25.6),
                scheduled_load_factor: scheduled_load_factor(rng),
                time_of_day: rng.gen_range(6..22),
                passenger_density: rng.gen_range(0.2..0.9),
                route_complexity: rng.gen_range(0.8..2.0),
                mileage_km: rng.gen_range(15_000..45_000),
                last_maintenance_days: rng.gen_range(5..120),
                certificate_valid: rng.gen_bool(0.85),
                critical_jobs_open: critical_jobs(rng),
                energy_efficiency_baseline: rng.gen_range(65.0..85.0),
            };

            if let Some(profile) = profiles.get(train_id) {
                record.dwell_time_seconds = profile.dwell_time_seconds.round().max(1.0) as u32;
                record.distance_km = profile.distance_km.max(0.1);
                record.scheduled_load_factor = profile.load_factor.clamp(0.0, 1.0);
                record.time_of_day = (profile.time_of_day.round() as i64).rem_euclid(24) as u8;
                record.baseline_delay_minutes = profile.delay_minutes.max(0.0);
            }

            record
        })
        .collect()
}

/// Convenience entry point: seed a fresh RNG and synthesize.
pub fn synthesize_seeded(
    roster: &[String],
    history: Option<&ScheduleHistory>,
    seed: u64,
) -> Vec<TrainFeatureRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    synthesize_fleet(roster, history, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::default_roster;

    #[test]
    fn test_same_seed_same_fleet() {
        let roster = default_roster();
        let a = synthesize_seeded(&roster, None, 42);
        let b = synthesize_seeded(&roster, None, 42);
        assert_eq!(a, b);

        let c = synthesize_seeded(&roster, None, 7);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fields_within_documented_ranges() {
        let roster = default_roster();
        for seed in 0..20 {
            for r in synthesize_seeded(&roster, None, seed) {
                assert!((45..90).contains(&r.dwell_time_seconds));
                assert!(r.distance_km >= 2.5 && r.distance_km < 25.6);
                assert!((0.0..=1.0).contains(&r.scheduled_load_factor));
                assert!((6..22).contains(&r.time_of_day));
                assert!(r.baseline_delay_minutes >= 0.0);
                assert!((15_000..45_000).contains(&r.mileage_km));
                assert!(r.critical_jobs_open <= 2);
                assert!(r.energy_efficiency_baseline >= 65.0 && r.energy_efficiency_baseline < 85.0);
            }
        }
    }

    #[test]
    fn test_roster_order_preserved() {
        let roster = default_roster();
        let fleet = synthesize_seeded(&roster, None, 42);
        let ids: Vec<&str> = fleet.iter().map(|r| r.train_id.as_str()).collect();
        assert_eq!(ids, roster.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn test_history_calibrates_known_trains() {
        let csv = "train_id,dwell_time,distance,load_factor,time_of_day,delay\nKRISHNA,70,12.0,0.5,25,3.5\n";
        let history = ScheduleHistory::from_reader(csv.as_bytes()).unwrap();
        let roster = vec!["KRISHNA".to_string(), "TAPTI".to_string()];
        let fleet = synthesize_seeded(&roster, Some(&history), 42);

        assert_eq!(fleet[0].dwell_time_seconds, 70);
        assert_eq!(fleet[0].time_of_day, 1);
        assert!((fleet[0].baseline_delay_minutes - 3.5).abs() < 1e-9);
        assert!((45..90).contains(&fleet[1].dwell_time_seconds));
    }

    #[test]
    fn test_critical_jobs_follow_weights() {
        let roster: Vec<String> = (0..20_000).map(|i| format!("T{:05}", i)).collect();
        let fleet = synthesize_seeded(&roster, None, 3);
        let count = |n: u32| fleet.iter().filter(|r| r.critical_jobs_open == n).count();

        // 75 / 20 / 5 percent of 20000
        assert!((14_500..15_500).contains(&count(0)), "0 jobs: {}", count(0));
        assert!((3_600..4_400).contains(&count(1)), "1 job: {}", count(1));
        assert!((800..1_200).contains(&count(2)), "2 jobs: {}", count(2));
    }

    #[test]
    fn test_continuous_draws_have_plausible_means() {
        let roster: Vec<String> = (0..20_000).map(|i| format!("T{:05}", i)).collect();
        let fleet = synthesize_seeded(&roster, None, 1);
        let n = fleet.len() as f64;

        let delay = fleet.iter().map(|r| r.baseline_delay_minutes).sum::<f64>() / n;
        assert!((delay - MEAN_BASELINE_DELAY_MINUTES).abs() < 0.1, "delay mean {}", delay);

        // Beta(2, 3) has mean 0.4
        let load = fleet.iter().map(|r| r.scheduled_load_factor).sum::<f64>() / n;
        assert!((load - 0.4).abs() < 0.02, "load mean {}", load);
    }
}
