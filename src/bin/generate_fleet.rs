//! Synthetic fleet generator
//!
//! Writes the per-train feature table the optimizer synthesizes, and
//! optionally a schedule history CSV that can be fed back via --history.
//!
//! Usage:
//!   cargo run --release --bin generate_fleet -- [OPTIONS]
//!
//! Options:
//!   --seed <N>                 Random seed (default: 42)
//!   --output <PATH>            Feature CSV path (default: data/fleet_features.csv)
//!   --roster <A,B,..>          Comma-separated trainset roster (default: KMRL fleet)
//!   --history <PATH>           Calibrate features on an existing schedule history
//!   --schedule-history <PATH>  Also write a schedule history CSV
//!   --days <N>                 Days of schedule history per train (default: 30)

use anyhow::Result;
use clap::Parser;
use csv::WriterBuilder;
use metro_fleet_ops::fleet::{default_roster, parse_roster, validate_roster};
use metro_fleet_ops::history::ScheduleHistory;
use metro_fleet_ops::models::{ScheduleRecord, TrainFeatureRecord};
use metro_fleet_ops::synth::synthesize_fleet;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "generate_fleet")]
#[command(about = "Generate synthetic trainset features and schedule history")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Feature CSV path
    #[arg(long, default_value = "data/fleet_features.csv")]
    output: PathBuf,

    /// Comma-separated roster override
    #[arg(long)]
    roster: Option<String>,

    /// Existing schedule history to calibrate on
    #[arg(long)]
    history: Option<PathBuf>,

    /// Write a schedule history CSV here
    #[arg(long)]
    schedule_history: Option<PathBuf>,

    /// Days of schedule history per train
    #[arg(long, default_value = "30")]
    days: u32,
}

/// One noisy daily observation around a train's synthesized profile.
fn observe(train: &TrainFeatureRecord, rng: &mut StdRng) -> ScheduleRecord {
    let base = train.to_schedule_record();
    ScheduleRecord {
        train_id: base.train_id,
        dwell_time_seconds: (base.dwell_time_seconds + rng.gen_range(-8.0..8.0)).max(20.0),
        distance_km: base.distance_km,
        load_factor: (base.load_factor + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0),
        time_of_day: (base.time_of_day + rng.gen_range(-2..=2) as f64).rem_euclid(24.0),
        delay_minutes: (base.delay_minutes * rng.gen_range(0.5..1.5)).max(0.0),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("🔧 Synthetic Fleet Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Seed:             {}", args.seed);
    println!("Output:           {}", args.output.display());

    let roster = match &args.roster {
        Some(list) => parse_roster(list),
        None => default_roster(),
    };
    validate_roster(&roster)?;
    println!("Trainsets:        {}", roster.len());

    let history = match &args.history {
        Some(path) => {
            let h = ScheduleHistory::load(path)?;
            println!("Calibrating on:   {} ({} records)", path.display(), h.len());
            Some(h)
        }
        None => None,
    };
    println!();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let fleet = synthesize_fleet(&roster, history.as_ref(), &mut rng);

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().has_headers(true).from_path(&args.output)?;
    for train in &fleet {
        writer.serialize(train)?;
    }
    writer.flush()?;

    let mut history_written = 0;
    if let Some(path) = &args.schedule_history {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
        for _ in 0..args.days {
            for train in &fleet {
                writer.serialize(observe(train, &mut rng))?;
                history_written += 1;
            }
        }
        writer.flush()?;
    }

    println!("✅ Generation complete!");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Trainsets written:   {:>8}", fleet.len());
    println!(
        "Open critical jobs:  {:>8}",
        fleet.iter().map(|t| t.critical_jobs_open).sum::<u32>()
    );
    println!(
        "Valid certificates:  {:>8}",
        fleet.iter().filter(|t| t.certificate_valid).count()
    );
    if let Some(path) = &args.schedule_history {
        println!("History records:     {:>8}", history_written);
        println!("History file:        {}", path.display());
    }

    Ok(())
}
