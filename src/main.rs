//! One-shot fleet optimization run
//!
//! Runs the pipeline once with the environment configuration and prints a
//! console report. Optional first argument: min_service.

use anyhow::Result;
use metro_fleet_ops::config::FleetConfig;
use metro_fleet_ops::models::{Constraints, OperationalStatus};
use metro_fleet_ops::pipeline::{describe_outputs, run_optimization, FleetContext};
use metro_fleet_ops::report::OptimizationRunResult;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn print_performance(result: &OptimizationRunResult) {
    let before = &result.before_optimization;
    let after = &result.after_optimization;

    print_subsection("Before vs After");
    println!("  {:24} {:>12} {:>12}", "Metric", "Before", "After");
    println!("  {}", "─".repeat(50));
    println!("  {:24} {:>11.1}% {:>11.1}%", "Scheduling accuracy", before.scheduling_accuracy, after.scheduling_accuracy);
    println!("  {:24} {:>10.2}m {:>10.2}m", "Average delay", before.average_delay_minutes, after.average_delay_minutes);
    println!("  {:24} {:>11.1}% {:>11.1}%", "Energy efficiency", before.energy_efficiency, after.energy_efficiency);
    println!("  {:24} {:>12} {:>12}", "Trains in service", before.service_trains, after.service_trains);
    println!("  {:24} {:>12.3} {:>12.3}", "Readiness average", before.ai_readiness_avg, after.ai_readiness_avg);
}

fn print_stages(result: &OptimizationRunResult) {
    print_subsection("Stages");
    let delay = &result.delay_prediction_results;
    let readiness = &result.readiness_assessment_results;
    let selection = &result.constraint_optimization_results;
    let scheduling = &result.scheduling_optimization_results;
    println!("  {:12} {:34} {:?}", "delay", delay.algorithm, delay.source);
    println!("  {:12} {:34} {:?}", "readiness", readiness.algorithm, readiness.source);
    println!("  {:12} {:34} {:?}", "selection", selection.algorithm, selection.source);
    println!("  {:12} {:34} {:?}", "scheduling", scheduling.algorithm, scheduling.source);
    println!();
    println!("  Delay savings per day:   {:>10.1} min", delay.total_delay_savings_per_day);
    println!("  Solver status:           {:>10}", selection.solver_status);
    println!("  Scheduling efficiency:   {:>9.1}%", scheduling.scheduling_efficiency);
}

fn print_trains(result: &OptimizationRunResult) {
    print_subsection("Trainsets");
    println!("  {:14} {:>12} {:>10} {:>10} {:>22}", "Train", "Status", "Readiness", "Delay", "Recommendation");
    println!("  {}", "─".repeat(72));
    for detail in &result.detailed_train_analysis {
        println!(
            "  {:14} {:>12} {:>10.3} {:>9.2}m {:>22}",
            detail.train_id,
            detail.final_operational_status,
            detail.ai_readiness_score,
            detail.predicted_delay_minutes,
            detail.maintenance_recommendation
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let config = FleetConfig::from_env();
    let min_service = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => config.default_min_service,
    };

    let ctx = FleetContext::initialize(config).await?;
    let run = run_optimization(&ctx, Constraints { min_service }).await?;
    let result = &run.result;

    println!("\n{}", "█".repeat(80));
    println!("{}  METRO FLEET OPTIMIZATION  {}", "█".repeat(26), "█".repeat(26));
    println!("{}\n", "█".repeat(80));

    print_section_header(&format!("Run {} (seed {})", result.run_id, result.seed));
    println!("  Trains analyzed:      {:>8}", result.total_trains_analyzed);
    println!("  Data source:          {}", result.data_source);
    println!("  Duration:             {:>7.2}s", result.optimization_duration);

    let distribution = &result.operational_status_distribution;
    println!("  In service:           {:>8}", distribution.service);
    println!("  Standby:              {:>8}", distribution.standby);
    println!("  Maintenance:          {:>8}", distribution.maintenance);

    let promotion = &result.promotion;
    if !promotion.promoted.is_empty() {
        println!("  Promoted to service:  {}", promotion.promoted.join(", "));
    }
    if promotion.shortfall > 0 {
        println!(
            "  ⚠ Service shortfall:  {} (minimum {} not reachable without maintenance trains)",
            promotion.shortfall, result.min_service
        );
    }

    print_performance(result);
    print_stages(result);
    print_trains(result);

    let maintenance: Vec<&str> = result
        .trains
        .iter()
        .filter(|t| t.is_in(OperationalStatus::Maintenance))
        .map(|t| t.train_id())
        .collect();
    if !maintenance.is_empty() {
        print_subsection("Held for maintenance");
        println!("  {}", maintenance.join(", "));
    }

    let files = describe_outputs(run.outputs.as_ref());
    if !files.is_empty() {
        print_subsection("Outputs");
        for file in files {
            println!("  {}", file);
        }
    }

    println!("\n{}", "█".repeat(80));
    Ok(())
}
