//! REST API server for metro fleet optimization
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT          Port to listen on (default: 8080)
//!   --model-url URL      Model service base URL (default: synthetic capabilities)
//!   --seed N             RNG seed for every run (default: 42)
//!   --output-dir PATH    Where run results are written ("" disables)
//!   --history PATH       Schedule history CSV
//!
//! REST endpoints:
//!   GET  /api/v1/health           - Health check and capability report
//!   POST /api/v1/optimization     - Run the optimization pipeline
//!   GET  /api/v1/comparison       - Non-pipelined vs pipelined analytics
//!   GET  /api/v1/dashboard        - Headline numbers from the last run
//!   GET  /api/v1/maintenance      - Maintenance windows from the last run
//!   GET  /api/v1/fleet/efficiency - Per-train efficiency from the last run
//!   POST /api/v1/schedule/optimization - Reschedule the last run's service trains
//!   GET  /api/v1/routes/geometry  - Track geometry of the configured lines
//!   GET  /api/v1/track/issues     - Speed restrictions and steep sections by severity

use anyhow::Result;
use clap::Parser;
use metro_fleet_ops::api::{self, FleetService};
use metro_fleet_ops::capability::CapabilityReport;
use metro_fleet_ops::config::FleetConfig;
use metro_fleet_ops::pipeline::FleetContext;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the metro fleet optimizer over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Model service base URL
    #[arg(long)]
    model_url: Option<String>,

    /// RNG seed for every run
    #[arg(long)]
    seed: Option<u64>,

    /// Output directory for run results (empty disables persistence)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Schedule history CSV
    #[arg(long)]
    history: Option<PathBuf>,
}

impl Args {
    fn apply(self, mut config: FleetConfig) -> FleetConfig {
        if let Some(url) = self.model_url {
            config.model_service_url = Some(url);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = if dir.as_os_str().is_empty() { None } else { Some(dir) };
        }
        if let Some(history) = self.history {
            config.history_path = Some(history);
        }
        config
    }
}

fn print_banner(port: u16, config: &FleetConfig, capabilities: &CapabilityReport) {
    println!("============================================================");
    println!("         METRO FLEET OPTIMIZATION API SERVER");
    println!("============================================================");
    println!();
    println!("  Port:        {}", port);
    println!("  REST:        http://localhost:{}/api/v1/", port);
    println!("  Trainsets:   {}", config.roster.len());
    println!("  Seed:        {}", config.seed);
    match &config.output_dir {
        Some(dir) => println!("  Outputs:     {}", dir.display()),
        None => println!("  Outputs:     (not persisted)"),
    }
    println!();
    println!("Capabilities:");
    println!("  delay        {:?}", capabilities.delay);
    println!("  readiness    {:?}", capabilities.readiness);
    println!("  selection    {:?}", capabilities.selection);
    println!("  scheduling   {:?}", capabilities.scheduling);
    println!();
    println!("REST Endpoints:");
    println!("  GET  /api/v1/health            Health check");
    println!("  POST /api/v1/optimization      Run optimization");
    println!("  GET  /api/v1/comparison        Pipelined vs naive");
    println!("  GET  /api/v1/dashboard         Last-run dashboard");
    println!("  GET  /api/v1/maintenance       Maintenance windows");
    println!("  GET  /api/v1/fleet/efficiency  Fleet efficiency");
    println!("  POST /api/v1/schedule/optimization  Reschedule service trains");
    println!("  GET  /api/v1/routes/geometry   Route geometry");
    println!("  GET  /api/v1/track/issues      Track issues");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    let port = args.port;
    let config = args.apply(FleetConfig::from_env());

    let ctx = FleetContext::initialize(config).await?;
    print_banner(port, &ctx.config, &ctx.capabilities.report());

    let service = Arc::new(FleetService::new(ctx));
    let app = api::router(service);

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
