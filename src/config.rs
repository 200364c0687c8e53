//! Runtime configuration
//!
//! Environment variables:
//!   FLEET_SEED                  RNG seed for every run (default: 42)
//!   FLEET_MIN_SERVICE           Default minimum trains in service (default: 13)
//!   FLEET_MODEL_URL             Model service base URL (unset: synthetic capabilities)
//!   FLEET_ADAPTER_TIMEOUT_SECS  Per-call adapter timeout (default: 30)
//!   FLEET_OUTPUT_DIR            Where results are written; empty disables (default: outputs)
//!   FLEET_HISTORY_CSV           Schedule history CSV (optional)
//!   FLEET_ROSTER                Comma-separated roster override

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::fleet::{default_roster, default_routes, parse_roster, DEFAULT_MIN_SERVICE};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TIME_HORIZON_HOURS: u32 = 24;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub seed: u64,
    pub default_min_service: usize,
    pub model_service_url: Option<String>,
    pub adapter_timeout: Duration,
    pub output_dir: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
    pub time_horizon_hours: u32,
    pub roster: Vec<String>,
    pub routes: Vec<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            default_min_service: DEFAULT_MIN_SERVICE,
            model_service_url: None,
            adapter_timeout: Duration::from_secs(30),
            output_dir: Some(PathBuf::from("outputs")),
            history_path: None,
            time_horizon_hours: DEFAULT_TIME_HORIZON_HOURS,
            roster: default_roster(),
            routes: default_routes(),
        }
    }
}

impl FleetConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            seed: env_parse("FLEET_SEED", defaults.seed),
            default_min_service: env_parse("FLEET_MIN_SERVICE", defaults.default_min_service),
            model_service_url: env_string("FLEET_MODEL_URL"),
            adapter_timeout: Duration::from_secs(env_parse("FLEET_ADAPTER_TIMEOUT_SECS", 30u64)),
            output_dir: match std::env::var("FLEET_OUTPUT_DIR") {
                Ok(dir) if dir.trim().is_empty() => None,
                Ok(dir) => Some(PathBuf::from(dir)),
                Err(_) => defaults.output_dir,
            },
            history_path: env_string("FLEET_HISTORY_CSV").map(PathBuf::from),
            time_horizon_hours: defaults.time_horizon_hours,
            roster: env_string("FLEET_ROSTER")
                .map(|list| parse_roster(&list))
                .unwrap_or(defaults.roster),
            routes: defaults.routes,
        }
    }

    /// Configuration for in-process use: synthetic capabilities, nothing written to disk.
    pub fn ephemeral() -> Self {
        Self { output_dir: None, ..Self::default() }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}='{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}
