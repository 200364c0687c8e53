//! Schedule history loading
//!
//! History exports come from several tools that disagree on column names.
//! Each canonical column has an explicit alias list; a file that cannot
//! satisfy every canonical column is rejected with `SchemaMismatch`.

use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{FleetError, Result};
use crate::models::ScheduleRecord;

/// Canonical column name and the source headers accepted for it
pub const COLUMN_ALIASES: [(&str, &[&str]); 6] = [
    ("train_id", &["train_id", "TrainID", "trainset_id", "train"]),
    ("dwell_time_seconds", &["dwell_time_seconds", "dwell_time", "DwellTime", "dwell_seconds"]),
    ("distance_km", &["distance_km", "distance", "Distance", "DistanceKm"]),
    ("load_factor", &["load_factor", "scheduled_load_factor", "LoadFactor"]),
    ("time_of_day", &["time_of_day", "hour", "TimeOfDay"]),
    ("delay_minutes", &["delay_minutes", "DelayMinutes", "delay"]),
];

/// Recorded schedule history for the fleet
#[derive(Debug, Clone, Default)]
pub struct ScheduleHistory {
    pub records: Vec<ScheduleRecord>,
}

/// Per-train averages over the recorded history
#[derive(Debug, Clone, PartialEq)]
pub struct TrainHistoryProfile {
    pub samples: usize,
    pub dwell_time_seconds: f64,
    pub distance_km: f64,
    pub load_factor: f64,
    pub time_of_day: f64,
    pub delay_minutes: f64,
}

impl ScheduleHistory {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let history = Self::from_reader(file)?;
        info!("Loaded {} schedule history records from {}", history.records.len(), path.display());
        Ok(history)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let index = resolve_columns(&headers)?;

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let raw = result?;
            let field = |column: &'static str| raw.get(index[column]).unwrap_or("");
            let number = |column: &'static str| -> Result<f64> {
                let value = field(column);
                match value.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(n),
                    _ => Err(FleetError::InvalidHistoryValue {
                        row: row + 1,
                        column,
                        value: value.to_string(),
                    }),
                }
            };
            records.push(ScheduleRecord {
                train_id: field("train_id").to_uppercase(),
                dwell_time_seconds: number("dwell_time_seconds")?,
                distance_km: number("distance_km")?,
                load_factor: number("load_factor")?,
                time_of_day: number("time_of_day")?,
                delay_minutes: number("delay_minutes")?,
            });
        }

        Ok(Self { records })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn profiles(&self) -> HashMap<String, TrainHistoryProfile> {
        let mut sums: HashMap<String, (usize, [f64; 5])> = HashMap::new();
        for r in &self.records {
            let entry = sums.entry(r.train_id.clone()).or_insert((0, [0.0; 5]));
            entry.0 += 1;
            entry.1[0] += r.dwell_time_seconds;
            entry.1[1] += r.distance_km;
            entry.1[2] += r.load_factor;
            entry.1[3] += r.time_of_day;
            entry.1[4] += r.delay_minutes;
        }

        sums.into_iter()
            .map(|(id, (n, s))| {
                let n_f = n as f64;
                (id, TrainHistoryProfile {
                    samples: n,
                    dwell_time_seconds: s[0] / n_f,
                    distance_km: s[1] / n_f,
                    load_factor: s[2] / n_f,
                    time_of_day: s[3] / n_f,
                    delay_minutes: s[4] / n_f,
                })
            })
            .collect()
    }
}

fn resolve_columns(headers: &[String]) -> Result<HashMap<&'static str, usize>> {
    let mut index = HashMap::new();
    let mut missing = Vec::new();

    for (canonical, aliases) in COLUMN_ALIASES.iter() {
        match headers.iter().position(|h| aliases.contains(&h.as_str())) {
            Some(pos) => {
                index.insert(*canonical, pos);
            }
            None => missing.push(*canonical),
        }
    }

    if !missing.is_empty() {
        return Err(FleetError::SchemaMismatch { missing, found: headers.to_vec() });
    }
    Ok(index)
}
