use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational features of one trainset for a single optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainFeatureRecord {
    pub train_id: String,
    pub dwell_time_seconds: u32,
    pub distance_km: f64,
    pub scheduled_load_factor: f64,
    pub time_of_day: u8,
    pub passenger_density: f64,
    pub route_complexity: f64,
    pub baseline_delay_minutes: f64,
    pub mileage_km: u32,
    pub last_maintenance_days: u32,
    pub certificate_valid: bool,
    pub critical_jobs_open: u32,
    pub energy_efficiency_baseline: f64,
}

impl TrainFeatureRecord {
    pub fn has_open_critical_jobs(&self) -> bool {
        self.critical_jobs_open > 0
    }

    /// History row equivalent, used to train the delay model when no
    /// recorded schedule history is available.
    pub fn to_schedule_record(&self) -> ScheduleRecord {
        ScheduleRecord {
            train_id: self.train_id.clone(),
            dwell_time_seconds: self.dwell_time_seconds as f64,
            distance_km: self.distance_km,
            load_factor: self.scheduled_load_factor,
            time_of_day: self.time_of_day as f64,
            delay_minutes: self.baseline_delay_minutes,
        }
    }
}

/// One row of recorded schedule history in canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub train_id: String,
    pub dwell_time_seconds: f64,
    pub distance_km: f64,
    pub load_factor: f64,
    pub time_of_day: f64,
    pub delay_minutes: f64,
}

/// Maintenance recommendation from the readiness model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceAction {
    Normal,
    Monitor,
    #[serde(rename = "Schedule Maintenance")]
    ScheduleMaintenance,
}

impl MaintenanceAction {
    pub const ALL: [MaintenanceAction; 3] = [
        MaintenanceAction::Normal,
        MaintenanceAction::Monitor,
        MaintenanceAction::ScheduleMaintenance,
    ];

    /// Accepts "Schedule Maintenance", "schedule_maintenance", "ScheduleMaintenance", ...
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "normal" => Some(MaintenanceAction::Normal),
            "monitor" => Some(MaintenanceAction::Monitor),
            "schedulemaintenance" => Some(MaintenanceAction::ScheduleMaintenance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceAction::Normal => "Normal",
            MaintenanceAction::Monitor => "Monitor",
            MaintenanceAction::ScheduleMaintenance => "Schedule Maintenance",
        }
    }
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Final assignment of a trainset after reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    Service,
    Standby,
    Maintenance,
}

impl OperationalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalStatus::Service => "service",
            OperationalStatus::Standby => "standby",
            OperationalStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Resolved constraints for an optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub min_service: usize,
}

impl Default for Constraints {
    fn default() -> Self {
        Self { min_service: crate::fleet::DEFAULT_MIN_SERVICE }
    }
}

/// Constraints as a client sends them. Absent fields take the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ConstraintsRequest {
    #[serde(default)]
    pub min_service: Option<usize>,
}

impl ConstraintsRequest {
    pub fn resolve(self, default_min_service: usize) -> Constraints {
        Constraints { min_service: self.min_service.unwrap_or(default_min_service) }
    }
}

/// A trainset with delay and readiness estimates attached, before any
/// status has been assigned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTrain {
    #[serde(flatten)]
    pub features: TrainFeatureRecord,
    pub predicted_delay_minutes: f64,
    pub delay_improvement: f64,
    pub ai_readiness_score: f64,
    pub maintenance_recommendation: MaintenanceAction,
}

/// A trainset after reconciliation; every record carries exactly one status
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRecord {
    pub scored: ScoredTrain,
    pub final_operational_status: OperationalStatus,
}

impl TrainRecord {
    pub fn train_id(&self) -> &str {
        &self.scored.features.train_id
    }

    pub fn features(&self) -> &TrainFeatureRecord {
        &self.scored.features
    }

    pub fn readiness(&self) -> f64 {
        self.scored.ai_readiness_score
    }

    pub fn is_in(&self, status: OperationalStatus) -> bool {
        self.final_operational_status == status
    }
}

/// Flat per-train row written to the results CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResultRow {
    pub train_id: String,
    pub dwell_time_seconds: u32,
    pub distance_km: f64,
    pub scheduled_load_factor: f64,
    pub time_of_day: u8,
    pub passenger_density: f64,
    pub route_complexity: f64,
    pub baseline_delay_minutes: f64,
    pub mileage_km: u32,
    pub last_maintenance_days: u32,
    pub certificate_valid: bool,
    pub critical_jobs_open: u32,
    pub energy_efficiency_baseline: f64,
    pub predicted_delay_minutes: f64,
    pub delay_improvement: f64,
    pub ai_readiness_score: f64,
    pub maintenance_recommendation: MaintenanceAction,
    pub final_operational_status: OperationalStatus,
}

impl From<&TrainRecord> for TrainResultRow {
    fn from(r: &TrainRecord) -> Self {
        let s = &r.scored;
        let f = &s.features;
        Self {
            train_id: f.train_id.clone(),
            dwell_time_seconds: f.dwell_time_seconds,
            distance_km: f.distance_km,
            scheduled_load_factor: f.scheduled_load_factor,
            time_of_day: f.time_of_day,
            passenger_density: f.passenger_density,
            route_complexity: f.route_complexity,
            baseline_delay_minutes: f.baseline_delay_minutes,
            mileage_km: f.mileage_km,
            last_maintenance_days: f.last_maintenance_days,
            certificate_valid: f.certificate_valid,
            critical_jobs_open: f.critical_jobs_open,
            energy_efficiency_baseline: f.energy_efficiency_baseline,
            predicted_delay_minutes: s.predicted_delay_minutes,
            delay_improvement: s.delay_improvement,
            ai_readiness_score: s.ai_readiness_score,
            maintenance_recommendation: s.maintenance_recommendation,
            final_operational_status: r.final_operational_status,
        }
    }
}
