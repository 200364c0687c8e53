//! Fleet roster and network constants for the Kochi Metro (KMRL) fleet

use serde::Serialize;
use std::collections::HashSet;

use crate::error::{FleetError, Result};

/// The 25 trainsets in revenue rotation, in roster order
pub const KMRL_TRAINSETS: [&str; 25] = [
    "KRISHNA", "TAPTI", "NILA", "SARAYU", "ARUTH",
    "VAIGAI", "JHANAVI", "DHWANIL", "BHAVANI", "PADMA",
    "MANDAKINI", "YAMUNA", "PERIYAR", "KABANI", "VAAYU",
    "KAVERI", "SHIRIYA", "PAMPA", "NARMADA", "MAHE",
    "MAARUT", "SABARMATHI", "GODHAVARI", "GANGA", "PAVAN",
];

/// Route names handed to the scheduling solver
pub const SCHEDULE_ROUTES: [&str; 3] = ["Red Line", "Blue Line", "Green Line"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedRestriction {
    pub location_km: f64,
    pub max_speed: u32,
}

/// Static track geometry of one line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteGeometry {
    pub route_id: &'static str,
    pub line: &'static str,
    pub route_name: &'static str,
    pub total_distance_km: f64,
    pub stations: &'static [&'static str],
    /// Metres above datum at each station, in station order
    pub elevation_profile: &'static [f64],
    pub curve_count: u32,
    /// Percent
    pub gradient_max: f64,
    pub speed_restrictions: &'static [SpeedRestriction],
}

impl RouteGeometry {
    /// Station nearest to a chainage, assuming evenly spaced stations.
    pub fn station_near(&self, location_km: f64) -> &'static str {
        let Some(last) = self.stations.len().checked_sub(1) else {
            return self.route_name;
        };
        let share = (location_km / self.total_distance_km).clamp(0.0, 1.0);
        self.stations[(share * last as f64).round() as usize]
    }
}

pub const KMRL_ROUTES: [RouteGeometry; 3] = [
    RouteGeometry {
        route_id: "RED_LINE",
        line: "Red Line",
        route_name: "Aluva - Maharaja College",
        total_distance_km: 25.6,
        stations: &["Aluva", "Kalamassery", "Cusat", "Pathadippalam", "Edapally"],
        elevation_profile: &[12.3, 8.7, 15.2, 18.9, 22.1],
        curve_count: 23,
        gradient_max: 3.2,
        speed_restrictions: &[SpeedRestriction { location_km: 5.2, max_speed: 45 }],
    },
    RouteGeometry {
        route_id: "BLUE_LINE",
        line: "Blue Line",
        route_name: "Maharaja College - Tripunithura",
        total_distance_km: 10.1,
        stations: &["Maharaja College", "Ernakulam South", "Kadavanthra", "Vyttila", "Petta", "Tripunithura"],
        elevation_profile: &[4.2, 3.8, 5.1, 6.4, 5.9, 7.3],
        curve_count: 14,
        gradient_max: 2.8,
        speed_restrictions: &[
            SpeedRestriction { location_km: 2.9, max_speed: 50 },
            SpeedRestriction { location_km: 7.6, max_speed: 35 },
        ],
    },
    RouteGeometry {
        route_id: "GREEN_LINE",
        line: "Green Line",
        route_name: "JLN Stadium - Infopark",
        total_distance_km: 11.2,
        stations: &["JLN Stadium", "Palarivattom", "Chembumukku", "Vazhakkala", "Kakkanad", "Infopark"],
        elevation_profile: &[9.8, 11.4, 14.0, 19.6, 24.3, 27.5],
        curve_count: 17,
        gradient_max: 4.1,
        speed_restrictions: &[SpeedRestriction { location_km: 8.3, max_speed: 30 }],
    },
];

/// Look a line up by id (`RED_LINE`) or display name (`Red Line`).
pub fn route_geometry(name: &str) -> Option<&'static RouteGeometry> {
    KMRL_ROUTES
        .iter()
        .find(|r| r.route_id.eq_ignore_ascii_case(name) || r.line.eq_ignore_ascii_case(name))
}

/// Depot where maintenance windows are booked
pub const MAINTENANCE_DEPOT: &str = "Muttom";

/// Minimum trains in service when the request does not say otherwise
pub const DEFAULT_MIN_SERVICE: usize = 13;

pub fn default_roster() -> Vec<String> {
    KMRL_TRAINSETS.iter().map(|s| s.to_string()).collect()
}

pub fn default_routes() -> Vec<String> {
    SCHEDULE_ROUTES.iter().map(|s| s.to_string()).collect()
}

/// Reject rosters that would break per-run identity of train records.
pub fn validate_roster(roster: &[String]) -> Result<()> {
    if roster.is_empty() {
        return Err(FleetError::EmptyRoster);
    }
    let mut seen = HashSet::with_capacity(roster.len());
    for id in roster {
        if !seen.insert(id.as_str()) {
            return Err(FleetError::DuplicateTrain(id.clone()));
        }
    }
    Ok(())
}

/// Parse a comma-separated roster such as `KRISHNA,TAPTI,NILA`.
pub fn parse_roster(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
