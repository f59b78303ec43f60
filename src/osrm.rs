//! OSRM HTTP adapter for routes and travel-time matrices.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RoutingError;
use crate::traits::{DistanceMatrixProvider, RouteLeg, RouteProvider, RouteStep, RouteSummary};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    /// Request turn-by-turn steps from the route endpoint.
    pub steps: bool,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
            steps: false,
        }
    }
}

impl OsrmConfig {
    /// Defaults overlaid with `OSRM_BASE_URL`, `OSRM_PROFILE`, and `OSRM_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("OSRM_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(profile) = std::env::var("OSRM_PROFILE") {
            config.profile = profile;
        }
        if let Some(timeout) = std::env::var("OSRM_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.timeout_secs = timeout;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    /// URL for the route endpoint. OSRM expects `lng,lat` pairs.
    pub fn route_url(&self, waypoints: &[(f64, f64)]) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=false&steps={}",
            self.config.base_url,
            self.config.profile,
            format_coordinates(waypoints),
            self.config.steps
        )
    }

    pub fn table_url(&self, locations: &[(f64, f64)]) -> String {
        format!(
            "{}/table/v1/{}/{}?annotations=duration",
            self.config.base_url,
            self.config.profile,
            format_coordinates(locations)
        )
    }
}

impl RouteProvider for OsrmClient {
    fn route_for(&self, waypoints: &[(f64, f64)]) -> Result<RouteSummary, RoutingError> {
        validate_waypoints(waypoints)?;

        let url = self.route_url(waypoints);
        debug!(%url, waypoints = waypoints.len(), "requesting OSRM route");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| RoutingError::Request {
                call: "route",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "OSRM route request rejected");
            return Err(RoutingError::Status {
                call: "route",
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<OsrmRouteResponse>()
            .map_err(|err| RoutingError::MalformedResponse {
                call: "route",
                reason: err.to_string(),
            })?;

        summarize_route(body)
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<Vec<Vec<i32>>, RoutingError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.table_url(locations);
        debug!(%url, locations = locations.len(), "requesting OSRM table");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| RoutingError::Request {
                call: "table",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "OSRM table request rejected");
            return Err(RoutingError::Status {
                call: "table",
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<OsrmTableResponse>()
            .map_err(|err| RoutingError::MalformedResponse {
                call: "table",
                reason: err.to_string(),
            })?;

        summarize_table(body, locations.len())
    }
}

/// Formats seconds as `"{h}h {m}m {s}s"`.
pub fn format_duration(duration_secs: f64) -> String {
    let total = duration_secs.max(0.0) as u64;
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    format!("{}h {}m {}s", hours, minutes, seconds)
}

fn format_coordinates(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
        .collect::<Vec<_>>()
        .join(";")
}

fn validate_waypoints(waypoints: &[(f64, f64)]) -> Result<(), RoutingError> {
    if waypoints.len() < 2 {
        return Err(RoutingError::InvalidInput(format!(
            "route needs at least 2 waypoints, got {}",
            waypoints.len()
        )));
    }
    if let Some(index) = waypoints.iter().position(|p| !is_valid_coordinate(p)) {
        return Err(RoutingError::InvalidInput(format!(
            "waypoint {} is not a valid coordinate",
            index
        )));
    }
    Ok(())
}

fn is_valid_coordinate(&(lat, lng): &(f64, f64)) -> bool {
    lat.is_finite() && lng.is_finite() && lat.abs() <= 90.0 && lng.abs() <= 180.0
}

/// Converts a decoded OSRM route response into a [`RouteSummary`].
///
/// Only the first route is used.
pub(crate) fn summarize_route(body: OsrmRouteResponse) -> Result<RouteSummary, RoutingError> {
    if let Some(code) = body.code.as_deref() {
        if code != "Ok" {
            return Err(RoutingError::MalformedResponse {
                call: "route",
                reason: format!("OSRM code {}", code),
            });
        }
    }

    let route = body
        .routes
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or(RoutingError::NoRoute { call: "route" })?;

    let (Some(duration_secs), Some(distance_m)) = (route.duration, route.distance) else {
        return Err(RoutingError::MalformedResponse {
            call: "route",
            reason: "missing duration or distance".to_string(),
        });
    };

    let legs = route
        .legs
        .into_iter()
        .map(|leg| RouteLeg {
            steps: leg
                .steps
                .into_iter()
                .map(|step| RouteStep {
                    instruction: step
                        .maneuver
                        .and_then(|m| m.instruction.or(m.kind))
                        .unwrap_or_else(|| "No instruction available".to_string()),
                    name: step.name.unwrap_or_default(),
                    distance_m: step.distance.unwrap_or_default(),
                    duration_secs: step.duration.unwrap_or_default(),
                })
                .collect(),
        })
        .collect();

    Ok(RouteSummary {
        duration_secs,
        distance_m,
        legs,
    })
}

/// Converts a decoded OSRM table response into a `size x size` matrix.
///
/// Unreachable pairs (`null`) become `i32::MAX`.
pub(crate) fn summarize_table(
    body: OsrmTableResponse,
    size: usize,
) -> Result<Vec<Vec<i32>>, RoutingError> {
    if let Some(code) = body.code.as_deref() {
        if code != "Ok" {
            return Err(RoutingError::MalformedResponse {
                call: "table",
                reason: format!("OSRM code {}", code),
            });
        }
    }

    let Some(durations) = body.durations else {
        return Err(RoutingError::MalformedResponse {
            call: "table",
            reason: "missing durations".to_string(),
        });
    };
    if durations.len() != size || durations.iter().any(|row| row.len() != size) {
        return Err(RoutingError::MalformedResponse {
            call: "table",
            reason: format!("expected {size}x{size} durations"),
        });
    }

    Ok(durations
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|value| value.map_or(i32::MAX, |v| v.round() as i32))
                .collect()
        })
        .collect())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmRouteResponse {
    code: Option<String>,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    duration: Option<f64>,
    distance: Option<f64>,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: Option<f64>,
    duration: Option<f64>,
    name: Option<String>,
    maneuver: Option<OsrmManeuver>,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    instruction: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OsrmTableResponse {
    code: Option<String>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}
