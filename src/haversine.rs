//! Haversine routing fallback (when OSRM is unavailable).
//!
//! Uses great-circle distance and an assumed speed for both travel-time
//! matrices and route summaries. Ignores the road network but never fails on
//! valid coordinates.

use crate::error::RoutingError;
use crate::traits::{DistanceMatrixProvider, RouteLeg, RouteProvider, RouteSummary};

/// Average rider speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 25.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone)]
pub struct HaversineRouter {
    /// Assumed average speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineRouter {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineRouter {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance between two points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn km_to_seconds(&self, km: f64) -> f64 {
        km / self.speed_kmh * 3600.0
    }
}

impl DistanceMatrixProvider for HaversineRouter {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<Vec<Vec<i32>>, RoutingError> {
        let n = locations.len();
        let mut matrix = vec![vec![0; n]; n];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    let km = Self::haversine_km(*from, *to);
                    matrix[i][j] = self.km_to_seconds(km).round() as i32;
                }
            }
        }

        Ok(matrix)
    }
}

impl RouteProvider for HaversineRouter {
    fn route_for(&self, waypoints: &[(f64, f64)]) -> Result<RouteSummary, RoutingError> {
        if waypoints.len() < 2 {
            return Err(RoutingError::InvalidInput(format!(
                "route needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh <= 0.0 {
            return Err(RoutingError::InvalidInput(format!(
                "speed {} km/h is not positive",
                self.speed_kmh
            )));
        }

        let km: f64 = waypoints
            .windows(2)
            .map(|pair| Self::haversine_km(pair[0], pair[1]))
            .sum();
        if !km.is_finite() {
            return Err(RoutingError::InvalidInput(
                "waypoints contain invalid coordinates".to_string(),
            ));
        }

        Ok(RouteSummary {
            duration_secs: self.km_to_seconds(km),
            distance_m: km * 1000.0,
            legs: vec![RouteLeg::default(); waypoints.len() - 1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = HaversineRouter::haversine_km((26.85, 80.95), (26.85, 80.95));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Lucknow (26.85, 80.95) to Kanpur (26.45, 80.33), roughly 77 km
        let dist = HaversineRouter::haversine_km((26.85, 80.95), (26.45, 80.33));
        assert!(
            dist > 70.0 && dist < 85.0,
            "Lucknow to Kanpur should be ~77km, got {}",
            dist
        );
    }

    #[test]
    fn test_matrix_diagonal_is_zero_and_symmetric() {
        let provider = HaversineRouter::default();
        let locations = vec![(26.85, 80.95), (26.88, 81.0), (26.9, 81.05)];
        let matrix = provider.matrix_for(&locations).unwrap();

        for i in 0..locations.len() {
            assert_eq!(matrix[i][i], 0, "Diagonal should be zero");
        }
        assert_eq!(matrix[0][1], matrix[1][0], "Matrix should be symmetric");
    }

    #[test]
    fn test_reasonable_travel_time() {
        let provider = HaversineRouter::new(40.0);
        // 10 km at 40 km/h = 0.25 hours = 900 seconds
        assert_eq!(provider.km_to_seconds(10.0), 900.0);
    }

    #[test]
    fn test_route_sums_legs() {
        let router = HaversineRouter::new(36.0);
        let waypoints = [(26.85, 80.95), (26.88, 81.0), (26.9, 81.05)];
        let route = router.route_for(&waypoints).unwrap();

        let expected_km = HaversineRouter::haversine_km(waypoints[0], waypoints[1])
            + HaversineRouter::haversine_km(waypoints[1], waypoints[2]);
        assert!((route.distance_m - expected_km * 1000.0).abs() < 1e-6);
        // 36 km/h = 10 m/s
        assert!((route.duration_secs - route.distance_m / 10.0).abs() < 1e-6);
        assert_eq!(route.legs.len(), 2);
    }

    #[test]
    fn test_route_rejects_single_waypoint() {
        let result = HaversineRouter::default().route_for(&[(26.85, 80.95)]);
        assert!(matches!(result, Err(RoutingError::InvalidInput(_))));
    }
}
