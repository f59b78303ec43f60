//! Core domain traits for the dispatch planner.
//!
//! These are intentionally minimal. Concrete apps can implement [`Order`] for
//! their own order records; routing backends implement the provider traits.

use std::hash::Hash;

use crate::error::RoutingError;

/// Unique identifier for planner entities.
pub trait Id: Clone + Eq + Hash {}

impl<T> Id for T where T: Clone + Eq + Hash {}

/// A delivery request to be assigned to a rider.
pub trait Order {
    type Id: Id;

    fn id(&self) -> &Self::Id;

    /// Pickup location (lat, lng).
    fn pickup(&self) -> (f64, f64);

    /// Dropoff location (lat, lng).
    fn dropoff(&self) -> (f64, f64);

    /// Order value or weight.
    fn weight(&self) -> f64;

    /// Latest acceptable delivery time (seconds from batch start), if any.
    fn time_constraint(&self) -> Option<i32> {
        None
    }
}

/// Provides a travel-time matrix (seconds) for a set of locations.
///
/// The matrix is indexed by the provided location order.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<Vec<Vec<i32>>, RoutingError>;
}

/// Provides route summaries for an ordered list of waypoints (lat, lng).
pub trait RouteProvider {
    fn route_for(&self, waypoints: &[(f64, f64)]) -> Result<RouteSummary, RoutingError>;
}

/// Summary of a single route returned by a [`RouteProvider`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteSummary {
    /// Total duration in seconds.
    pub duration_secs: f64,
    /// Total distance in meters.
    pub distance_m: f64,
    /// Legs between consecutive waypoints. May be empty.
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteLeg {
    pub steps: Vec<RouteStep>,
}

/// A single turn-by-turn step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteStep {
    pub instruction: String,
    pub name: String,
    pub distance_m: f64,
    pub duration_secs: f64,
}
