//! Cost strategies for the assignment objective.
//!
//! The solver always builds the same coverage and capacity constraints; only
//! the objective coefficients come from an [`AssignmentCost`].

use std::collections::HashMap;

use crate::error::AssignmentError;
use crate::model::RiderSpec;
use crate::traits::{DistanceMatrixProvider, Order};

/// Produces the objective coefficient for every (rider, order) pair.
///
/// The returned matrix is indexed `[rider][order]` in input order.
pub trait AssignmentCost<O: Order> {
    fn cost_matrix(
        &self,
        riders: &[RiderSpec],
        orders: &[O],
    ) -> Result<Vec<Vec<i64>>, AssignmentError>;
}

/// Pure feasibility: every assignment costs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCost;

impl<O: Order> AssignmentCost<O> for ZeroCost {
    fn cost_matrix(
        &self,
        riders: &[RiderSpec],
        orders: &[O],
    ) -> Result<Vec<Vec<i64>>, AssignmentError> {
        Ok(vec![vec![0; orders.len()]; riders.len()])
    }
}

/// Cost given by a closure over each (rider, order) pair.
pub struct FnCost<F>(pub F);

impl<O, F> AssignmentCost<O> for FnCost<F>
where
    O: Order,
    F: Fn(&RiderSpec, &O) -> i64,
{
    fn cost_matrix(
        &self,
        riders: &[RiderSpec],
        orders: &[O],
    ) -> Result<Vec<Vec<i64>>, AssignmentError> {
        Ok(riders
            .iter()
            .map(|rider| orders.iter().map(|order| (self.0)(rider, order)).collect())
            .collect())
    }
}

/// Estimated travel time: rider start to pickup, then pickup to dropoff.
///
/// Riders without a start location only pay the pickup-to-dropoff leg. A
/// provider outage surfaces as [`AssignmentError::CostUnavailable`].
#[derive(Debug, Clone)]
pub struct TravelCost<M> {
    provider: M,
}

impl<M: DistanceMatrixProvider> TravelCost<M> {
    pub fn new(provider: M) -> Self {
        Self { provider }
    }
}

impl<O, M> AssignmentCost<O> for TravelCost<M>
where
    O: Order,
    M: DistanceMatrixProvider,
{
    fn cost_matrix(
        &self,
        riders: &[RiderSpec],
        orders: &[O],
    ) -> Result<Vec<Vec<i64>>, AssignmentError> {
        let locations = collect_locations(riders, orders);
        let matrix = self.provider.matrix_for(&locations)?;

        let n = locations.len();
        if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
            return Err(AssignmentError::CostUnavailable {
                call: "table",
                reason: format!("expected {n}x{n} travel times, got {} rows", matrix.len()),
            });
        }

        let times = TravelTimes {
            index: location_index(&locations),
            matrix,
        };
        let costs = riders
            .iter()
            .map(|rider| {
                orders
                    .iter()
                    .map(|order| times.order_cost(rider, order))
                    .collect()
            })
            .collect();

        Ok(costs)
    }
}

struct TravelTimes {
    matrix: Vec<Vec<i32>>,
    index: HashMap<String, usize>,
}

impl TravelTimes {
    fn between(&self, from: (f64, f64), to: (f64, f64)) -> i64 {
        let from = self.index.get(&location_key(from));
        let to = self.index.get(&location_key(to));
        match (from, to) {
            (Some(&from), Some(&to)) => i64::from(self.matrix[from][to]),
            _ => 0,
        }
    }

    fn order_cost<O: Order>(&self, rider: &RiderSpec, order: &O) -> i64 {
        let approach = rider
            .start_location
            .map_or(0, |start| self.between(start, order.pickup()));
        approach + self.between(order.pickup(), order.dropoff())
    }
}

fn collect_locations<O: Order>(riders: &[RiderSpec], orders: &[O]) -> Vec<(f64, f64)> {
    let mut locations = Vec::new();
    for rider in riders {
        if let Some(start) = rider.start_location {
            locations.push(start);
        }
    }
    for order in orders {
        locations.push(order.pickup());
        locations.push(order.dropoff());
    }

    dedupe_locations(locations)
}

fn dedupe_locations(locations: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::new();
    for location in locations {
        let key = location_key(location);
        if seen.contains_key(&key) {
            continue;
        }
        seen.insert(key, unique.len());
        unique.push(location);
    }
    unique
}

fn location_key(location: (f64, f64)) -> String {
    format!("{:.6},{:.6}", location.0, location.1)
}

fn location_index(locations: &[(f64, f64)]) -> HashMap<String, usize> {
    locations
        .iter()
        .enumerate()
        .map(|(i, location)| (location_key(*location), i))
        .collect()
}
