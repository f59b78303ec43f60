//! Capacitated order-to-rider assignment solver.
//!
//! The batch is formulated as a binary integer program:
//!
//! - `x[i,j] = 1` iff rider `i` serves order `j`
//! - coverage: `sum_i x[i,j] = 1` for every order `j`
//! - capacity: `sum_j x[i,j] <= capacity[i]` for every rider `i`
//! - objective: `min sum c[i,j] * x[i,j]`, with `c` supplied by an [`AssignmentCost`]
//!
//! [`AssignmentProblem`] owns the variables and constraints; a [`SolverBackend`]
//! turns it into a 0/1 vector. The default [`FlowBackend`] solves the program
//! exactly as a min-cost transportation flow (the constraint matrix is totally
//! unimodular, so the flow optimum is an integer optimum).
//!
//! Tie-breaking for [`FlowBackend`]: orders are inserted in input order and each
//! goes to the lowest-index rider among the cheapest reachable riders with spare
//! capacity. With [`crate::cost::ZeroCost`] riders are filled in index order.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cost::AssignmentCost;
use crate::error::AssignmentError;
use crate::model::{Fleet, RiderSpec};
use crate::traits::Order;

#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Wall-clock limit for the backend. None means unbounded.
    pub time_limit: Option<Duration>,
}

/// Binary decision variable `x[rider, order]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub rider: usize,
    pub order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Order is served by exactly one rider.
    Coverage { order: usize },
    /// Rider serves at most its capacity.
    Capacity { rider: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Equal,
    AtMost,
}

/// A linear constraint with unit coefficients over a set of variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub variables: Vec<usize>,
    pub sense: Sense,
    pub rhs: i64,
}

impl Constraint {
    fn is_satisfied(&self, solution: &[bool]) -> bool {
        let lhs = self.variables.iter().filter(|&&v| solution[v]).count() as i64;
        match self.sense {
            Sense::Equal => lhs == self.rhs,
            Sense::AtMost => lhs <= self.rhs,
        }
    }
}

/// The integer program for one batch.
#[derive(Debug, Clone)]
pub struct AssignmentProblem {
    num_riders: usize,
    num_orders: usize,
    capacities: Vec<u32>,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Vec<i64>,
}

impl AssignmentProblem {
    /// Builds variables, constraints, and objective coefficients.
    ///
    /// `costs` is indexed `[rider][order]`. The constraint structure does not
    /// depend on the costs.
    pub fn build(
        capacities: &[u32],
        num_orders: usize,
        costs: &[Vec<i64>],
    ) -> Result<Self, AssignmentError> {
        let num_riders = capacities.len();
        if costs.len() != num_riders || costs.iter().any(|row| row.len() != num_orders) {
            return Err(AssignmentError::InvalidInput(format!(
                "cost matrix must be {}x{}",
                num_riders, num_orders
            )));
        }

        let mut variables = Vec::with_capacity(num_riders * num_orders);
        let mut objective = Vec::with_capacity(num_riders * num_orders);
        for (rider, row) in costs.iter().enumerate() {
            for (order, &cost) in row.iter().enumerate() {
                variables.push(Variable { rider, order });
                objective.push(cost);
            }
        }

        let mut constraints = Vec::with_capacity(num_orders + num_riders);
        for order in 0..num_orders {
            let variables = (0..num_riders).map(|rider| rider * num_orders + order);
            constraints.push(Constraint {
                kind: ConstraintKind::Coverage { order },
                variables: variables.collect(),
                sense: Sense::Equal,
                rhs: 1,
            });
        }
        for (rider, &capacity) in capacities.iter().enumerate() {
            let variables = (0..num_orders).map(|order| rider * num_orders + order);
            constraints.push(Constraint {
                kind: ConstraintKind::Capacity { rider },
                variables: variables.collect(),
                sense: Sense::AtMost,
                rhs: i64::from(capacity),
            });
        }

        Ok(Self {
            num_riders,
            num_orders,
            capacities: capacities.to_vec(),
            variables,
            constraints,
            objective,
        })
    }

    pub fn num_riders(&self) -> usize {
        self.num_riders
    }

    pub fn num_orders(&self) -> usize {
        self.num_orders
    }

    pub fn capacities(&self) -> &[u32] {
        &self.capacities
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Index of `x[rider, order]` in the variable vector.
    pub fn variable_index(&self, rider: usize, order: usize) -> usize {
        rider * self.num_orders + order
    }

    /// Objective coefficient of `x[rider, order]`.
    pub fn cost(&self, rider: usize, order: usize) -> i64 {
        self.objective[self.variable_index(rider, order)]
    }

    /// True when `solution` has one entry per variable and meets every constraint.
    pub fn is_feasible(&self, solution: &[bool]) -> bool {
        solution.len() == self.variables.len()
            && self.constraints.iter().all(|c| c.is_satisfied(solution))
    }

    pub fn objective_value(&self, solution: &[bool]) -> i64 {
        solution
            .iter()
            .zip(&self.objective)
            .filter(|(selected, _)| **selected)
            .map(|(_, cost)| cost)
            .sum()
    }
}

/// Solves an [`AssignmentProblem`] to a 0/1 vector over its variables.
pub trait SolverBackend {
    fn solve(
        &self,
        problem: &AssignmentProblem,
        deadline: Option<Instant>,
    ) -> Result<Vec<bool>, AssignmentError>;
}

/// Exact min-cost flow backend (successive shortest augmenting paths).
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowBackend;

impl SolverBackend for FlowBackend {
    fn solve(
        &self,
        problem: &AssignmentProblem,
        deadline: Option<Instant>,
    ) -> Result<Vec<bool>, AssignmentError> {
        let riders = problem.num_riders();
        let orders = problem.num_orders();
        let started = Instant::now();

        let mut assigned: Vec<Option<usize>> = vec![None; orders];
        let mut load = vec![0u32; riders];

        for order in 0..orders {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(AssignmentError::Timeout {
                    elapsed: started.elapsed(),
                });
            }

            let paths = shortest_paths(problem, &assigned, order);

            let target = (0..riders)
                .filter(|&rider| load[rider] < problem.capacities()[rider])
                .filter_map(|rider| paths.rider_dist[rider].map(|dist| (dist, rider)))
                .min();

            let Some((_, target)) = target else {
                return Err(AssignmentError::InfeasibleAssignment {
                    orders,
                    capacity: problem.capacities().iter().map(|&c| c as usize).sum(),
                });
            };

            // Walk the augmenting path back to the new order, shifting each
            // displaced order onto the next rider.
            load[target] += 1;
            let mut rider = target;
            while let Some(moved) = paths.rider_parent[rider] {
                let previous = assigned[moved];
                assigned[moved] = Some(rider);
                match previous {
                    Some(previous) if moved != order => rider = previous,
                    _ => break,
                }
            }
        }

        let mut solution = vec![false; problem.variables().len()];
        for (order, rider) in assigned.iter().enumerate() {
            if let Some(rider) = rider {
                solution[problem.variable_index(*rider, order)] = true;
            }
        }
        Ok(solution)
    }
}

struct ShortestPaths {
    rider_dist: Vec<Option<i64>>,
    rider_parent: Vec<Option<usize>>,
}

/// Bellman-Ford over the residual graph rooted at `source` (an unassigned order).
///
/// Forward arcs order -> rider cost `c[i,j]`; backward arcs rider -> assigned
/// order cost `-c[i,j]`. Strict improvement keeps the lowest-index parent.
fn shortest_paths(
    problem: &AssignmentProblem,
    assigned: &[Option<usize>],
    source: usize,
) -> ShortestPaths {
    let riders = problem.num_riders();
    let orders = problem.num_orders();

    let mut order_dist: Vec<Option<i64>> = vec![None; orders];
    let mut rider_dist: Vec<Option<i64>> = vec![None; riders];
    let mut rider_parent: Vec<Option<usize>> = vec![None; riders];
    order_dist[source] = Some(0);

    for _ in 0..=(riders + orders) {
        let mut changed = false;

        let reached = order_dist
            .iter()
            .enumerate()
            .filter_map(|(order, dist)| dist.map(|dist| (order, dist)));
        for (order, dist) in reached {
            for rider in 0..riders {
                if assigned[order] == Some(rider) {
                    continue;
                }
                let candidate = dist + problem.cost(rider, order);
                if rider_dist[rider].is_none_or(|current| candidate < current) {
                    rider_dist[rider] = Some(candidate);
                    rider_parent[rider] = Some(order);
                    changed = true;
                }
            }
        }

        let placed = assigned
            .iter()
            .enumerate()
            .filter_map(|(order, rider)| rider.map(|rider| (order, rider)));
        for (order, rider) in placed {
            if let Some(dist) = rider_dist[rider] {
                let candidate = dist - problem.cost(rider, order);
                if order_dist[order].is_none_or(|current| candidate < current) {
                    order_dist[order] = Some(candidate);
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    ShortestPaths {
        rider_dist,
        rider_parent,
    }
}

/// Orders served by one rider.
#[derive(Debug, Clone, PartialEq)]
pub struct RiderAssignment<OrderId> {
    pub rider: RiderSpec,
    /// Assigned orders, in input order.
    pub order_ids: Vec<OrderId>,
    /// Objective contribution of this rider.
    pub cost: i64,
}

/// Rider to orders mapping. Riders with no orders are omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<OrderId> {
    pub riders: Vec<RiderAssignment<OrderId>>,
    pub total_cost: i64,
}

impl<OrderId: PartialEq> Assignment<OrderId> {
    /// Orders assigned to the rider with the given label.
    pub fn orders_for(&self, rider_id: &str) -> Option<&[OrderId]> {
        self.riders
            .iter()
            .find(|r| r.rider.id == rider_id)
            .map(|r| r.order_ids.as_slice())
    }

    /// Label of the rider serving `order_id`.
    pub fn rider_of(&self, order_id: &OrderId) -> Option<&str> {
        self.riders
            .iter()
            .find(|r| r.order_ids.contains(order_id))
            .map(|r| r.rider.id.as_str())
    }

    pub fn order_count(&self) -> usize {
        self.riders.iter().map(|r| r.order_ids.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[OrderId])> {
        self.riders
            .iter()
            .map(|r| (r.rider.id.as_str(), r.order_ids.as_slice()))
    }
}

/// Assigns every order to exactly one rider using the default [`FlowBackend`].
pub fn solve<O, C>(
    orders: &[O],
    fleet: &Fleet,
    cost: &C,
    options: SolveOptions,
) -> Result<Assignment<O::Id>, AssignmentError>
where
    O: Order,
    C: AssignmentCost<O>,
{
    solve_with(orders, fleet, cost, &FlowBackend, options)
}

/// Assigns every order to exactly one rider using the given backend.
pub fn solve_with<O, C, B>(
    orders: &[O],
    fleet: &Fleet,
    cost: &C,
    backend: &B,
    options: SolveOptions,
) -> Result<Assignment<O::Id>, AssignmentError>
where
    O: Order,
    C: AssignmentCost<O>,
    B: SolverBackend,
{
    if orders.is_empty() {
        return Err(AssignmentError::InvalidInput("order list is empty".to_string()));
    }
    if let Fleet::Uniform { capacity: 0, .. } = fleet {
        return Err(AssignmentError::InvalidInput("rider capacity must be positive".to_string()));
    }

    let riders = fleet.riders_for(orders.len());
    validate_riders(&riders)?;
    validate_orders(orders)?;

    let total_capacity: usize = riders.iter().map(|r| r.capacity as usize).sum();
    if total_capacity < orders.len() {
        return Err(AssignmentError::InfeasibleAssignment {
            orders: orders.len(),
            capacity: total_capacity,
        });
    }

    let costs = cost.cost_matrix(&riders, orders)?;
    let capacities: Vec<u32> = riders.iter().map(|r| r.capacity).collect();
    let problem = AssignmentProblem::build(&capacities, orders.len(), &costs)?;
    debug!(
        variables = problem.variables().len(),
        constraints = problem.constraints().len(),
        "built assignment problem"
    );

    let deadline = options.time_limit.map(|limit| Instant::now() + limit);
    let solution = backend.solve(&problem, deadline)?;
    if !problem.is_feasible(&solution) {
        return Err(AssignmentError::InfeasibleAssignment {
            orders: orders.len(),
            capacity: total_capacity,
        });
    }

    let mut result = Vec::new();
    for (rider_index, rider) in riders.into_iter().enumerate() {
        let served: Vec<usize> = (0..orders.len())
            .filter(|&order| solution[problem.variable_index(rider_index, order)])
            .collect();
        if served.is_empty() {
            continue;
        }
        let cost = served.iter().map(|&o| problem.cost(rider_index, o)).sum();
        let order_ids = served.iter().map(|&o| orders[o].id().clone()).collect();
        result.push(RiderAssignment {
            rider,
            order_ids,
            cost,
        });
    }

    let total_cost = problem.objective_value(&solution);
    info!(
        orders = orders.len(),
        riders_used = result.len(),
        total_cost,
        "solved rider assignment"
    );

    Ok(Assignment {
        riders: result,
        total_cost,
    })
}

/// Rejects zero capacities and duplicate ids. An empty fleet passes here and is
/// reported as infeasible by the capacity check.
fn validate_riders(riders: &[RiderSpec]) -> Result<(), AssignmentError> {
    let mut seen = HashSet::new();
    for rider in riders {
        if rider.capacity == 0 {
            return Err(AssignmentError::InvalidInput(format!(
                "rider {} has non-positive capacity",
                rider.id
            )));
        }
        if !seen.insert(rider.id.as_str()) {
            return Err(AssignmentError::InvalidInput(format!(
                "duplicate rider id {}",
                rider.id
            )));
        }
    }
    Ok(())
}

fn validate_orders<O: Order>(orders: &[O]) -> Result<(), AssignmentError> {
    let mut seen = HashSet::new();
    for (index, order) in orders.iter().enumerate() {
        if !seen.insert(order.id()) {
            return Err(AssignmentError::InvalidInput(format!(
                "duplicate order id at position {}",
                index
            )));
        }
    }
    Ok(())
}
