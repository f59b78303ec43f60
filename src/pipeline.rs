//! Batch orchestration: assignment, routing, environment, training.
//!
//! One [`DispatchPipeline::run`] call handles a static batch of orders:
//!
//! 1. solve the rider assignment (feasibility only if the cost source is down)
//! 2. route each rider's pickups and dropoffs (failures are recorded, not fatal)
//! 3. bucket per-rider costs into environment states
//! 4. train a fresh Q-learning agent on that environment
//! 5. report the assignment, routes, learned values, and a greedy action per rider

use std::collections::HashMap;

use tracing::{info, warn};

use crate::agent::{AgentConfig, QLearningAgent, TrainingReport};
use crate::cost::{AssignmentCost, ZeroCost};
use crate::environment::{DeliveryEnvironment, EnvironmentConfig, InitialStates, StateBuckets};
use crate::error::{AssignmentError, PipelineError};
use crate::model::Fleet;
use crate::osrm::format_duration;
use crate::q_table::QTable;
use crate::solver::{self, Assignment, RiderAssignment, SolveOptions};
use crate::traits::{Order, RouteProvider, RouteSummary};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fleet: Fleet,
    pub solve_options: SolveOptions,
    pub environment: EnvironmentConfig,
    pub agent: AgentConfig,
    pub episodes: usize,
    pub max_steps: usize,
    pub seed: u64,
    /// Sample initial states in proportion to how many riders fall in each bucket.
    pub weight_initial_states: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fleet: Fleet::uniform(20),
            solve_options: SolveOptions::default(),
            environment: EnvironmentConfig::default(),
            agent: AgentConfig::default(),
            episodes: 1000,
            max_steps: 100,
            seed: 42,
            weight_initial_states: false,
        }
    }
}

/// Routing result for one rider.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Routed {
        rider_id: String,
        summary: RouteSummary,
    },
    Unavailable { rider_id: String, reason: String },
}

impl RouteOutcome {
    pub fn rider_id(&self) -> &str {
        match self {
            RouteOutcome::Routed { rider_id, .. }
            | RouteOutcome::Unavailable { rider_id, .. } => rider_id,
        }
    }

    pub fn summary(&self) -> Option<&RouteSummary> {
        match self {
            RouteOutcome::Routed { summary, .. } => Some(summary),
            RouteOutcome::Unavailable { .. } => None,
        }
    }
}

/// Which per-rider signal the environment states were built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostSource {
    /// Route durations in seconds.
    RouteDuration,
    /// Number of orders per rider; used when no route was available.
    AssignmentLoad,
}

/// Learned state and greedy action for one rider.
#[derive(Debug, Clone, PartialEq)]
pub struct RiderRecommendation {
    pub rider_id: String,
    pub cost: f64,
    pub state: usize,
    pub action: usize,
}

#[derive(Debug, Clone)]
pub struct BatchReport<OrderId> {
    pub assignment: Assignment<OrderId>,
    pub routes: Vec<RouteOutcome>,
    pub cost_source: CostSource,
    /// Set when the assignment cost could not be computed and the batch was
    /// solved for feasibility alone.
    pub cost_fallback: Option<AssignmentError>,
    pub training: TrainingReport,
    pub q_values: QTable,
    pub recommendations: Vec<RiderRecommendation>,
}

impl<OrderId> BatchReport<OrderId> {
    pub fn unavailable_routes(&self) -> impl Iterator<Item = &RouteOutcome> {
        self.routes
            .iter()
            .filter(|outcome| matches!(outcome, RouteOutcome::Unavailable { .. }))
    }
}

pub struct DispatchPipeline<C, P> {
    config: PipelineConfig,
    cost: C,
    router: P,
}

impl<C, P> DispatchPipeline<C, P>
where
    P: RouteProvider,
{
    pub fn new(config: PipelineConfig, cost: C, router: P) -> Self {
        Self {
            config,
            cost,
            router,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run<O>(&self, orders: &[O]) -> Result<BatchReport<O::Id>, PipelineError>
    where
        O: Order,
        C: AssignmentCost<O>,
    {
        let (assignment, cost_fallback) = self.assign(orders)?;

        let by_id: HashMap<&O::Id, &O> = orders.iter().map(|order| (order.id(), order)).collect();
        let routes: Vec<RouteOutcome> = assignment
            .riders
            .iter()
            .map(|group| self.route_rider(group, &by_id))
            .collect();

        let (cost_source, costs) = rider_costs(&assignment, &routes);
        let env_config = &self.config.environment;
        let buckets = StateBuckets::from_costs(&costs, env_config.num_states)?;

        let mut env_config = env_config.clone();
        if self.config.weight_initial_states {
            let weights = buckets.occupancy().iter().map(|&count| count as f64);
            env_config.initial_states = InitialStates::Weighted(weights.collect());
        }
        let targets = buckets.targets(self.config.environment.num_actions);
        let env = DeliveryEnvironment::new(env_config, targets)?;

        let mut agent = QLearningAgent::new(
            self.config.environment.num_states,
            self.config.environment.num_actions,
            self.config.agent.clone(),
            self.config.seed,
        )?;
        let training = agent.train(&env, self.config.episodes, self.config.max_steps)?;
        let q_values = agent.into_table();

        let recommendations = assignment
            .riders
            .iter()
            .zip(&costs)
            .map(|(group, &cost)| {
                let state = buckets.state_for(cost);
                RiderRecommendation {
                    rider_id: group.rider.id.clone(),
                    cost,
                    state,
                    action: q_values.best_action(state),
                }
            })
            .collect();

        info!(
            riders = assignment.riders.len(),
            unrouted = routes.iter().filter(|r| r.summary().is_none()).count(),
            ?cost_source,
            cost_fallback = cost_fallback.is_some(),
            episodes = training.episodes.len(),
            "batch complete"
        );

        Ok(BatchReport {
            assignment,
            routes,
            cost_source,
            cost_fallback,
            training,
            q_values,
            recommendations,
        })
    }

    /// Solves with the configured cost, retrying with [`ZeroCost`] when that
    /// cost depends on a service that is down.
    fn assign<O>(
        &self,
        orders: &[O],
    ) -> Result<(Assignment<O::Id>, Option<AssignmentError>), AssignmentError>
    where
        O: Order,
        C: AssignmentCost<O>,
    {
        let fleet = &self.config.fleet;
        let options = &self.config.solve_options;
        match solver::solve(orders, fleet, &self.cost, options.clone()) {
            Err(err @ AssignmentError::CostUnavailable { .. }) => {
                warn!(error = %err, "assignment cost unavailable, solving for feasibility only");
                let assignment = solver::solve(orders, fleet, &ZeroCost, options.clone())?;
                Ok((assignment, Some(err)))
            }
            result => Ok((result?, None)),
        }
    }

    fn route_rider<O: Order>(
        &self,
        group: &RiderAssignment<O::Id>,
        by_id: &HashMap<&O::Id, &O>,
    ) -> RouteOutcome {
        let mut waypoints = Vec::with_capacity(group.order_ids.len() * 2 + 1);
        if let Some(start) = group.rider.start_location {
            waypoints.push(start);
        }
        for order_id in &group.order_ids {
            if let Some(order) = by_id.get(order_id) {
                waypoints.push(order.pickup());
                waypoints.push(order.dropoff());
            }
        }

        match self.router.route_for(&waypoints) {
            Ok(summary) => {
                info!(
                    rider = %group.rider.id,
                    duration = %format_duration(summary.duration_secs),
                    distance_m = summary.distance_m,
                    "rider route"
                );
                RouteOutcome::Routed {
                    rider_id: group.rider.id.clone(),
                    summary,
                }
            }
            Err(err) => {
                warn!(rider = %group.rider.id, error = %err, "no route available");
                RouteOutcome::Unavailable {
                    rider_id: group.rider.id.clone(),
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// One cost per assigned rider, in assignment order.
///
/// Riders without a route take the mean routed duration; with no routes at all
/// every rider falls back to its order count.
fn rider_costs<OrderId>(
    assignment: &Assignment<OrderId>,
    routes: &[RouteOutcome],
) -> (CostSource, Vec<f64>) {
    let durations: Vec<Option<f64>> = routes
        .iter()
        .map(|outcome| outcome.summary().map(|summary| summary.duration_secs))
        .collect();
    let routed: Vec<f64> = durations.iter().flatten().copied().collect();

    if routed.is_empty() {
        let loads = assignment
            .riders
            .iter()
            .map(|group| group.order_ids.len() as f64)
            .collect();
        return (CostSource::AssignmentLoad, loads);
    }

    let mean = routed.iter().sum::<f64>() / routed.len() as f64;
    let costs = durations.into_iter().map(|d| d.unwrap_or(mean)).collect();
    (CostSource::RouteDuration, costs)
}
