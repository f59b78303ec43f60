//! Batch pipeline tests
//!
//! End-to-end runs with in-process routers: assignment, routing fallbacks,
//! environment construction, and per-rider recommendations.

mod fixtures;

use dispatch_rl::agent::AgentConfig;
use dispatch_rl::cost::{TravelCost, ZeroCost};
use dispatch_rl::environment::EnvironmentConfig;
use dispatch_rl::error::{AssignmentError, PipelineError, RoutingError};
use dispatch_rl::haversine::HaversineRouter;
use dispatch_rl::model::{Fleet, RiderSpec};
use dispatch_rl::pipeline::{CostSource, DispatchPipeline, PipelineConfig, RouteOutcome};
use dispatch_rl::traits::{DistanceMatrixProvider, RouteProvider, RouteSummary};

use fixtures::order_batch;

// ============================================================================
// Test Fixtures
// ============================================================================

/// One minute per waypoint; fails for routes with exactly `fail_on` waypoints.
struct CountingRouter {
    fail_on: Option<usize>,
}

impl CountingRouter {
    fn new() -> Self {
        Self { fail_on: None }
    }

    fn failing_on(waypoints: usize) -> Self {
        Self {
            fail_on: Some(waypoints),
        }
    }
}

impl RouteProvider for CountingRouter {
    fn route_for(&self, waypoints: &[(f64, f64)]) -> Result<RouteSummary, RoutingError> {
        if self.fail_on == Some(waypoints.len()) {
            return Err(RoutingError::NoRoute { call: "route" });
        }
        Ok(RouteSummary {
            duration_secs: waypoints.len() as f64 * 60.0,
            distance_m: waypoints.len() as f64 * 500.0,
            legs: Vec::new(),
        })
    }
}

struct OfflineRouter;

impl RouteProvider for OfflineRouter {
    fn route_for(&self, _waypoints: &[(f64, f64)]) -> Result<RouteSummary, RoutingError> {
        Err(RoutingError::Status {
            call: "route",
            status: 503,
        })
    }
}

/// Distance matrix service that is down.
struct OfflineMatrix;

impl DistanceMatrixProvider for OfflineMatrix {
    fn matrix_for(&self, _locations: &[(f64, f64)]) -> Result<Vec<Vec<i32>>, RoutingError> {
        Err(RoutingError::Status {
            call: "table",
            status: 503,
        })
    }
}

fn small_config() -> PipelineConfig {
    PipelineConfig {
        fleet: Fleet::uniform(10),
        environment: EnvironmentConfig {
            num_states: 4,
            num_actions: 3,
            termination_probability: 0.1,
            ..EnvironmentConfig::default()
        },
        agent: AgentConfig {
            alpha: 0.5,
            gamma: 0.5,
            epsilon: 0.2,
            ..AgentConfig::default()
        },
        episodes: 200,
        max_steps: 20,
        seed: 7,
        ..PipelineConfig::default()
    }
}

// ============================================================================
// Routing Tests
// ============================================================================

#[test]
fn test_routes_every_assigned_rider() {
    let orders = order_batch(25);
    let router = CountingRouter::new();
    let pipeline = DispatchPipeline::new(small_config(), ZeroCost, router);

    let report = pipeline.run(&orders).unwrap();

    assert_eq!(report.assignment.order_count(), 25);
    assert_eq!(report.routes.len(), 3);
    assert_eq!(report.cost_source, CostSource::RouteDuration);
    assert!(report.cost_fallback.is_none());
    assert_eq!(report.unavailable_routes().count(), 0);

    // Two waypoints (pickup and dropoff) per order, no start locations.
    let durations: Vec<f64> = report
        .routes
        .iter()
        .map(|route| route.summary().unwrap().duration_secs)
        .collect();
    assert_eq!(durations, vec![1200.0, 1200.0, 600.0]);
}

#[test]
fn test_rider_start_is_first_waypoint() {
    let orders = order_batch(4);
    let mut config = small_config();
    config.fleet = Fleet::Riders(vec![RiderSpec::new("north", 4).starting_at(26.9, 80.95)]);
    let pipeline = DispatchPipeline::new(config, ZeroCost, CountingRouter::new());

    let report = pipeline.run(&orders).unwrap();

    // start + 4 pickups + 4 dropoffs
    let route = report.routes[0].summary().unwrap();
    assert_eq!(route.duration_secs, 9.0 * 60.0);
    assert_eq!(report.routes[0].rider_id(), "north");
}

#[test]
fn test_failed_route_is_recorded_and_filled_with_mean() {
    let orders = order_batch(25);
    // The third rider carries 5 orders, so 10 waypoints.
    let router = CountingRouter::failing_on(10);
    let pipeline = DispatchPipeline::new(small_config(), ZeroCost, router);

    let report = pipeline.run(&orders).unwrap();

    let unavailable: Vec<&RouteOutcome> = report.unavailable_routes().collect();
    assert_eq!(unavailable.len(), 1);
    assert_eq!(unavailable[0].rider_id(), "Rider 3");
    assert_eq!(report.cost_source, CostSource::RouteDuration);

    let costs: Vec<f64> = report.recommendations.iter().map(|r| r.cost).collect();
    assert_eq!(costs, vec![1200.0, 1200.0, 1200.0]);
}

#[test]
fn test_no_routes_falls_back_to_assignment_load() {
    let orders = order_batch(25);
    let pipeline = DispatchPipeline::new(small_config(), ZeroCost, OfflineRouter);

    let report = pipeline.run(&orders).unwrap();

    assert_eq!(report.cost_source, CostSource::AssignmentLoad);
    assert_eq!(report.unavailable_routes().count(), 3);
    let costs: Vec<f64> = report.recommendations.iter().map(|r| r.cost).collect();
    assert_eq!(costs, vec![10.0, 10.0, 5.0]);

    // Lowest load lands in the first bucket, highest in the last.
    assert_eq!(report.recommendations[2].state, 0);
    assert_eq!(report.recommendations[0].state, 3);
}

#[test]
fn test_matrix_outage_solves_for_feasibility() {
    let orders = order_batch(25);
    let cost = TravelCost::new(OfflineMatrix);
    let pipeline = DispatchPipeline::new(small_config(), cost, CountingRouter::new());

    let report = pipeline.run(&orders).unwrap();

    assert_eq!(report.assignment.order_count(), 25);
    assert_eq!(report.assignment.total_cost, 0);
    assert_eq!(report.recommendations.len(), 3);
    assert_eq!(report.cost_source, CostSource::RouteDuration);
    match report.cost_fallback {
        Some(AssignmentError::CostUnavailable { call, reason }) => {
            assert_eq!(call, "table");
            assert!(reason.contains("503"), "unexpected reason: {}", reason);
        }
        other => panic!("expected a recorded cost fallback, got {:?}", other),
    }
}

#[test]
fn test_matrix_outage_does_not_hide_infeasibility() {
    let mut config = small_config();
    config.fleet = Fleet::fixed(2, 2);
    let cost = TravelCost::new(OfflineMatrix);
    let pipeline = DispatchPipeline::new(config, cost, CountingRouter::new());

    let result = pipeline.run(&order_batch(5));

    assert!(matches!(
        result,
        Err(PipelineError::Assignment(
            AssignmentError::InfeasibleAssignment {
                orders: 5,
                capacity: 4
            }
        ))
    ));
}

// ============================================================================
// Learning Tests
// ============================================================================

#[test]
fn test_one_recommendation_per_rider() {
    let orders = order_batch(25);
    let pipeline = DispatchPipeline::new(small_config(), ZeroCost, CountingRouter::new());

    let report = pipeline.run(&orders).unwrap();

    assert_eq!(report.training.episodes.len(), 200);
    assert_eq!(report.q_values.num_states(), 4);
    assert_eq!(report.q_values.num_actions(), 3);
    assert_eq!(report.recommendations.len(), report.assignment.riders.len());
    let riders = &report.assignment.riders;
    for (recommendation, group) in report.recommendations.iter().zip(riders) {
        assert_eq!(recommendation.rider_id, group.rider.id);
        assert!(recommendation.state < 4);
        let best = report.q_values.best_action(recommendation.state);
        assert_eq!(recommendation.action, best);
    }
}

#[test]
fn test_same_seed_same_report() {
    let orders = order_batch(18);
    let run = || {
        let mut config = small_config();
        config.weight_initial_states = true;
        let cost = TravelCost::new(HaversineRouter::default());
        let pipeline = DispatchPipeline::new(config, cost, HaversineRouter::default());
        pipeline.run(&orders).unwrap()
    };

    let first = run();
    let second = run();

    assert_eq!(first.q_values, second.q_values);
    assert_eq!(first.training, second.training);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.routes, second.routes);
}

// ============================================================================
// Error Propagation Tests
// ============================================================================

#[test]
fn test_infeasible_fleet_is_reported() {
    let orders = order_batch(25);
    let mut config = small_config();
    config.fleet = Fleet::fixed(10, 2);
    let router = CountingRouter::new();
    let pipeline = DispatchPipeline::new(config, ZeroCost, router);

    let result = pipeline.run(&orders);

    assert!(matches!(
        result,
        Err(PipelineError::Assignment(
            AssignmentError::InfeasibleAssignment {
                orders: 25,
                capacity: 20
            }
        ))
    ));
}

#[test]
fn test_empty_batch_is_rejected() {
    let pipeline = DispatchPipeline::new(small_config(), ZeroCost, CountingRouter::new());
    let result = pipeline.run(&order_batch(0));
    assert!(matches!(
        result,
        Err(PipelineError::Assignment(AssignmentError::InvalidInput(_)))
    ));
}

#[test]
fn test_invalid_agent_config_is_reported() {
    let mut config = small_config();
    config.agent.gamma = 1.0;
    let pipeline = DispatchPipeline::new(config, ZeroCost, CountingRouter::new());
    let result = pipeline.run(&order_batch(5));
    assert!(matches!(result, Err(PipelineError::Agent(_))));
}
