//! Error types for assignment, routing, environment, and training.

use std::time::Duration;

use thiserror::Error;

/// Failures of the assignment solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignmentError {
    /// Malformed parameters: empty batch, zero capacity, duplicate ids, bad cost shape.
    #[error("invalid assignment input: {0}")]
    InvalidInput(String),
    /// Total rider capacity cannot cover every order.
    #[error("infeasible assignment: {orders} orders exceed total rider capacity {capacity}")]
    InfeasibleAssignment { orders: usize, capacity: usize },
    /// The caller-imposed time limit elapsed before a solution was found.
    #[error("assignment solve timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
    /// The cost source depends on an external service that did not answer.
    #[error("assignment cost unavailable, {call} call failed: {reason}")]
    CostUnavailable { call: &'static str, reason: String },
}

/// External routing service failures. Always recoverable by the caller.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("invalid routing input: {0}")]
    InvalidInput(String),
    #[error("{call} request failed: {source}")]
    Request {
        call: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{call} request returned status {status}")]
    Status { call: &'static str, status: u16 },
    #[error("{call} response malformed: {reason}")]
    MalformedResponse { call: &'static str, reason: String },
    #[error("{call} returned no route")]
    NoRoute { call: &'static str },
}

impl RoutingError {
    /// Endpoint that failed, if the error came from a service call.
    pub fn call(&self) -> Option<&'static str> {
        match self {
            RoutingError::InvalidInput(_) => None,
            RoutingError::Request { call, .. }
            | RoutingError::Status { call, .. }
            | RoutingError::MalformedResponse { call, .. }
            | RoutingError::NoRoute { call } => Some(*call),
        }
    }
}

/// A routing failure while building assignment costs.
impl From<RoutingError> for AssignmentError {
    fn from(err: RoutingError) -> Self {
        AssignmentError::CostUnavailable {
            call: err.call().unwrap_or("table"),
            reason: err.to_string(),
        }
    }
}

/// Failures raised by an environment step or construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvironmentError {
    #[error("state {state} out of range for {num_states} states")]
    StateOutOfRange { state: usize, num_states: usize },
    #[error("action {action} out of range for {num_actions} actions")]
    ActionOutOfRange { action: usize, num_actions: usize },
    #[error("invalid environment configuration: {0}")]
    InvalidConfig(String),
    /// A reward signal was missing or non-finite.
    #[error("invalid reward signal for state {state}: {reason}")]
    InvalidSignal { state: usize, reason: String },
}

/// Failures of the Q-learning agent and its table.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid agent configuration: {0}")]
    InvalidConfig(String),
    #[error("state {state} out of range for {num_states} states")]
    StateOutOfRange { state: usize, num_states: usize },
    #[error("action {action} out of range for {num_actions} actions")]
    ActionOutOfRange { action: usize, num_actions: usize },
    #[error("reward {0} is not finite")]
    NonFiniteReward(f64),
    #[error("q-table shape mismatch: expected {expected} values, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("q-table serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of a training run.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Agent and environment disagree on the state or action space.
    #[error("invalid training input: {0}")]
    InvalidInput(String),
    /// An environment step failed; the episode's updates were rolled back.
    #[error("environment step failed in episode {episode} at step {step}: {source}")]
    StepFailed {
        episode: usize,
        step: usize,
        #[source]
        source: EnvironmentError,
    },
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Failures of a full batch run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Training(#[from] TrainingError),
}
