//! Delivery environment model for the Q-learning agent.
//!
//! States are cost buckets derived from route or assignment costs; actions are
//! discrete route options. Transitions are a pure function of
//! `(state, action, environment data)`; the only randomness (initial state and
//! episode termination) comes from the caller's random source.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::error::EnvironmentError;

/// Outcome of a single environment step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next_state: usize,
    pub reward: f64,
    pub done: bool,
}

/// A finite, discrete environment driven by an injected random source.
pub trait Environment {
    fn num_states(&self) -> usize;

    fn num_actions(&self) -> usize;

    /// Samples the first state of an episode. Uniform by default.
    fn initial_state<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.num_states())
    }

    fn step<R: Rng + ?Sized>(
        &self,
        state: usize,
        action: usize,
        rng: &mut R,
    ) -> Result<Transition, EnvironmentError>;
}

/// How episodes pick their first state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InitialStates {
    #[default]
    Uniform,
    Fixed(usize),
    /// Relative weight per state.
    Weighted(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub num_states: usize,
    pub num_actions: usize,
    /// Probability that any step ends the episode. Must be in (0, 1].
    pub termination_probability: f64,
    pub initial_states: InitialStates,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            num_states: 10,
            num_actions: 5,
            termination_probability: 0.05,
            initial_states: InitialStates::Uniform,
        }
    }
}

#[derive(Debug, Clone)]
enum InitialSampler {
    Uniform,
    Fixed(usize),
    Weighted(WeightedIndex<f64>),
}

/// Delivery environment over cost-bucket states.
///
/// - next state: `(state + action) % num_states`
/// - reward: `-|target[state] - action|`, where `target[state]` is the cost
///   level of the state expressed on the action scale
/// - done: Bernoulli(`termination_probability`) from the caller's RNG
#[derive(Debug, Clone)]
pub struct DeliveryEnvironment {
    num_states: usize,
    num_actions: usize,
    termination_probability: f64,
    state_costs: Vec<f64>,
    initial: InitialSampler,
}

impl DeliveryEnvironment {
    /// Creates an environment with one target cost per state.
    pub fn new(config: EnvironmentConfig, state_costs: Vec<f64>) -> Result<Self, EnvironmentError> {
        if config.num_states == 0 || config.num_actions == 0 {
            return Err(EnvironmentError::InvalidConfig(
                "state and action spaces must be non-empty".to_string(),
            ));
        }
        if !(config.termination_probability > 0.0 && config.termination_probability <= 1.0) {
            return Err(EnvironmentError::InvalidConfig(format!(
                "termination probability {} must be in (0, 1]",
                config.termination_probability
            )));
        }
        if state_costs.len() != config.num_states {
            return Err(EnvironmentError::InvalidConfig(format!(
                "expected {} state costs, got {}",
                config.num_states,
                state_costs.len()
            )));
        }
        if let Some(state) = state_costs.iter().position(|cost| !cost.is_finite()) {
            return Err(EnvironmentError::InvalidSignal {
                state,
                reason: "state cost is not finite".to_string(),
            });
        }

        let initial = match config.initial_states {
            InitialStates::Uniform => InitialSampler::Uniform,
            InitialStates::Fixed(state) if state < config.num_states => {
                InitialSampler::Fixed(state)
            }
            InitialStates::Fixed(state) => {
                return Err(EnvironmentError::StateOutOfRange {
                    state,
                    num_states: config.num_states,
                });
            }
            InitialStates::Weighted(ref weights) => {
                if weights.len() != config.num_states {
                    return Err(EnvironmentError::InvalidConfig(format!(
                        "expected {} initial-state weights, got {}",
                        config.num_states,
                        weights.len()
                    )));
                }
                let index = WeightedIndex::new(weights).map_err(|err| {
                    EnvironmentError::InvalidConfig(format!("initial-state weights: {}", err))
                })?;
                InitialSampler::Weighted(index)
            }
        };

        Ok(Self {
            num_states: config.num_states,
            num_actions: config.num_actions,
            termination_probability: config.termination_probability,
            state_costs,
            initial,
        })
    }

    /// Creates an environment whose states bucket the given route costs.
    pub fn from_route_costs(
        config: EnvironmentConfig,
        costs: &[f64],
    ) -> Result<Self, EnvironmentError> {
        let buckets = StateBuckets::from_costs(costs, config.num_states)?;
        let targets = buckets.targets(config.num_actions);
        Self::new(config, targets)
    }

    /// Target cost level of each state on the action scale.
    pub fn state_costs(&self) -> &[f64] {
        &self.state_costs
    }

    pub fn termination_probability(&self) -> f64 {
        self.termination_probability
    }

    /// Reward for taking `action` in `state`, without advancing.
    pub fn reward(&self, state: usize, action: usize) -> Result<f64, EnvironmentError> {
        self.check(state, action)?;
        Ok(-(self.state_costs[state] - action as f64).abs())
    }

    fn check(&self, state: usize, action: usize) -> Result<(), EnvironmentError> {
        if state >= self.num_states {
            return Err(EnvironmentError::StateOutOfRange {
                state,
                num_states: self.num_states,
            });
        }
        if action >= self.num_actions {
            return Err(EnvironmentError::ActionOutOfRange {
                action,
                num_actions: self.num_actions,
            });
        }
        Ok(())
    }
}

impl Environment for DeliveryEnvironment {
    fn num_states(&self) -> usize {
        self.num_states
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn initial_state<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match &self.initial {
            InitialSampler::Uniform => rng.gen_range(0..self.num_states),
            InitialSampler::Fixed(state) => *state,
            InitialSampler::Weighted(index) => index.sample(rng),
        }
    }

    fn step<R: Rng + ?Sized>(
        &self,
        state: usize,
        action: usize,
        rng: &mut R,
    ) -> Result<Transition, EnvironmentError> {
        let reward = self.reward(state, action)?;
        Ok(Transition {
            next_state: (state + action) % self.num_states,
            reward,
            done: rng.gen_bool(self.termination_probability),
        })
    }
}

/// Equal-width bucketing of observed costs into discrete states.
#[derive(Debug, Clone, PartialEq)]
pub struct StateBuckets {
    min: f64,
    max: f64,
    counts: Vec<usize>,
    sums: Vec<f64>,
}

impl StateBuckets {
    pub fn from_costs(costs: &[f64], num_states: usize) -> Result<Self, EnvironmentError> {
        if num_states == 0 {
            return Err(EnvironmentError::InvalidConfig(
                "state space must be non-empty".to_string(),
            ));
        }
        if costs.is_empty() {
            return Err(EnvironmentError::InvalidConfig("no costs to bucket".to_string()));
        }
        if let Some(index) = costs.iter().position(|cost| !cost.is_finite()) {
            return Err(EnvironmentError::InvalidSignal {
                state: index,
                reason: "observed cost is not finite".to_string(),
            });
        }

        let min = costs.iter().copied().fold(f64::INFINITY, f64::min);
        let max = costs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut buckets = Self {
            min,
            max,
            counts: vec![0; num_states],
            sums: vec![0.0; num_states],
        };
        for &cost in costs {
            let state = buckets.state_for(cost);
            buckets.counts[state] += 1;
            buckets.sums[state] += cost;
        }
        Ok(buckets)
    }

    pub fn num_states(&self) -> usize {
        self.counts.len()
    }

    /// State index for a cost; values outside the observed range clamp.
    pub fn state_for(&self, cost: f64) -> usize {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0;
        }
        let position = ((cost - self.min) / span * self.num_states() as f64).floor();
        (position.max(0.0) as usize).min(self.num_states() - 1)
    }

    /// Number of observed costs per state.
    pub fn occupancy(&self) -> &[usize] {
        &self.counts
    }

    /// Per-state target on the action scale `[0, num_actions - 1]`.
    ///
    /// Uses the mean observed cost of the bucket, or the bucket centre when empty.
    pub fn targets(&self, num_actions: usize) -> Vec<f64> {
        let span = self.max - self.min;
        let width = span / self.num_states() as f64;
        let scale = num_actions.saturating_sub(1) as f64;

        (0..self.num_states())
            .map(|state| {
                if span <= 0.0 {
                    return 0.0;
                }
                let level = if self.counts[state] > 0 {
                    self.sums[state] / self.counts[state] as f64
                } else {
                    self.min + (state as f64 + 0.5) * width
                };
                (level - self.min) / span * scale
            })
            .collect()
    }
}
