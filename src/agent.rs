//! Tabular Q-learning agent.
//!
//! The agent owns its [`QTable`] and a seeded random source used for
//! exploration, initial-state sampling, and environment termination draws, so
//! a run is reproducible from `(config, seed)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::error::{AgentError, TrainingError};
use crate::q_table::QTable;

/// Learning hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Learning rate α in [0, 1]. Zero freezes the table.
    pub alpha: f64,
    /// Discount factor γ in [0, 1).
    pub gamma: f64,
    /// Exploration rate ε in [0, 1].
    pub epsilon: f64,
    /// Multiplier applied to ε after every episode.
    pub epsilon_decay: f64,
    /// Floor for the decayed ε.
    pub epsilon_min: f64,
    /// Log progress every N episodes. Zero disables progress logging.
    pub log_every: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.1,
            epsilon_decay: 1.0,
            epsilon_min: 0.0,
            log_every: 100,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AgentError::InvalidConfig(format!(
                "alpha {} must be in [0, 1]",
                self.alpha
            )));
        }
        if !(0.0..1.0).contains(&self.gamma) {
            return Err(AgentError::InvalidConfig(format!(
                "gamma {} must be in [0, 1)",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(AgentError::InvalidConfig(format!(
                "epsilon {} must be in [0, 1]",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon_decay) {
            return Err(AgentError::InvalidConfig(format!(
                "epsilon decay {} must be in [0, 1]",
                self.epsilon_decay
            )));
        }
        if !(0.0..=self.epsilon).contains(&self.epsilon_min) {
            return Err(AgentError::InvalidConfig(format!(
                "epsilon floor {} must be in [0, epsilon]",
                self.epsilon_min
            )));
        }
        Ok(())
    }
}

/// Diagnostics for one finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// 1-based episode number.
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f64,
    /// True when the environment signalled `done`; false when the step cap hit.
    pub terminated: bool,
    /// Largest absolute Q-value change during the episode.
    pub max_abs_delta: f64,
    /// Exploration rate used during the episode.
    pub epsilon: f64,
}

/// Per-episode diagnostics of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeSummary>,
}

impl TrainingReport {
    pub fn total_steps(&self) -> usize {
        self.episodes.iter().map(|e| e.steps).sum()
    }

    /// True when the last `window` episodes all changed the table by less than `tolerance`.
    pub fn converged(&self, window: usize, tolerance: f64) -> bool {
        if window == 0 || self.episodes.len() < window {
            return false;
        }
        self.episodes[self.episodes.len() - window..]
            .iter()
            .all(|e| e.max_abs_delta < tolerance)
    }

    /// Mean total reward over the last `window` episodes.
    pub fn mean_reward(&self, window: usize) -> Option<f64> {
        let window = window.min(self.episodes.len());
        if window == 0 {
            return None;
        }
        let tail = &self.episodes[self.episodes.len() - window..];
        let total: f64 = tail.iter().map(|e| e.total_reward).sum();
        Some(total / window as f64)
    }
}

#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: QTable,
    config: AgentConfig,
    epsilon: f64,
    rng: StdRng,
}

impl QLearningAgent {
    /// Creates an agent with a zeroed table over `num_states x num_actions`.
    pub fn new(
        num_states: usize,
        num_actions: usize,
        config: AgentConfig,
        seed: u64,
    ) -> Result<Self, AgentError> {
        if num_states == 0 || num_actions == 0 {
            return Err(AgentError::InvalidConfig(
                "state and action spaces must be non-empty".to_string(),
            ));
        }
        Self::with_table(QTable::new(num_states, num_actions), config, seed)
    }

    /// Resumes learning from an existing table.
    pub fn with_table(table: QTable, config: AgentConfig, seed: u64) -> Result<Self, AgentError> {
        config.validate()?;
        if table.num_states() == 0 || table.num_actions() == 0 {
            return Err(AgentError::InvalidConfig(
                "state and action spaces must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            table,
            epsilon: config.epsilon,
            config,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn num_states(&self) -> usize {
        self.table.num_states()
    }

    pub fn num_actions(&self) -> usize {
        self.table.num_actions()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current exploration rate (after any decay).
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Read-only view of the learned values.
    pub fn values(&self) -> &QTable {
        &self.table
    }

    pub fn into_table(self) -> QTable {
        self.table
    }

    /// Epsilon-greedy action selection.
    ///
    /// Explores uniformly over all declared actions with probability ε,
    /// otherwise returns the highest-valued action (lowest index on ties).
    pub fn choose_action(&mut self, state: usize) -> Result<usize, AgentError> {
        self.check_state(state)?;
        if self.epsilon > 0.0 && self.rng.gen_bool(self.epsilon) {
            return Ok(self.rng.gen_range(0..self.num_actions()));
        }
        Ok(self.table.best_action(state))
    }

    /// Highest-valued action for `state`, ignoring exploration.
    pub fn greedy_action(&self, state: usize) -> Result<usize, AgentError> {
        self.check_state(state)?;
        Ok(self.table.best_action(state))
    }

    /// Temporal-difference update:
    /// `Q(s,a) += α * (reward + γ * max_a' Q(s',a') - Q(s,a))`.
    ///
    /// Returns the absolute change applied to `Q(s,a)`.
    pub fn learn(
        &mut self,
        state: usize,
        action: usize,
        reward: f64,
        next_state: usize,
    ) -> Result<f64, AgentError> {
        self.check_state(state)?;
        self.check_state(next_state)?;
        if action >= self.num_actions() {
            return Err(AgentError::ActionOutOfRange {
                action,
                num_actions: self.num_actions(),
            });
        }
        if !reward.is_finite() {
            return Err(AgentError::NonFiniteReward(reward));
        }

        let current = self.table.get(state, action);
        let target = reward + self.config.gamma * self.table.max_value(next_state);
        let updated = current + self.config.alpha * (target - current);
        self.table.set(state, action, updated);
        Ok((updated - current).abs())
    }

    /// Runs `episodes` episodes of at most `max_steps` steps each.
    pub fn train<E: Environment>(
        &mut self,
        env: &E,
        episodes: usize,
        max_steps: usize,
    ) -> Result<TrainingReport, TrainingError> {
        self.train_with_progress(env, episodes, max_steps, |_| {})
    }

    /// Like [`train`](Self::train), reporting each finished episode to `on_episode`.
    ///
    /// A failing step rolls the table back to its state before that episode.
    pub fn train_with_progress<E, F>(
        &mut self,
        env: &E,
        episodes: usize,
        max_steps: usize,
        mut on_episode: F,
    ) -> Result<TrainingReport, TrainingError>
    where
        E: Environment,
        F: FnMut(&EpisodeSummary),
    {
        let mut report = TrainingReport::default();
        if episodes == 0 {
            return Ok(report);
        }
        let agent_shape = (self.num_states(), self.num_actions());
        let env_shape = (env.num_states(), env.num_actions());
        if agent_shape != env_shape {
            return Err(TrainingError::InvalidInput(format!(
                "agent has {}x{} state-actions, environment has {}x{}",
                agent_shape.0, agent_shape.1, env_shape.0, env_shape.1
            )));
        }
        if max_steps == 0 {
            return Err(TrainingError::InvalidInput("max_steps must be positive".to_string()));
        }

        for episode in 1..=episodes {
            let snapshot = self.table.clone();
            let summary = match self.run_episode(env, episode, max_steps) {
                Ok(summary) => summary,
                Err(err) => {
                    self.table = snapshot;
                    warn!(episode, error = %err, "training episode aborted");
                    return Err(err);
                }
            };

            debug!(
                episode,
                steps = summary.steps,
                total_reward = summary.total_reward,
                max_abs_delta = summary.max_abs_delta,
                "episode finished"
            );
            if self.config.log_every > 0 && episode % self.config.log_every == 0 {
                info!(
                    episode,
                    episodes,
                    epsilon = self.epsilon,
                    "training progress"
                );
            }

            on_episode(&summary);
            report.episodes.push(summary);
            let decayed = self.epsilon * self.config.epsilon_decay;
            self.epsilon = decayed.max(self.config.epsilon_min);
        }

        Ok(report)
    }

    fn run_episode<E: Environment>(
        &mut self,
        env: &E,
        episode: usize,
        max_steps: usize,
    ) -> Result<EpisodeSummary, TrainingError> {
        let mut state = env.initial_state(&mut self.rng);
        let mut summary = EpisodeSummary {
            episode,
            steps: 0,
            total_reward: 0.0,
            terminated: false,
            max_abs_delta: 0.0,
            epsilon: self.epsilon,
        };

        while summary.steps < max_steps {
            let action = self.choose_action(state)?;
            let transition = env
                .step(state, action, &mut self.rng)
                .map_err(|source| TrainingError::StepFailed {
                    episode,
                    step: summary.steps,
                    source,
                })?;
            let delta = self.learn(state, action, transition.reward, transition.next_state)?;

            summary.steps += 1;
            summary.total_reward += transition.reward;
            summary.max_abs_delta = summary.max_abs_delta.max(delta);
            state = transition.next_state;

            if transition.done {
                summary.terminated = true;
                break;
            }
        }

        Ok(summary)
    }

    fn check_state(&self, state: usize) -> Result<(), AgentError> {
        if state >= self.num_states() {
            return Err(AgentError::StateOutOfRange {
                state,
                num_states: self.num_states(),
            });
        }
        Ok(())
    }
}
