//! Parallel hyperparameter sweeps.
//!
//! Every configuration trains its own agent (and its own Q-table) against a
//! shared read-only environment; runs never share mutable state.

use rayon::prelude::*;
use tracing::info;

use crate::agent::{AgentConfig, QLearningAgent, TrainingReport};
use crate::environment::Environment;
use crate::error::TrainingError;
use crate::q_table::QTable;

/// Outcome of one configuration in a sweep.
#[derive(Debug, Clone)]
pub struct SweepRun {
    pub config: AgentConfig,
    pub seed: u64,
    pub report: TrainingReport,
    pub table: QTable,
}

impl SweepRun {
    /// Mean episode reward over the last `window` episodes.
    pub fn score(&self, window: usize) -> f64 {
        self.report.mean_reward(window).unwrap_or(f64::NEG_INFINITY)
    }
}

/// Trains one agent per configuration in parallel.
///
/// Run `i` is seeded with `seed + i`, so results do not depend on scheduling.
/// Results are returned in configuration order.
pub fn run<E>(
    env: &E,
    configs: &[AgentConfig],
    episodes: usize,
    max_steps: usize,
    seed: u64,
) -> Result<Vec<SweepRun>, TrainingError>
where
    E: Environment + Sync,
{
    let runs = configs
        .par_iter()
        .enumerate()
        .map(|(index, config)| -> Result<SweepRun, TrainingError> {
            let run_seed = seed.wrapping_add(index as u64);
            let (num_states, num_actions) = (env.num_states(), env.num_actions());
            let mut agent = QLearningAgent::new(num_states, num_actions, config.clone(), run_seed)?;
            let report = agent.train(env, episodes, max_steps)?;
            Ok(SweepRun {
                config: config.clone(),
                seed: run_seed,
                report,
                table: agent.into_table(),
            })
        })
        .collect::<Result<Vec<_>, TrainingError>>()?;

    info!(runs = runs.len(), episodes, "hyperparameter sweep finished");
    Ok(runs)
}

/// The run with the highest mean reward over the last `window` episodes.
pub fn best(runs: &[SweepRun], window: usize) -> Option<&SweepRun> {
    runs.iter()
        .max_by(|a, b| a.score(window).total_cmp(&b.score(window)))
}
