//! Dense state-action value table.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Q-values stored row-major over `num_states x num_actions`.
///
/// Unvisited pairs hold 0.0. The JSON form carries the shape alongside the
/// flat values and round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    num_states: usize,
    num_actions: usize,
    values: Vec<f64>,
}

impl QTable {
    pub fn new(num_states: usize, num_actions: usize) -> Self {
        Self {
            num_states,
            num_actions,
            values: vec![0.0; num_states * num_actions],
        }
    }

    /// Rebuilds a table from flat row-major values, checking the shape.
    pub fn from_values(
        num_states: usize,
        num_actions: usize,
        values: Vec<f64>,
    ) -> Result<Self, AgentError> {
        let expected = num_states * num_actions;
        if values.len() != expected {
            return Err(AgentError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            num_states,
            num_actions,
            values,
        })
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of `action` in `state`.
    ///
    /// # Panics
    ///
    /// Panics if `state >= num_states` or `action >= num_actions`. Use
    /// [`try_get`](Self::try_get) for indices that have not been validated.
    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.values[self.index(state, action)]
    }

    /// Value of `action` in `state`, or `None` when either index is out of range.
    pub fn try_get(&self, state: usize, action: usize) -> Option<f64> {
        if state < self.num_states && action < self.num_actions {
            Some(self.values[state * self.num_actions + action])
        } else {
            None
        }
    }

    pub(crate) fn set(&mut self, state: usize, action: usize, value: f64) {
        let index = self.index(state, action);
        self.values[index] = value;
    }

    fn index(&self, state: usize, action: usize) -> usize {
        assert!(
            state < self.num_states && action < self.num_actions,
            "({state}, {action}) is outside a {}x{} table",
            self.num_states,
            self.num_actions
        );
        state * self.num_actions + action
    }

    /// Values of every action in `state`.
    ///
    /// # Panics
    ///
    /// Panics if `state >= num_states`.
    pub fn row(&self, state: usize) -> &[f64] {
        assert!(
            state < self.num_states,
            "state {state} is outside a table of {} states",
            self.num_states
        );
        let start = state * self.num_actions;
        &self.values[start..start + self.num_actions]
    }

    /// Highest value over all actions in `state`.
    ///
    /// # Panics
    ///
    /// Panics if `state >= num_states`.
    pub fn max_value(&self, state: usize) -> f64 {
        self.row(state)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Highest-valued action in `state`; ties go to the lowest index.
    ///
    /// # Panics
    ///
    /// Panics if `state >= num_states`.
    pub fn best_action(&self, state: usize) -> usize {
        let row = self.row(state);
        let mut best = 0;
        for (action, &value) in row.iter().enumerate().skip(1) {
            if value > row[best] {
                best = action;
            }
        }
        best
    }

    /// Greedy action for every state.
    pub fn policy(&self) -> Vec<usize> {
        (0..self.num_states)
            .map(|state| self.best_action(state))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, AgentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, AgentError> {
        let table: QTable = serde_json::from_str(json)?;
        Self::from_values(table.num_states, table.num_actions, table.values)
    }
}
