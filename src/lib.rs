//! dispatch-rl: capacitated rider assignment and tabular Q-learning for
//! last-mile delivery batches.

pub mod traits;
pub mod model;
pub mod error;
pub mod cost;
pub mod solver;
pub mod environment;
pub mod q_table;
pub mod agent;
pub mod sweep;
pub mod osrm;
pub mod haversine;
pub mod pipeline;
