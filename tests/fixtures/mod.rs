//! Test fixtures for dispatch-rl.
//!
//! Provides realistic test data including:
//! - Real Lucknow locations (restaurants and residential drop points)
//! - Order batch builders

#![allow(dead_code)]

pub mod lucknow_locations;

pub use lucknow_locations::*;
