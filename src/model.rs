//! Concrete batch data: orders, riders, and fleet configuration.

use serde::{Deserialize, Serialize};

use crate::traits::Order;

/// A delivery order as loaded for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: String,
    pub pickup: (f64, f64),
    pub dropoff: (f64, f64),
    pub value: f64,
    pub time_constraint: Option<i32>,
}

impl DeliveryOrder {
    pub fn new(id: impl Into<String>, pickup: (f64, f64), dropoff: (f64, f64)) -> Self {
        Self {
            id: id.into(),
            pickup,
            dropoff,
            value: 0.0,
            time_constraint: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_time_constraint(mut self, seconds: i32) -> Self {
        self.time_constraint = Some(seconds);
        self
    }
}

impl Order for DeliveryOrder {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn pickup(&self) -> (f64, f64) {
        self.pickup
    }

    fn dropoff(&self) -> (f64, f64) {
        self.dropoff
    }

    fn weight(&self) -> f64 {
        self.value
    }

    fn time_constraint(&self) -> Option<i32> {
        self.time_constraint
    }
}

/// A capacity-bounded rider for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderSpec {
    /// Label reported in the assignment result.
    pub id: String,
    /// Maximum number of orders servable in the batch.
    pub capacity: u32,
    /// Start location (lat, lng). If None, travel costs start at the pickup.
    pub start_location: Option<(f64, f64)>,
}

impl RiderSpec {
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            start_location: None,
        }
    }

    pub fn starting_at(mut self, lat: f64, lng: f64) -> Self {
        self.start_location = Some((lat, lng));
        self
    }
}

/// How riders are provided for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fleet {
    /// Identical riders sharing one capacity. When `riders` is None the count
    /// is derived as `ceil(orders / capacity)`.
    Uniform {
        capacity: u32,
        riders: Option<usize>,
    },
    /// Explicit riders with individual capacities.
    Riders(Vec<RiderSpec>),
}

impl Fleet {
    pub fn uniform(capacity: u32) -> Self {
        Fleet::Uniform {
            capacity,
            riders: None,
        }
    }

    /// Exactly `riders` riders. Zero riders is accepted here and reported as
    /// infeasible by the solver for any non-empty batch.
    pub fn fixed(capacity: u32, riders: usize) -> Self {
        Fleet::Uniform {
            capacity,
            riders: Some(riders),
        }
    }

    /// Materializes the riders for a batch of `order_count` orders.
    ///
    /// Capacity validation is left to the solver.
    pub fn riders_for(&self, order_count: usize) -> Vec<RiderSpec> {
        match self {
            Fleet::Uniform { capacity, riders } => {
                let count = match riders {
                    Some(count) => *count,
                    None if *capacity == 0 => 0,
                    None => order_count.div_ceil(*capacity as usize),
                };
                (0..count)
                    .map(|i| RiderSpec::new(format!("Rider {}", i + 1), *capacity))
                    .collect()
            }
            Fleet::Riders(riders) => riders.clone(),
        }
    }
}
