//! Lucknow locations for realistic test fixtures.
//!
//! Coordinates fall inside the bounding box used for synthetic order batches
//! (lat 26.50..27.17, lng 80.50..81.22).

use dispatch_rl::model::DeliveryOrder;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Pickup points (restaurants / kitchens)
// ============================================================================

pub const RESTAURANTS: &[Location] = &[
    Location::new("Tunday Kababi Aminabad", 26.8467, 80.9246),
    Location::new("Royal Cafe Hazratganj", 26.8506, 80.9462),
    Location::new("Idris Biryani Chowk", 26.8696, 80.9080),
    Location::new("Dastarkhwan Lalbagh", 26.8490, 80.9400),
    Location::new("Moti Mahal Hazratganj", 26.8527, 80.9455),
    Location::new("Sakhawat Gomti Nagar", 26.8540, 81.0030),
    Location::new("Oudhyana Vipin Khand", 26.8560, 80.9990),
    Location::new("Naushijaan Kapoorthala", 26.8880, 80.9470),
];

// ============================================================================
// Dropoff points (residential areas)
// ============================================================================

pub const DROP_POINTS: &[Location] = &[
    Location::new("Indira Nagar", 26.8850, 80.9950),
    Location::new("Aliganj", 26.8930, 80.9400),
    Location::new("Alambagh", 26.8140, 80.9000),
    Location::new("Jankipuram", 26.9280, 80.9420),
    Location::new("Vikas Nagar", 26.8890, 80.9660),
    Location::new("Ashiyana", 26.7920, 80.9140),
    Location::new("Rajajipuram", 26.8450, 80.8820),
    Location::new("Mahanagar", 26.8720, 80.9640),
    Location::new("Chinhat", 26.8780, 81.0500),
    Location::new("Telibagh", 26.7800, 80.9550),
];

/// Builds `count` orders cycling through restaurants and drop points.
pub fn order_batch(count: usize) -> Vec<DeliveryOrder> {
    (0..count)
        .map(|i| {
            let pickup = &RESTAURANTS[i % RESTAURANTS.len()];
            let dropoff = &DROP_POINTS[(i * 3) % DROP_POINTS.len()];
            let id = format!("order_{}", i + 1);
            DeliveryOrder::new(id, pickup.coords(), dropoff.coords())
                .with_value(100.0 + (i * 37 % 400) as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_in_lucknow_area() {
        for loc in RESTAURANTS.iter().chain(DROP_POINTS) {
            assert!(
                loc.lat > 26.5 && loc.lat < 27.17,
                "{} lat out of range: {}",
                loc.name,
                loc.lat
            );
            assert!(
                loc.lng > 80.5 && loc.lng < 81.22,
                "{} lng out of range: {}",
                loc.name,
                loc.lng
            );
        }
    }

    #[test]
    fn test_order_batch_ids_unique() {
        let orders = order_batch(25);
        let mut ids: Vec<_> = orders.iter().map(|o| o.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 25);
    }
}
