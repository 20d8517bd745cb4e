use serde::{Deserialize, Serialize};

/// Fare breakdown fixed at order creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub distance_km: f64,
    pub base_fare: f64,
    pub distance_charge: f64,
    pub weight_charge: f64,
    pub peak_hour_surcharge: f64,
    pub discount: f64,
    pub total_amount: f64,
    pub estimated_minutes: u32,
}
