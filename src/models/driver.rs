use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type DriverId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::InvalidInput(format!(
                "latitude {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::InvalidInput(format!(
                "longitude {} out of range [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Offline,
    Online,
    Busy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriverStats {
    pub total_deliveries: u32,
    pub completed_deliveries: u32,
    pub cancelled_deliveries: u32,
    pub total_earnings: f64,
    /// Rolling average of customer ratings, 0.0 until the first rating.
    pub rating: f64,
    pub rating_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_type: String,
    pub vehicle_plate: String,
    pub license_number: String,
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub availability: Availability,
    pub stats: DriverStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn is_assignable(&self) -> bool {
        self.availability == Availability::Online
    }

    pub fn record_rating(&mut self, score: f64) {
        self.stats.rating = rolling_average(self.stats.rating, self.stats.rating_count, score);
        self.stats.rating_count += 1;
    }
}

/// Success rate in percent; zero before the first finished delivery.
pub fn success_rate(stats: &DriverStats) -> f64 {
    if stats.total_deliveries == 0 {
        return 0.0;
    }
    stats.completed_deliveries as f64 * 100.0 / stats.total_deliveries as f64
}

pub(crate) fn rolling_average(current: f64, count: u32, sample: f64) -> f64 {
    (current * count as f64 + sample) / (count as f64 + 1.0)
}
