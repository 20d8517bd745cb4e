use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::rolling_average;

pub type CustomerId = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub total_orders: u32,
    pub rating: f64,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn record_rating(&mut self, score: f64) {
        self.rating = rolling_average(self.rating, self.rating_count, score);
        self.rating_count += 1;
    }
}
