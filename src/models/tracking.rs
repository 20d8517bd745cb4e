use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::GeoPoint;
use crate::models::order::{OrderId, OrderStatus};

pub type EventId = u64;

/// One immutable fact in an order's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingEvent {
    pub id: EventId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub location: Option<GeoPoint>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
