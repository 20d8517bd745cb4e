use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::customer::CustomerId;
use crate::models::driver::{DriverId, GeoPoint};
use crate::models::quote::Quote;

pub type OrderId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Failed,
    ];

    /// The legal status graph. Every legality check goes through here.
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Assigned, OrderStatus::Cancelled],
            OrderStatus::Assigned => &[OrderStatus::PickedUp, OrderStatus::Cancelled],
            OrderStatus::PickedUp => &[OrderStatus::InTransit, OrderStatus::Failed],
            OrderStatus::InTransit => &[OrderStatus::Delivered, OrderStatus::Failed],
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_next().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub address: String,
    pub location: GeoPoint,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetails {
    pub package_type: String,
    pub weight_kg: f64,
    pub dimensions: Option<String>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub requested_pickup_at: Option<DateTime<Utc>>,
    pub requested_delivery_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryProof {
    pub signature_url: Option<String>,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub score: f64,
    pub feedback: Option<String>,
}

/// Timestamps of the transitions an order actually took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTimeline {
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderTimeline {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            assigned_at: None,
            picked_up_at: None,
            in_transit_at: None,
            delivered_at: None,
            failed_at: None,
            cancelled_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: CustomerId,
    /// Kept after release so delivered orders still name their driver.
    pub driver_id: Option<DriverId>,
    pub status: OrderStatus,
    pub pickup: Stop,
    pub delivery: Stop,
    pub package: PackageDetails,
    pub schedule: Schedule,
    pub promo_code: Option<String>,
    pub quote: Quote,
    pub timeline: OrderTimeline,
    pub proof: Option<DeliveryProof>,
    pub failure_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub customer_rating: Option<Rating>,
    pub driver_rating: Option<Rating>,
}

impl DeliveryOrder {
    /// The driver currently held by this order, if any.
    pub fn active_driver(&self) -> Option<DriverId> {
        if self.status.is_terminal() {
            None
        } else {
            self.driver_id
        }
    }
}
