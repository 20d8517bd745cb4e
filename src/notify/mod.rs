use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::customer::CustomerId;
use crate::models::driver::{Driver, DriverId};
use crate::models::order::{DeliveryOrder, OrderId, OrderStatus};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Trigger points the core fires after a successful commit.
///
/// Failures are logged by the caller and never undo the commit.
pub trait Notifier: Send + Sync {
    fn order_created(&self, order: &DeliveryOrder) -> Result<(), NotifyError>;
    fn driver_assigned(&self, order: &DeliveryOrder, driver: &Driver) -> Result<(), NotifyError>;
    fn status_changed(&self, order: &DeliveryOrder) -> Result<(), NotifyError>;
    fn order_cancelled(&self, order: &DeliveryOrder) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    OrderCreated {
        order_id: OrderId,
        order_number: String,
        customer_id: CustomerId,
        at: DateTime<Utc>,
    },
    DriverAssigned {
        order_id: OrderId,
        order_number: String,
        customer_id: CustomerId,
        driver_id: DriverId,
        driver_name: String,
        pickup_address: String,
        at: DateTime<Utc>,
    },
    StatusChanged {
        order_id: OrderId,
        order_number: String,
        customer_id: CustomerId,
        status: OrderStatus,
        at: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: OrderId,
        order_number: String,
        customer_id: CustomerId,
        driver_id: Option<DriverId>,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
}

/// Publishes every trigger on a broadcast channel for websocket clients.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<DispatchEvent>,
}

impl BroadcastNotifier {
    pub fn new(tx: broadcast::Sender<DispatchEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: DispatchEvent) -> Result<(), NotifyError> {
        // No subscriber is not a failure; nobody is listening yet.
        if self.tx.send(event).is_err() {
            debug!("dispatch event dropped: no subscribers");
        }
        Ok(())
    }
}

impl Notifier for BroadcastNotifier {
    fn order_created(&self, order: &DeliveryOrder) -> Result<(), NotifyError> {
        self.publish(DispatchEvent::OrderCreated {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            at: Utc::now(),
        })
    }

    fn driver_assigned(&self, order: &DeliveryOrder, driver: &Driver) -> Result<(), NotifyError> {
        self.publish(DispatchEvent::DriverAssigned {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            driver_id: driver.id,
            driver_name: driver.name.clone(),
            pickup_address: order.pickup.address.clone(),
            at: Utc::now(),
        })
    }

    fn status_changed(&self, order: &DeliveryOrder) -> Result<(), NotifyError> {
        self.publish(DispatchEvent::StatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            status: order.status,
            at: Utc::now(),
        })
    }

    fn order_cancelled(&self, order: &DeliveryOrder) -> Result<(), NotifyError> {
        self.publish(DispatchEvent::OrderCancelled {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            driver_id: order.driver_id,
            reason: order.cancellation_reason.clone(),
            at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = DispatchEvent::StatusChanged {
            order_id: 3,
            order_number: "ORD-20240101-0000000A".to_string(),
            customer_id: 1,
            status: OrderStatus::InTransit,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["status"], "IN_TRANSIT");
    }
}
