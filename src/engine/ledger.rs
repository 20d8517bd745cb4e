use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::driver::GeoPoint;
use crate::models::order::{OrderId, OrderStatus};
use crate::models::tracking::TrackingEvent;
use crate::store::{Changeset, Store};

/// Append-only history of status changes and location pings per order.
#[derive(Clone)]
pub struct TrackingLedger {
    store: Arc<dyn Store>,
}

impl TrackingLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Builds the next event without persisting it; the caller commits it
    /// together with the rest of its changeset.
    pub fn record(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        location: Option<GeoPoint>,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> TrackingEvent {
        TrackingEvent {
            id: self.store.next_event_id(),
            order_id,
            status,
            location,
            note,
            recorded_at,
        }
    }

    pub fn append(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        location: Option<GeoPoint>,
        note: Option<String>,
    ) -> Result<TrackingEvent, AppError> {
        if self.store.order(order_id)?.is_none() {
            return Err(AppError::NotFound(format!("order {order_id} not found")));
        }

        let event = self.record(order_id, status, location, note, Utc::now());
        self.store.commit(Changeset::new().event(event.clone()))?;
        Ok(event)
    }

    /// Newest first. Events sharing a timestamp keep their append order reversed.
    pub fn history(&self, order_id: OrderId) -> Result<Vec<TrackingEvent>, AppError> {
        let mut events = self.store.tracking_events(order_id)?;
        events.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(events)
    }

    /// Insertion order, for replaying an order's lifecycle.
    pub fn replay(&self, order_id: OrderId) -> Result<Vec<TrackingEvent>, AppError> {
        Ok(self.store.tracking_events(order_id)?)
    }
}
