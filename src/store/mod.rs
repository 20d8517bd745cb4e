pub mod memory;

use thiserror::Error;

use crate::models::customer::{Customer, CustomerId};
use crate::models::driver::{Driver, DriverId};
use crate::models::order::{DeliveryOrder, OrderId};
use crate::models::tracking::{EventId, TrackingEvent};

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracking event {0} already recorded")]
    DuplicateEvent(EventId),

    #[error("order number {0} already taken")]
    DuplicateOrderNumber(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything one operation writes. Applied whole or not at all.
#[derive(Debug, Default)]
pub struct Changeset {
    pub orders: Vec<DeliveryOrder>,
    pub drivers: Vec<Driver>,
    pub customers: Vec<Customer>,
    pub events: Vec<TrackingEvent>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order: DeliveryOrder) -> Self {
        self.orders.push(order);
        self
    }

    pub fn driver(mut self, driver: Driver) -> Self {
        self.drivers.push(driver);
        self
    }

    pub fn customer(mut self, customer: Customer) -> Self {
        self.customers.push(customer);
        self
    }

    pub fn event(mut self, event: TrackingEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
            && self.drivers.is_empty()
            && self.customers.is_empty()
            && self.events.is_empty()
    }
}

/// Persistence collaborator for the dispatch core.
pub trait Store: Send + Sync {
    fn next_order_id(&self) -> OrderId;
    fn next_driver_id(&self) -> DriverId;
    fn next_customer_id(&self) -> CustomerId;
    fn next_event_id(&self) -> EventId;

    fn order(&self, id: OrderId) -> StoreResult<Option<DeliveryOrder>>;
    fn order_by_number(&self, order_number: &str) -> StoreResult<Option<DeliveryOrder>>;
    fn orders_for_customer(&self, customer_id: CustomerId) -> StoreResult<Vec<DeliveryOrder>>;
    fn orders_for_driver(&self, driver_id: DriverId) -> StoreResult<Vec<DeliveryOrder>>;

    fn driver(&self, id: DriverId) -> StoreResult<Option<Driver>>;
    fn drivers(&self) -> StoreResult<Vec<Driver>>;

    fn customer(&self, id: CustomerId) -> StoreResult<Option<Customer>>;

    /// Events for one order in insertion order.
    fn tracking_events(&self, order_id: OrderId) -> StoreResult<Vec<TrackingEvent>>;

    fn commit(&self, changes: Changeset) -> StoreResult<()>;
}
