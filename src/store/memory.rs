use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::models::customer::{Customer, CustomerId};
use crate::models::driver::{Driver, DriverId};
use crate::models::order::{DeliveryOrder, OrderId};
use crate::models::tracking::{EventId, TrackingEvent};
use crate::store::{Changeset, Store, StoreError, StoreResult};

pub struct InMemoryStore {
    orders: DashMap<OrderId, DeliveryOrder>,
    order_numbers: DashMap<String, OrderId>,
    drivers: DashMap<DriverId, Driver>,
    customers: DashMap<CustomerId, Customer>,
    events: DashMap<OrderId, Vec<TrackingEvent>>,
    event_ids: DashMap<EventId, OrderId>,
    order_seq: AtomicU64,
    driver_seq: AtomicU64,
    customer_seq: AtomicU64,
    event_seq: AtomicU64,
    // Commits hold it for writing and every read holds it for reading, so no
    // reader sees a changeset half applied.
    visibility: RwLock<()>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            order_numbers: DashMap::new(),
            drivers: DashMap::new(),
            customers: DashMap::new(),
            events: DashMap::new(),
            event_ids: DashMap::new(),
            order_seq: AtomicU64::new(1),
            driver_seq: AtomicU64::new(1),
            customer_seq: AtomicU64::new(1),
            event_seq: AtomicU64::new(1),
            visibility: RwLock::new(()),
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    fn read_guard(&self) -> StoreResult<RwLockReadGuard<'_, ()>> {
        self.visibility
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn order_unlocked(&self, id: OrderId) -> Option<DeliveryOrder> {
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    fn validate(&self, changes: &Changeset) -> StoreResult<()> {
        let mut seen = HashSet::new();
        for event in &changes.events {
            if !seen.insert(event.id) || self.event_ids.contains_key(&event.id) {
                return Err(StoreError::DuplicateEvent(event.id));
            }
        }

        for order in &changes.orders {
            if let Some(owner) = self.order_numbers.get(&order.order_number) {
                if *owner != order.id {
                    return Err(StoreError::DuplicateOrderNumber(order.order_number.clone()));
                }
            }
        }

        Ok(())
    }
}

fn collect_sorted<T: Clone>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> u64) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(|item| key(item));
    items
}

impl Store for InMemoryStore {
    fn next_order_id(&self) -> OrderId {
        self.order_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn next_driver_id(&self) -> DriverId {
        self.driver_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn next_customer_id(&self) -> CustomerId {
        self.customer_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn next_event_id(&self) -> EventId {
        self.event_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn order(&self, id: OrderId) -> StoreResult<Option<DeliveryOrder>> {
        let _guard = self.read_guard()?;
        Ok(self.order_unlocked(id))
    }

    fn order_by_number(&self, order_number: &str) -> StoreResult<Option<DeliveryOrder>> {
        let _guard = self.read_guard()?;
        let Some(id) = self.order_numbers.get(order_number).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.order_unlocked(id))
    }

    fn orders_for_customer(&self, customer_id: CustomerId) -> StoreResult<Vec<DeliveryOrder>> {
        let _guard = self.read_guard()?;
        Ok(collect_sorted(
            self.orders
                .iter()
                .filter(|entry| entry.customer_id == customer_id)
                .map(|entry| entry.value().clone()),
            |order| order.id,
        ))
    }

    fn orders_for_driver(&self, driver_id: DriverId) -> StoreResult<Vec<DeliveryOrder>> {
        let _guard = self.read_guard()?;
        Ok(collect_sorted(
            self.orders
                .iter()
                .filter(|entry| entry.driver_id == Some(driver_id))
                .map(|entry| entry.value().clone()),
            |order| order.id,
        ))
    }

    fn driver(&self, id: DriverId) -> StoreResult<Option<Driver>> {
        let _guard = self.read_guard()?;
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    fn drivers(&self) -> StoreResult<Vec<Driver>> {
        let _guard = self.read_guard()?;
        Ok(collect_sorted(
            self.drivers.iter().map(|entry| entry.value().clone()),
            |driver| driver.id,
        ))
    }

    fn customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let _guard = self.read_guard()?;
        Ok(self.customers.get(&id).map(|entry| entry.value().clone()))
    }

    fn tracking_events(&self, order_id: OrderId) -> StoreResult<Vec<TrackingEvent>> {
        let _guard = self.read_guard()?;
        Ok(self
            .events
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    fn commit(&self, changes: Changeset) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let _guard = self
            .visibility
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        self.validate(&changes)?;

        for customer in changes.customers {
            self.customers.insert(customer.id, customer);
        }
        for driver in changes.drivers {
            self.drivers.insert(driver.id, driver);
        }
        for order in changes.orders {
            self.order_numbers
                .insert(order.order_number.clone(), order.id);
            self.orders.insert(order.id, order);
        }
        for event in changes.events {
            self.event_ids.insert(event.id, event.order_id);
            self.events.entry(event.order_id).or_default().push(event);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Utc;

    use super::*;
    use crate::models::driver::{Availability, DriverStats};
    use crate::models::order::{OrderStatus, OrderTimeline, PackageDetails, Schedule, Stop};
    use crate::models::quote::Quote;

    fn event(id: EventId, order_id: OrderId) -> TrackingEvent {
        TrackingEvent {
            id,
            order_id,
            status: OrderStatus::Pending,
            location: None,
            note: None,
            recorded_at: Utc::now(),
        }
    }

    fn customer(id: CustomerId) -> Customer {
        Customer {
            id,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            total_orders: 0,
            rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        }
    }

    fn driver(id: DriverId, availability: Availability) -> Driver {
        Driver {
            id,
            name: format!("driver-{id}"),
            phone: None,
            vehicle_type: "bike".to_string(),
            vehicle_plate: format!("B-{id}"),
            license_number: format!("L-{id}"),
            location: None,
            location_updated_at: None,
            availability,
            stats: DriverStats::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order(id: OrderId, status: OrderStatus, driver_id: Option<DriverId>) -> DeliveryOrder {
        let stop = Stop {
            address: "1 Test Street".to_string(),
            location: crate::models::driver::GeoPoint::new(0.0, 0.0),
            contact_name: None,
            contact_phone: None,
        };
        DeliveryOrder {
            id,
            order_number: format!("ORD-20240101-{id:08X}"),
            customer_id: 1,
            driver_id,
            status,
            pickup: stop.clone(),
            delivery: stop,
            package: PackageDetails {
                package_type: "parcel".to_string(),
                weight_kg: 1.0,
                dimensions: None,
                special_instructions: None,
            },
            schedule: Schedule::default(),
            promo_code: None,
            quote: Quote {
                distance_km: 0.0,
                base_fare: 5.0,
                distance_charge: 0.0,
                weight_charge: 0.0,
                peak_hour_surcharge: 0.0,
                discount: 0.0,
                total_amount: 5.0,
                estimated_minutes: 0,
            },
            timeline: OrderTimeline::new(Utc::now()),
            proof: None,
            failure_reason: None,
            cancellation_reason: None,
            customer_rating: None,
            driver_rating: None,
        }
    }

    #[test]
    fn sequences_start_at_one_and_increase() {
        let store = InMemoryStore::new();
        assert_eq!(store.next_order_id(), 1);
        assert_eq!(store.next_order_id(), 2);
        assert_eq!(store.next_event_id(), 1);
    }

    #[test]
    fn events_keep_insertion_order() {
        let store = InMemoryStore::new();
        store
            .commit(Changeset::new().event(event(1, 7)).event(event(2, 7)))
            .unwrap();
        store.commit(Changeset::new().event(event(3, 7))).unwrap();

        let ids: Vec<EventId> = store
            .tracking_events(7)
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_event_rejects_whole_changeset() {
        let store = InMemoryStore::new();
        store.commit(Changeset::new().event(event(1, 7))).unwrap();

        let result = store.commit(Changeset::new().customer(customer(5)).event(event(1, 7)));

        assert!(matches!(result, Err(StoreError::DuplicateEvent(1))));
        assert!(store.customer(5).unwrap().is_none());
        assert_eq!(store.tracking_events(7).unwrap().len(), 1);
    }

    #[test]
    fn missing_entities_are_none() {
        let store = InMemoryStore::new();
        assert!(store.order(1).unwrap().is_none());
        assert!(store.order_by_number("ORD-X").unwrap().is_none());
        assert!(store.driver(1).unwrap().is_none());
        assert!(store.tracking_events(1).unwrap().is_empty());
    }

    #[test]
    fn readers_never_see_a_busy_driver_beside_a_pending_order() {
        const PAIRS: u64 = 500;
        let store = Arc::new(InMemoryStore::new());
        for id in 1..=PAIRS {
            store
                .commit(
                    Changeset::new()
                        .driver(driver(id, Availability::Online))
                        .order(order(id, OrderStatus::Pending, None)),
                )
                .unwrap();
        }

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for id in 1..=PAIRS {
                    store
                        .commit(
                            Changeset::new()
                                .driver(driver(id, Availability::Busy))
                                .order(order(id, OrderStatus::Assigned, Some(id))),
                        )
                        .unwrap();
                }
            })
        };

        // Driver first, then order: once BUSY is visible its order must be too.
        for id in 1..=PAIRS {
            loop {
                let seen = store.driver(id).unwrap().unwrap();
                if seen.availability == Availability::Busy {
                    let bound = store.order(id).unwrap().unwrap();
                    assert_eq!(bound.status, OrderStatus::Assigned);
                    assert_eq!(bound.driver_id, Some(id));
                    break;
                }
                thread::yield_now();
            }
        }

        writer.join().unwrap();
    }
}
