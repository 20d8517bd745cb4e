use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::dispatch::DispatchCoordinator;
use crate::engine::ledger::TrackingLedger;
use crate::engine::locks::EntityLocks;
use crate::engine::pricing::PricingEngine;
use crate::engine::state_machine::{OrderStateMachine, TransitionContext};
use crate::error::AppError;
use crate::geo::proximity::{self, NearbyDriver, Ranking};
use crate::models::customer::{Customer, CustomerId};
use crate::models::driver::{Availability, Driver, DriverId, DriverStats, GeoPoint, success_rate};
use crate::models::order::{
    DeliveryOrder, DeliveryProof, OrderId, OrderStatus, OrderTimeline, PackageDetails, Rating,
    Schedule, Stop,
};
use crate::models::quote::Quote;
use crate::models::tracking::TrackingEvent;
use crate::notify::{Notifier, NotifyError};
use crate::observability::metrics::Metrics;
use crate::store::{Changeset, Store};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_type: String,
    pub vehicle_plate: String,
    pub license_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub pickup: Stop,
    pub delivery: Stop,
    pub package: PackageDetails,
    #[serde(default)]
    pub schedule: Schedule,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub proof: Option<DeliveryProof>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            location: None,
            notes: None,
            reason: None,
            proof: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaterRole {
    Customer,
    Driver,
}

impl RaterRole {
    pub fn as_str(self) -> &'static str {
        match self {
            RaterRole::Customer => "customer",
            RaterRole::Driver => "driver",
        }
    }
}

/// Who is asking, as established by the caller's authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(CustomerId),
    Driver(DriverId),
    Dispatcher,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverStatistics {
    pub driver_id: DriverId,
    pub total_deliveries: u32,
    pub completed_deliveries: u32,
    pub cancelled_deliveries: u32,
    pub total_earnings: f64,
    pub rating: f64,
    pub success_rate: f64,
}

/// Entry point of the dispatch core for the surrounding service layer.
pub struct DeliveryService {
    store: Arc<dyn Store>,
    pricing: PricingEngine,
    ledger: TrackingLedger,
    locks: Arc<EntityLocks>,
    dispatch: DispatchCoordinator,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
}

impl DeliveryService {
    pub fn new(
        store: Arc<dyn Store>,
        pricing: PricingEngine,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
    ) -> Self {
        let ledger = TrackingLedger::new(store.clone());
        let locks = Arc::new(EntityLocks::new());
        let machine = OrderStateMachine::new(ledger.clone());
        let dispatch = DispatchCoordinator::new(store.clone(), locks.clone(), machine);

        Self {
            store,
            pricing,
            ledger,
            locks,
            dispatch,
            notifier,
            metrics,
        }
    }

    pub fn register_customer(&self, profile: NewCustomer) -> Result<Customer, AppError> {
        if profile.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name cannot be empty".to_string()));
        }
        if !profile.email.contains('@') {
            return Err(AppError::InvalidInput(format!(
                "invalid email address: {}",
                profile.email
            )));
        }

        let customer = Customer {
            id: self.store.next_customer_id(),
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            total_orders: 0,
            rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        };
        self.store
            .commit(Changeset::new().customer(customer.clone()))?;

        info!(customer_id = customer.id, "customer registered");
        Ok(customer)
    }

    pub fn register_driver(&self, profile: NewDriver) -> Result<Driver, AppError> {
        if profile.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name cannot be empty".to_string()));
        }
        if profile.license_number.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "license number cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let driver = Driver {
            id: self.store.next_driver_id(),
            name: profile.name,
            phone: profile.phone,
            vehicle_type: profile.vehicle_type,
            vehicle_plate: profile.vehicle_plate,
            license_number: profile.license_number,
            location: None,
            location_updated_at: None,
            availability: Availability::Offline,
            stats: DriverStats::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.commit(Changeset::new().driver(driver.clone()))?;

        info!(driver_id = driver.id, "driver registered");
        Ok(driver)
    }

    pub fn customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.store
            .customer(id)?
            .ok_or_else(|| AppError::NotFound(format!("customer {id} not found")))
    }

    pub fn driver(&self, id: DriverId) -> Result<Driver, AppError> {
        self.store
            .driver(id)?
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    pub fn drivers(&self) -> Result<Vec<Driver>, AppError> {
        Ok(self.store.drivers()?)
    }

    pub fn order(&self, id: OrderId) -> Result<DeliveryOrder, AppError> {
        self.store
            .order(id)?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub fn order_by_number(&self, order_number: &str) -> Result<DeliveryOrder, AppError> {
        self.store
            .order_by_number(order_number)?
            .ok_or_else(|| AppError::NotFound(format!("order {order_number} not found")))
    }

    pub fn customer_orders(&self, customer_id: CustomerId) -> Result<Vec<DeliveryOrder>, AppError> {
        self.customer(customer_id)?;
        Ok(self.store.orders_for_customer(customer_id)?)
    }

    pub fn driver_orders(&self, driver_id: DriverId) -> Result<Vec<DeliveryOrder>, AppError> {
        self.driver(driver_id)?;
        Ok(self.store.orders_for_driver(driver_id)?)
    }

    pub fn active_driver_orders(&self, driver_id: DriverId) -> Result<Vec<DeliveryOrder>, AppError> {
        Ok(self
            .driver_orders(driver_id)?
            .into_iter()
            .filter(|order| order.active_driver() == Some(driver_id))
            .collect())
    }

    pub fn estimate_price(
        &self,
        pickup: &GeoPoint,
        delivery: &GeoPoint,
        weight_kg: f64,
        promo_code: Option<&str>,
    ) -> Result<Quote, AppError> {
        self.pricing
            .quote_route(pickup, delivery, weight_kg, promo_code, Utc::now())
    }

    /// Prices the trip once, stores the order as PENDING and records the
    /// first tracking event.
    pub async fn create_order(&self, request: NewOrder) -> Result<DeliveryOrder, AppError> {
        for stop in [&request.pickup, &request.delivery] {
            if stop.address.trim().is_empty() {
                return Err(AppError::InvalidInput("address cannot be empty".to_string()));
            }
        }

        let now = Utc::now();
        let quote = self.pricing.quote_route(
            &request.pickup.location,
            &request.delivery.location,
            request.package.weight_kg,
            request.promo_code.as_deref(),
            now,
        )?;

        let _customer_guard = self.locks.customer(request.customer_id).await;
        let mut customer = self.customer(request.customer_id)?;

        let order = DeliveryOrder {
            id: self.store.next_order_id(),
            order_number: self.allocate_order_number(now)?,
            customer_id: customer.id,
            driver_id: None,
            status: OrderStatus::Pending,
            pickup: request.pickup,
            delivery: request.delivery,
            package: request.package,
            schedule: request.schedule,
            promo_code: request.promo_code,
            quote,
            timeline: OrderTimeline::new(now),
            proof: None,
            failure_reason: None,
            cancellation_reason: None,
            customer_rating: None,
            driver_rating: None,
        };
        customer.total_orders += 1;

        let event = self.ledger.record(
            order.id,
            OrderStatus::Pending,
            Some(order.pickup.location),
            Some("order created".to_string()),
            now,
        );
        self.store.commit(
            Changeset::new()
                .order(order.clone())
                .customer(customer)
                .event(event),
        )?;

        self.metrics.orders_created_total.inc();
        info!(
            order_id = order.id,
            order_number = %order.order_number,
            customer_id = order.customer_id,
            total_amount = order.quote.total_amount,
            "order created"
        );
        self.notify("order_created", self.notifier.order_created(&order));

        Ok(order)
    }

    pub async fn assign_driver(
        &self,
        order_id: OrderId,
        driver_id: DriverId,
    ) -> Result<DeliveryOrder, AppError> {
        match self.dispatch.assign(order_id, driver_id).await {
            Ok((order, driver)) => {
                self.metrics
                    .assignments_total
                    .with_label_values(&["success"])
                    .inc();
                self.metrics
                    .status_transitions_total
                    .with_label_values(&[OrderStatus::Assigned.as_str()])
                    .inc();
                self.notify(
                    "driver_assigned",
                    self.notifier.driver_assigned(&order, &driver),
                );
                Ok(order)
            }
            Err(err) => {
                self.metrics
                    .assignments_total
                    .with_label_values(&["rejected"])
                    .inc();
                Err(err)
            }
        }
    }

    pub async fn advance_status(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<DeliveryOrder, AppError> {
        let ctx = TransitionContext {
            location: update.location,
            note: update.notes,
            reason: update.reason,
            proof: update.proof,
        };
        self.apply_transition(order_id, update.status, ctx).await
    }

    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: impl Into<String>,
    ) -> Result<DeliveryOrder, AppError> {
        let ctx = TransitionContext {
            reason: Some(reason.into()),
            ..TransitionContext::default()
        };
        self.apply_transition(order_id, OrderStatus::Cancelled, ctx)
            .await
    }

    async fn apply_transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        ctx: TransitionContext,
    ) -> Result<DeliveryOrder, AppError> {
        let (order, _driver) = self.dispatch.transition(order_id, target, ctx).await?;

        self.metrics
            .status_transitions_total
            .with_label_values(&[order.status.as_str()])
            .inc();

        if order.status == OrderStatus::Cancelled {
            self.notify("order_cancelled", self.notifier.order_cancelled(&order));
        } else {
            self.notify("status_changed", self.notifier.status_changed(&order));
        }

        Ok(order)
    }

    /// Post-delivery rating; each side rates once and moves the other
    /// party's rolling average.
    pub async fn rate_order(
        &self,
        order_id: OrderId,
        role: RaterRole,
        score: f64,
        feedback: Option<String>,
    ) -> Result<DeliveryOrder, AppError> {
        if !(1.0..=5.0).contains(&score) {
            return Err(AppError::InvalidInput(format!(
                "rating must be between 1.0 and 5.0, got {score}"
            )));
        }

        let _order_guard = self.locks.order(order_id).await;
        let mut order = self.order(order_id)?;

        if order.status != OrderStatus::Delivered {
            return Err(AppError::InvalidState(format!(
                "order {} is {}; only DELIVERED orders can be rated",
                order.order_number, order.status
            )));
        }

        let rating = Rating { score, feedback };
        let already_rated = match role {
            RaterRole::Customer => order.customer_rating.replace(rating).is_some(),
            RaterRole::Driver => order.driver_rating.replace(rating).is_some(),
        };
        if already_rated {
            return Err(AppError::InvalidState(format!(
                "order {} was already rated by its {}",
                order.order_number,
                role.as_str()
            )));
        }

        let mut changes = Changeset::new().order(order.clone());
        match role {
            RaterRole::Customer => {
                let _driver_guard = match order.driver_id {
                    Some(driver_id) => {
                        let guard = self.locks.driver(driver_id).await;
                        let mut driver = self.driver(driver_id)?;
                        driver.record_rating(score);
                        changes = changes.driver(driver);
                        Some(guard)
                    }
                    None => None,
                };
                self.store.commit(changes)?;
            }
            RaterRole::Driver => {
                let _customer_guard = self.locks.customer(order.customer_id).await;
                let mut customer = self.customer(order.customer_id)?;
                customer.record_rating(score);
                changes = changes.customer(customer);
                self.store.commit(changes)?;
            }
        }

        info!(
            order_id = order.id,
            order_number = %order.order_number,
            role = role.as_str(),
            score,
            "order rated"
        );
        Ok(order)
    }

    pub fn find_nearby_drivers(
        &self,
        center: GeoPoint,
        radius_km: f64,
        ranking: Ranking,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        center.validate()?;
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "radius must be a positive number of kilometres, got {radius_km}"
            )));
        }

        let pool = self.store.drivers()?;
        Ok(proximity::find_within(center, radius_km, pool, ranking))
    }

    pub fn top_drivers(&self, limit: usize) -> Result<Vec<Driver>, AppError> {
        let mut drivers = self.store.drivers()?;
        drivers.sort_by(|a, b| {
            b.stats
                .rating
                .total_cmp(&a.stats.rating)
                .then(b.stats.completed_deliveries.cmp(&a.stats.completed_deliveries))
        });
        drivers.truncate(limit);
        Ok(drivers)
    }

    pub fn tracking_history(&self, order_number: &str) -> Result<Vec<TrackingEvent>, AppError> {
        let order = self.order_by_number(order_number)?;
        self.ledger.history(order.id)
    }

    /// Last-writer-wins location ping. A driver on an active order also
    /// leaves a ping in that order's ledger.
    pub async fn update_driver_location(
        &self,
        driver_id: DriverId,
        location: GeoPoint,
    ) -> Result<Driver, AppError> {
        location.validate()?;

        let _driver_guard = self.locks.driver(driver_id).await;
        let mut driver = self.driver(driver_id)?;

        let now = Utc::now();
        driver.location = Some(location);
        driver.location_updated_at = Some(now);
        driver.updated_at = now;

        let mut changes = Changeset::new().driver(driver.clone());
        if driver.availability == Availability::Busy {
            let active = self
                .store
                .orders_for_driver(driver_id)?
                .into_iter()
                .find(|order| order.active_driver() == Some(driver_id));
            if let Some(order) = active {
                changes = changes.event(self.ledger.record(
                    order.id,
                    order.status,
                    Some(location),
                    Some("location update".to_string()),
                    now,
                ));
            }
        }
        self.store.commit(changes)?;

        debug!(
            driver_id,
            lat = location.lat,
            lng = location.lng,
            "driver location updated"
        );
        Ok(driver)
    }

    /// Drivers toggle between OFFLINE and ONLINE; BUSY belongs to dispatch.
    pub async fn update_availability(
        &self,
        driver_id: DriverId,
        availability: Availability,
    ) -> Result<Driver, AppError> {
        if availability == Availability::Busy {
            return Err(AppError::InvalidInput(
                "BUSY is set by dispatch, not by the driver".to_string(),
            ));
        }

        let _driver_guard = self.locks.driver(driver_id).await;
        let mut driver = self.driver(driver_id)?;

        if driver.availability == Availability::Busy {
            return Err(AppError::InvalidState(format!(
                "driver {driver_id} is on an active delivery"
            )));
        }

        driver.availability = availability;
        driver.updated_at = Utc::now();
        self.store.commit(Changeset::new().driver(driver.clone()))?;

        info!(driver_id, availability = ?availability, "driver availability updated");
        Ok(driver)
    }

    pub fn driver_statistics(&self, driver_id: DriverId) -> Result<DriverStatistics, AppError> {
        let driver = self.driver(driver_id)?;
        Ok(DriverStatistics {
            driver_id: driver.id,
            total_deliveries: driver.stats.total_deliveries,
            completed_deliveries: driver.stats.completed_deliveries,
            cancelled_deliveries: driver.stats.cancelled_deliveries,
            total_earnings: driver.stats.total_earnings,
            rating: driver.stats.rating,
            success_rate: success_rate(&driver.stats),
        })
    }

    /// Access query for callers: customers see their own orders, drivers
    /// the orders bound to them, dispatchers everything.
    pub fn authorize(&self, order_id: OrderId, actor: Actor) -> Result<DeliveryOrder, AppError> {
        let order = self.order(order_id)?;
        let allowed = match actor {
            Actor::Dispatcher => true,
            Actor::Customer(customer_id) => order.customer_id == customer_id,
            Actor::Driver(driver_id) => order.driver_id == Some(driver_id),
        };

        if allowed {
            Ok(order)
        } else {
            Err(AppError::AccessDenied(format!(
                "{actor:?} may not act on order {}",
                order.order_number
            )))
        }
    }

    /// Like `authorize`, but the actor must also be the party `role` names.
    /// Dispatchers may record either side.
    pub fn authorize_rating(
        &self,
        order_id: OrderId,
        actor: Actor,
        role: RaterRole,
    ) -> Result<DeliveryOrder, AppError> {
        let order = self.authorize(order_id, actor)?;
        let matches = match (actor, role) {
            (Actor::Dispatcher, _) => true,
            (Actor::Customer(_), RaterRole::Customer) => true,
            (Actor::Driver(_), RaterRole::Driver) => true,
            _ => false,
        };

        if matches {
            Ok(order)
        } else {
            Err(AppError::AccessDenied(format!(
                "{actor:?} may not rate order {} as {}",
                order.order_number,
                role.as_str()
            )))
        }
    }

    fn allocate_order_number(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
            let candidate = format!("ORD-{}-{suffix}", now.format("%Y%m%d"));
            if self.store.order_by_number(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal(
            "could not allocate a unique order number".to_string(),
        ))
    }

    fn notify(&self, trigger: &'static str, result: Result<(), NotifyError>) {
        if let Err(err) = result {
            self.metrics.notification_failures_total.inc();
            warn!(trigger, error = %err, "notification failed");
        }
    }
}
