use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::engine::locks::EntityLocks;
use crate::engine::state_machine::{OrderStateMachine, TransitionContext};
use crate::error::AppError;
use crate::models::driver::{Availability, Driver, DriverId};
use crate::models::order::{DeliveryOrder, OrderId, OrderStatus};
use crate::store::Store;

pub fn hold(driver: &mut Driver, now: DateTime<Utc>) {
    driver.availability = Availability::Busy;
    driver.updated_at = now;
}

/// Returns a driver to ONLINE. A missing driver is a no-op.
pub fn release(driver: Option<&mut Driver>, now: DateTime<Utc>) {
    if let Some(driver) = driver {
        driver.availability = Availability::Online;
        driver.updated_at = now;
    }
}

/// Serializes every read-check-write on an order and its driver.
pub struct DispatchCoordinator {
    store: Arc<dyn Store>,
    locks: Arc<EntityLocks>,
    machine: OrderStateMachine,
}

impl DispatchCoordinator {
    pub fn new(store: Arc<dyn Store>, locks: Arc<EntityLocks>, machine: OrderStateMachine) -> Self {
        Self {
            store,
            locks,
            machine,
        }
    }

    /// Binds `driver_id` to a PENDING order and marks the driver BUSY.
    ///
    /// The order and driver locks are both held from the first read to the
    /// commit, so a driver that loses a race is seen as BUSY and rejected
    /// with `DriverUnavailable`.
    pub async fn assign(
        &self,
        order_id: OrderId,
        driver_id: DriverId,
    ) -> Result<(DeliveryOrder, Driver), AppError> {
        let _order_guard = self.locks.order(order_id).await;
        let order = self
            .store
            .order(order_id)?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "order {} is {}; only PENDING orders can be assigned",
                order.order_number, order.status
            )));
        }

        let _driver_guard = self.locks.driver(driver_id).await;
        let driver = self
            .store
            .driver(driver_id)?
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        if !driver.is_assignable() {
            return Err(AppError::DriverUnavailable(format!(
                "driver {} is {:?}",
                driver.id, driver.availability
            )));
        }

        let ctx = TransitionContext {
            location: driver.location,
            note: Some(format!("driver {} assigned", driver.id)),
            ..TransitionContext::default()
        };
        let transition =
            self.machine
                .transition(&order, Some(&driver), OrderStatus::Assigned, ctx, Utc::now())?;

        let assigned = transition.order.clone();
        let held = transition
            .driver
            .clone()
            .ok_or_else(|| AppError::Internal("assignment produced no driver".to_string()))?;
        self.store.commit(transition.into_changeset())?;

        info!(
            order_id = assigned.id,
            order_number = %assigned.order_number,
            driver_id = held.id,
            "driver assigned"
        );

        Ok((assigned, held))
    }

    /// Moves an order along the status graph. Terminal targets release the
    /// bound driver in the same commit.
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        ctx: TransitionContext,
    ) -> Result<(DeliveryOrder, Option<Driver>), AppError> {
        if target == OrderStatus::Assigned {
            return Err(AppError::InvalidInput(
                "drivers are bound through assignment, not status updates".to_string(),
            ));
        }

        let _order_guard = self.locks.order(order_id).await;
        let order = self
            .store
            .order(order_id)?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let (_driver_guard, driver) = match order.active_driver() {
            Some(driver_id) => {
                let guard = self.locks.driver(driver_id).await;
                let driver = self.store.driver(driver_id)?.ok_or_else(|| {
                    AppError::Internal(format!(
                        "order {} references missing driver {driver_id}",
                        order.order_number
                    ))
                })?;
                (Some(guard), Some(driver))
            }
            None => (None, None),
        };

        let transition = self
            .machine
            .transition(&order, driver.as_ref(), target, ctx, Utc::now())?;

        let updated = transition.order.clone();
        let driver = transition.driver.clone();
        self.store.commit(transition.into_changeset())?;

        info!(
            order_id = updated.id,
            order_number = %updated.order_number,
            from = %order.status,
            to = %updated.status,
            "order status changed"
        );

        Ok((updated, driver))
    }
}
