use chrono::{DateTime, Utc};

use crate::engine::dispatch;
use crate::engine::ledger::TrackingLedger;
use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::order::{DeliveryOrder, DeliveryProof, OrderStatus};
use crate::models::tracking::TrackingEvent;
use crate::store::Changeset;

#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    pub location: Option<GeoPoint>,
    pub note: Option<String>,
    /// Recorded on FAILED and CANCELLED.
    pub reason: Option<String>,
    /// Recorded on DELIVERED.
    pub proof: Option<DeliveryProof>,
}

/// The updated entities of one transition, ready to commit together.
#[derive(Debug, Clone)]
pub struct Transition {
    pub order: DeliveryOrder,
    pub driver: Option<Driver>,
    pub event: TrackingEvent,
}

impl Transition {
    pub fn into_changeset(self) -> Changeset {
        let changes = Changeset::new().order(self.order).event(self.event);
        match self.driver {
            Some(driver) => changes.driver(driver),
            None => changes,
        }
    }
}

/// Enforces the status graph and the side effects tied to each edge.
///
/// The machine never touches storage. It returns the new order, the
/// updated driver (when one is bound) and the tracking event, and the
/// caller commits all three as one changeset. Who may request a transition
/// is the caller's concern.
#[derive(Clone)]
pub struct OrderStateMachine {
    ledger: TrackingLedger,
}

impl OrderStateMachine {
    pub fn new(ledger: TrackingLedger) -> Self {
        Self { ledger }
    }

    /// `driver` is the driver to bind for ASSIGNED, otherwise the order's
    /// currently bound driver.
    pub fn transition(
        &self,
        order: &DeliveryOrder,
        driver: Option<&Driver>,
        target: OrderStatus,
        ctx: TransitionContext,
        now: DateTime<Utc>,
    ) -> Result<Transition, AppError> {
        if !order.status.can_transition_to(target) {
            return Err(AppError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }

        match (target, driver) {
            (OrderStatus::Assigned, None) => {
                return Err(AppError::InvalidInput(
                    "assignment requires a driver".to_string(),
                ));
            }
            (OrderStatus::Assigned, Some(_)) => {}
            (_, driver) if driver.map(|d| d.id) != order.driver_id => {
                return Err(AppError::Internal(format!(
                    "order {} is bound to driver {:?} but {:?} was supplied",
                    order.id,
                    order.driver_id,
                    driver.map(|d| d.id)
                )));
            }
            _ => {}
        }

        let mut next = order.clone();
        let mut driver = driver.cloned();
        next.status = target;

        match target {
            OrderStatus::Assigned => {
                if let Some(driver) = driver.as_mut() {
                    next.driver_id = Some(driver.id);
                    dispatch::hold(driver, now);
                }
                next.timeline.assigned_at = Some(now);
            }
            OrderStatus::PickedUp => {
                next.timeline.picked_up_at = Some(now);
            }
            OrderStatus::InTransit => {
                next.timeline.in_transit_at = Some(now);
            }
            OrderStatus::Delivered => {
                next.timeline.delivered_at = Some(now);
                next.proof = ctx.proof.clone();
                if let Some(driver) = driver.as_mut() {
                    driver.stats.total_deliveries += 1;
                    driver.stats.completed_deliveries += 1;
                    driver.stats.total_earnings += order.quote.total_amount;
                }
                dispatch::release(driver.as_mut(), now);
            }
            OrderStatus::Failed => {
                next.timeline.failed_at = Some(now);
                next.failure_reason = ctx.reason.clone();
                if let Some(driver) = driver.as_mut() {
                    driver.stats.total_deliveries += 1;
                }
                dispatch::release(driver.as_mut(), now);
            }
            OrderStatus::Cancelled => {
                next.timeline.cancelled_at = Some(now);
                next.cancellation_reason = ctx.reason.clone();
                if let Some(driver) = driver.as_mut() {
                    driver.stats.total_deliveries += 1;
                    driver.stats.cancelled_deliveries += 1;
                }
                dispatch::release(driver.as_mut(), now);
            }
            OrderStatus::Pending => {
                return Err(AppError::InvalidTransition {
                    from: order.status,
                    to: target,
                });
            }
        }

        let note = ctx.note.or(ctx.reason);
        let event = self
            .ledger
            .record(next.id, target, ctx.location, note, now);

        Ok(Transition {
            order: next,
            driver,
            event,
        })
    }
}
