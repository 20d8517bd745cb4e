use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::engine::queue::enqueue_order;
use crate::engine::scoring::rank;
use crate::error::AppError;
use crate::geo::proximity::Ranking;
use crate::models::order::{OrderId, OrderStatus};
use crate::state::AppState;

enum Outcome {
    Assigned,
    Requeued,
    Skipped,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Assigned => "assigned",
            Outcome::Requeued => "requeued",
            Outcome::Skipped => "skipped",
        }
    }
}

/// Matches queued PENDING orders to the best nearby ONLINE driver.
pub async fn run_auto_dispatch(state: Arc<AppState>, mut order_rx: mpsc::Receiver<OrderId>) {
    info!(
        radius_km = state.auto_dispatch.radius_km,
        "auto-dispatch started"
    );

    while let Some(order_id) = order_rx.recv().await {
        state.metrics.orders_in_dispatch_queue.dec();

        let start = Instant::now();
        let label = match process_order(&state, order_id).await {
            Ok(outcome) => outcome.label(),
            Err(err) if is_transient(&err) => {
                warn!(order_id, error = %err, "auto-dispatch failed; re-queueing order");
                schedule_retry(state.clone(), order_id);
                "error"
            }
            Err(err) => {
                error!(
                    order_id,
                    error = %err,
                    "auto-dispatch failed; order left for manual assignment"
                );
                "error"
            }
        };
        state
            .metrics
            .assignment_latency_seconds
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());
    }

    warn!("auto-dispatch stopped: queue channel closed");
}

async fn process_order(state: &Arc<AppState>, order_id: OrderId) -> Result<Outcome, AppError> {
    let order = state.service.order(order_id)?;
    if order.status != OrderStatus::Pending {
        debug!(order_id, status = %order.status, "order left PENDING; dropping from queue");
        return Ok(Outcome::Skipped);
    }

    let candidates = state.service.find_nearby_drivers(
        order.pickup.location,
        state.auto_dispatch.radius_km,
        Ranking::Unordered,
    )?;

    for (candidate, score) in rank(candidates) {
        let driver_id = candidate.driver.id;
        match state.service.assign_driver(order_id, driver_id).await {
            Ok(_) => {
                info!(
                    order_id,
                    driver_id,
                    score,
                    distance_km = candidate.distance_km,
                    "order auto-assigned"
                );
                return Ok(Outcome::Assigned);
            }
            Err(AppError::DriverUnavailable(reason)) => {
                debug!(order_id, driver_id, %reason, "candidate taken; trying next");
            }
            Err(AppError::InvalidState(reason)) => {
                debug!(order_id, %reason, "order assigned elsewhere");
                return Ok(Outcome::Skipped);
            }
            Err(err) => return Err(err),
        }
    }

    warn!(order_id, "no eligible drivers; re-queueing order");
    schedule_retry(state.clone(), order_id);
    Ok(Outcome::Requeued)
}

/// Storage hiccups leave the order PENDING, so it is worth another pass.
fn is_transient(err: &AppError) -> bool {
    matches!(err, AppError::Store(_) | AppError::Internal(_))
}

fn schedule_retry(state: Arc<AppState>, order_id: OrderId) {
    tokio::spawn(async move {
        sleep(state.auto_dispatch.retry_delay).await;
        if let Err(err) = enqueue_order(&state, order_id).await {
            warn!(order_id, error = %err, "failed to re-queue order");
        }
    });
}
