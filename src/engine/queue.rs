use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::order::OrderId;
use crate::state::AppState;

pub async fn enqueue_order(state: &AppState, order_id: OrderId) -> Result<(), AppError> {
    state
        .dispatch_tx
        .send(order_id)
        .await
        .map_err(|err| AppError::Internal(format!("dispatch queue send failed: {err}")))?;

    state.metrics.orders_in_dispatch_queue.inc();
    Ok(())
}

/// Queues `order_id` without waiting on the matcher. A full queue hands the
/// send to a background task; only a closed queue is an error.
pub fn offer_order(state: &Arc<AppState>, order_id: OrderId) -> Result<(), AppError> {
    match state.dispatch_tx.try_send(order_id) {
        Ok(()) => {
            state.metrics.orders_in_dispatch_queue.inc();
            Ok(())
        }
        Err(TrySendError::Full(order_id)) => {
            debug!(order_id, "dispatch queue full; queueing in background");
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(err) = enqueue_order(&state, order_id).await {
                    warn!(order_id, error = %err, "order not queued for auto-dispatch");
                }
            });
            Ok(())
        }
        Err(TrySendError::Closed(_)) => {
            Err(AppError::Internal("dispatch queue closed".to_string()))
        }
    }
}
