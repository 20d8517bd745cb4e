use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;

use crate::error::AppError;
use crate::models::tracking::TrackingEvent;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tracking/:order_number", get(tracking_history))
}

/// Newest event first.
async fn tracking_history(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<Json<Vec<TrackingEvent>>, AppError> {
    Ok(Json(state.service.tracking_history(&order_number)?))
}
