pub mod customers;
pub mod drivers;
pub mod orders;
pub mod tracking;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::service::Actor;
use crate::error::AppError;
use crate::state::AppState;

pub const CUSTOMER_HEADER: &str = "x-customer-id";
pub const DRIVER_HEADER: &str = "x-driver-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(customers::router())
        .merge(drivers::router())
        .merge(orders::router())
        .merge(tracking::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Resolves the caller identity forwarded by the authenticating proxy.
/// Requests without an identity header act as the dispatcher.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let parse = |name: &str| -> Result<Option<u64>, AppError> {
        headers
            .get(name)
            .map(|value| {
                value
                    .to_str()
                    .ok()
                    .and_then(|raw| raw.trim().parse().ok())
                    .ok_or_else(|| AppError::InvalidInput(format!("invalid {name} header")))
            })
            .transpose()
    };

    match (parse(CUSTOMER_HEADER)?, parse(DRIVER_HEADER)?) {
        (Some(_), Some(_)) => Err(AppError::InvalidInput(format!(
            "send only one of {CUSTOMER_HEADER} and {DRIVER_HEADER}"
        ))),
        (Some(customer_id), None) => Ok(Actor::Customer(customer_id)),
        (None, Some(driver_id)) => Ok(Actor::Driver(driver_id)),
        (None, None) => Ok(Actor::Dispatcher),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    customers: usize,
    drivers: usize,
    orders: usize,
    auto_dispatch: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        customers: state.store.customer_count(),
        drivers: state.store.driver_count(),
        orders: state.store.order_count(),
        auto_dispatch: state.auto_dispatch.enabled,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
