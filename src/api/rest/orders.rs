use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::warn;

use crate::api::rest::actor_from_headers;
use crate::engine::queue::offer_order;
use crate::engine::service::{NewOrder, RaterRole, StatusUpdate};
use crate::error::AppError;
use crate::models::driver::{DriverId, GeoPoint};
use crate::models::order::{DeliveryOrder, OrderId};
use crate::models::quote::Quote;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quotes", post(quote))
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/assign", post(assign_driver))
        .route("/orders/:id/status", post(advance_status))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/rating", post(rate_order))
        .route("/order-numbers/:number", get(get_order_by_number))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub pickup: GeoPoint,
    pub delivery: GeoPoint,
    pub weight_kg: f64,
    pub promo_code: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: DriverId,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub role: RaterRole,
    pub score: f64,
    pub feedback: Option<String>,
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    let quote = state.service.estimate_price(
        &payload.pickup,
        &payload.delivery,
        payload.weight_kg,
        payload.promo_code.as_deref(),
    )?;
    Ok(Json(quote))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<(StatusCode, Json<DeliveryOrder>), AppError> {
    let order = state.service.create_order(payload).await?;

    if state.auto_dispatch.enabled {
        if let Err(err) = offer_order(&state, order.id) {
            warn!(order_id = order.id, error = %err, "order not queued for auto-dispatch");
        }
    }

    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    headers: HeaderMap,
) -> Result<Json<DeliveryOrder>, AppError> {
    let actor = actor_from_headers(&headers)?;
    Ok(Json(state.service.authorize(id, actor)?))
}

async fn get_order_by_number(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeliveryOrder>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let order = state.service.order_by_number(&number)?;
    Ok(Json(state.service.authorize(order.id, actor)?))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = state.service.assign_driver(id, payload.driver_id).await?;
    Ok(Json(order))
}

async fn advance_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    headers: HeaderMap,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<DeliveryOrder>, AppError> {
    state.service.authorize(id, actor_from_headers(&headers)?)?;
    let order = state.service.advance_status(id, payload).await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    headers: HeaderMap,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    state.service.authorize(id, actor_from_headers(&headers)?)?;
    let order = state.service.cancel_order(id, payload.reason).await?;
    Ok(Json(order))
}

async fn rate_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    headers: HeaderMap,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let actor = actor_from_headers(&headers)?;
    state.service.authorize_rating(id, actor, payload.role)?;
    let order = state
        .service
        .rate_order(id, payload.role, payload.score, payload.feedback)
        .await?;
    Ok(Json(order))
}
