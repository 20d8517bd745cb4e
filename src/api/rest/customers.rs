use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};

use crate::engine::service::NewCustomer;
use crate::error::AppError;
use crate::models::customer::{Customer, CustomerId};
use crate::models::order::DeliveryOrder;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/customers", post(register_customer))
        .route("/customers/:id", get(get_customer))
        .route("/customers/:id/orders", get(list_customer_orders))
}

async fn register_customer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let customer = state.service.register_customer(payload)?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, AppError> {
    Ok(Json(state.service.customer(id)?))
}

async fn list_customer_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Vec<DeliveryOrder>>, AppError> {
    Ok(Json(state.service.customer_orders(id)?))
}
