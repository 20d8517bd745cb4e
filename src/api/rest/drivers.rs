use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use serde::Deserialize;

use crate::engine::service::{DriverStatistics, NewDriver};
use crate::error::AppError;
use crate::geo::proximity::{NearbyDriver, Ranking};
use crate::models::driver::{Availability, Driver, DriverId, GeoPoint};
use crate::models::order::DeliveryOrder;
use crate::state::AppState;

const DEFAULT_TOP_DRIVERS: usize = 10;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/location", patch(update_driver_location))
        .route("/drivers/:id/availability", patch(update_driver_availability))
        .route("/drivers/:id/statistics", get(driver_statistics))
        .route("/drivers/:id/orders/active", get(active_driver_orders))
        .route("/nearby-drivers", get(nearby_drivers))
        .route("/top-drivers", get(top_drivers))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability: Availability,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
    #[serde(default)]
    pub ranking: Ranking,
}

#[derive(Deserialize)]
pub struct TopDriversQuery {
    pub limit: Option<usize>,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewDriver>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let driver = state.service.register_driver(payload)?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    let mut drivers = state.service.drivers()?;
    drivers.sort_by_key(|driver| driver.id);
    Ok(Json(drivers))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DriverId>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.service.driver(id)?))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DriverId>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state
        .service
        .update_driver_location(id, payload.location)
        .await?;
    Ok(Json(driver))
}

async fn update_driver_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DriverId>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = state
        .service
        .update_availability(id, payload.availability)
        .await?;
    Ok(Json(driver))
}

async fn driver_statistics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DriverId>,
) -> Result<Json<DriverStatistics>, AppError> {
    Ok(Json(state.service.driver_statistics(id)?))
}

async fn active_driver_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DriverId>,
) -> Result<Json<Vec<DeliveryOrder>>, AppError> {
    Ok(Json(state.service.active_driver_orders(id)?))
}

async fn nearby_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyDriver>>, AppError> {
    let drivers = state.service.find_nearby_drivers(
        GeoPoint::new(query.lat, query.lng),
        query.radius_km,
        query.ranking,
    )?;
    Ok(Json(drivers))
}

async fn top_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopDriversQuery>,
) -> Result<Json<Vec<Driver>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_DRIVERS);
    Ok(Json(state.service.top_drivers(limit)?))
}
