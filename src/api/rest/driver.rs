use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::dispatch::{self, AvailableOrder, DriverDashboard};
use crate::engine::tracking::{self, LocationAck, LocationFix};
use crate::error::AppError;
use crate::models::order::Order;
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/driver/orders/available", get(available_orders))
        .route("/driver/orders/:id/claim", post(claim_order))
        .route("/driver/orders/:id/start", post(start_delivery))
        .route("/driver/orders/:id/complete", post(complete_delivery))
        .route("/driver/location", post(push_location))
        .route("/driver/dashboard", get(dashboard))
}

#[derive(Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

async fn available_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<AvailableOrder>>, AppError> {
    Ok(Json(dispatch::available_orders(&state, &actor)?))
}

async fn claim_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::claim(&state, &actor, id, &payload.code).await?;
    Ok(Json(order))
}

async fn start_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::start(&state, &actor, id).await?;
    Ok(Json(order))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::complete(&state, &actor, id, &payload.code).await?;
    Ok(Json(order))
}

async fn push_location(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<LocationFix>,
) -> Result<Json<LocationAck>, AppError> {
    actor.require(Role::Driver)?;
    let ack = tracking::record_fix(&state, actor.id, payload).await?;
    Ok(Json(ack))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<DriverDashboard>, AppError> {
    actor.require(Role::Driver)?;
    Ok(Json(dispatch::dashboard(&state, &actor)))
}
