use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Serialize;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::orders::{self, OrderDraft, can_view, manages_merchant};
use crate::engine::tracking;
use crate::error::AppError;
use crate::models::location::TrackingUpdate;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(place_order).get(my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/codes", get(order_codes))
        .route("/orders/:id/tracking", get(order_tracking))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/reject", post(reject_order))
        .route("/orders/:id/ready", post(mark_ready))
        .route("/orders/:id/cancel", post(cancel_order))
}

#[derive(Serialize)]
pub struct OrderCodes {
    pub pickup_code: Option<String>,
    pub delivery_code: Option<String>,
}

#[derive(Serialize)]
pub struct TrackingView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub driver_id: Option<Uuid>,
    pub tracking: Option<TrackingUpdate>,
}

fn visible_order(state: &AppState, actor: &Actor, id: Uuid) -> Result<Order, AppError> {
    let order = state
        .orders
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    if can_view(state, actor, &order) {
        Ok(order)
    } else {
        Err(AppError::NotFound(format!("order {id} not found")))
    }
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<OrderDraft>,
) -> Result<Json<Order>, AppError> {
    actor.require(Role::Customer)?;
    let order = orders::place_order(&state, &actor, payload).await?;
    Ok(Json(order))
}

async fn my_orders(State(state): State<Arc<AppState>>, actor: Actor) -> Json<Vec<Order>> {
    let mut mine: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| entry.user_id == actor.id)
        .map(|entry| entry.value().clone())
        .collect();
    mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(mine)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(visible_order(&state, &actor, id)?))
}

/// The merchant hands the pickup code to the driver; the customer hands the
/// delivery code over at the door.
async fn order_codes(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderCodes>, AppError> {
    let order = visible_order(&state, &actor, id)?;
    let is_admin = actor.is_admin();

    let pickup_code = (is_admin || manages_merchant(&state, actor.id, order.merchant_id))
        .then(|| order.pickup_code.clone());
    let delivery_code = (is_admin || order.user_id == actor.id).then(|| order.delivery_code.clone());

    if pickup_code.is_none() && delivery_code.is_none() {
        return Err(AppError::Forbidden("no confirmation code for this account".to_string()));
    }

    Ok(Json(OrderCodes {
        pickup_code,
        delivery_code,
    }))
}

async fn order_tracking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingView>, AppError> {
    let order = visible_order(&state, &actor, id)?;

    Ok(Json(TrackingView {
        order_id: order.id,
        status: order.status,
        driver_id: order.driver_id,
        tracking: tracking::snapshot(&state, order.id),
    }))
}

async fn merchant_transition(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    to: OrderStatus,
) -> Result<Order, AppError> {
    let is_admin = actor.is_admin();
    orders::transition(state, id, to, |order| {
        if is_admin || manages_merchant(state, actor.id, order.merchant_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("not a manager of this merchant".to_string()))
        }
    })
    .await
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = merchant_transition(&state, &actor, id, OrderStatus::AcceptedByMerchant).await?;
    Ok(Json(order))
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = merchant_transition(&state, &actor, id, OrderStatus::Rejected).await?;
    Ok(Json(order))
}

async fn mark_ready(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = merchant_transition(&state, &actor, id, OrderStatus::ReadyToDeliver).await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    visible_order(&state, &actor, id)?;
    let order = orders::cancel(&state, &actor, id).await?;
    Ok(Json(order))
}
