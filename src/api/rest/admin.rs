use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::deletion::{self, DeletionSummary};
use crate::engine::fanout::{self, BroadcastDraft};
use crate::engine::orders;
use crate::engine::verification;
use crate::error::AppError;
use crate::models::merchant::Merchant;
use crate::models::message::Message;
use crate::models::order::{Order, OrderStatus};
use crate::models::product::{Product, ProductStatus};
use crate::models::user::{DriverStatus, Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/:id/cancel", post(cancel_order))
        .route("/admin/merchants", get(list_merchants))
        .route("/admin/merchants/:id", delete(delete_merchant))
        .route("/admin/merchants/:id/verification", patch(set_verification))
        .route("/admin/products", get(list_products))
        .route("/admin/products/:id/status", patch(set_product_status))
        .route("/admin/drivers", get(list_drivers))
        .route("/admin/drivers/:id", delete(delete_driver))
        .route("/admin/drivers/:id/status", patch(set_driver_status))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", delete(delete_user))
        .route("/admin/users/:id/roles", patch(set_roles))
        .route("/admin/messages", post(send_message).get(list_messages))
}

#[derive(Deserialize)]
pub struct StatusFilter<T> {
    pub status: Option<T>,
}

#[derive(Deserialize)]
pub struct VerificationRequest {
    pub is_verified: bool,
}

#[derive(Deserialize)]
pub struct ProductStatusRequest {
    pub status: ProductStatus,
}

#[derive(Deserialize)]
pub struct DriverStatusRequest {
    pub status: DriverStatus,
}

#[derive(Deserialize)]
pub struct RolesRequest {
    pub roles: Vec<Role>,
}

#[derive(Serialize)]
pub struct Stats {
    pub orders_by_status: BTreeMap<&'static str, usize>,
    pub users: usize,
    pub users_by_role: BTreeMap<&'static str, usize>,
    pub merchants: usize,
    pub verified_merchants: usize,
    pub pending_drivers: usize,
    pub pending_products: usize,
}

fn count_users(state: &AppState, predicate: impl Fn(&User) -> bool) -> usize {
    state
        .users
        .iter()
        .filter(|entry| predicate(entry.value()))
        .count()
}

async fn stats(State(state): State<Arc<AppState>>, actor: Actor) -> Result<Json<Stats>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut orders_by_status: BTreeMap<&'static str, usize> = OrderStatus::ALL
        .iter()
        .map(|status| (status.as_str(), 0))
        .collect();
    for entry in state.orders.iter() {
        *orders_by_status.entry(entry.status.as_str()).or_default() += 1;
    }

    let users_by_role = Role::ALL
        .iter()
        .map(|role| (role.as_str(), count_users(&state, |user| user.has_role(*role))))
        .collect();

    Ok(Json(Stats {
        orders_by_status,
        users: state.users.len(),
        users_by_role,
        merchants: state.merchants.len(),
        verified_merchants: state.merchants.iter().filter(|entry| entry.is_verified).count(),
        pending_drivers: count_users(&state, |user| {
            user.driver_status == Some(DriverStatus::Pending)
        }),
        pending_products: state
            .products
            .iter()
            .filter(|entry| entry.status == ProductStatus::Pending)
            .count(),
    }))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(filter): Query<StatusFilter<OrderStatus>>,
) -> Result<Json<Vec<Order>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| filter.status.is_none_or(|status| entry.status == status))
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(orders))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    actor.require(Role::SuperAdmin)?;
    Ok(Json(orders::cancel(&state, &actor, id).await?))
}

async fn list_merchants(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Merchant>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut merchants: Vec<Merchant> = state
        .merchants
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    merchants.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(merchants))
}

async fn set_verification(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerificationRequest>,
) -> Result<Json<Merchant>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut merchant = state
        .merchants
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("merchant {id} not found")))?;
    merchant.is_verified = payload.is_verified;
    info!(merchant_id = %id, is_verified = payload.is_verified, "merchant verification set");

    Ok(Json(merchant.clone()))
}

async fn delete_merchant(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletionSummary>, AppError> {
    actor.require(Role::SuperAdmin)?;
    Ok(Json(deletion::delete_merchant(&state, id).await?))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(filter): Query<StatusFilter<ProductStatus>>,
) -> Result<Json<Vec<Product>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut products: Vec<Product> = state
        .products
        .iter()
        .filter(|entry| filter.status.is_none_or(|status| entry.status == status))
        .map(|entry| entry.value().clone())
        .collect();
    products.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(products))
}

async fn set_product_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductStatusRequest>,
) -> Result<Json<Product>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let merchant_id = state
        .products
        .get(&id)
        .map(|product| product.merchant_id)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    let listed_before = verification::listed_product_count(&state, merchant_id);
    let updated = {
        let mut product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;
        product.status = payload.status;
        product.updated_at = Utc::now();
        product.clone()
    };

    verification::reconcile(&state, merchant_id, listed_before);
    Ok(Json(updated))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(filter): Query<StatusFilter<DriverStatus>>,
) -> Result<Json<Vec<User>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut drivers: Vec<User> = state
        .users
        .iter()
        .filter(|entry| entry.has_role(Role::Driver))
        .filter(|entry| filter.status.is_none_or(|status| entry.driver_status == Some(status)))
        .map(|entry| entry.value().clone())
        .collect();
    drivers.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(drivers))
}

async fn set_driver_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverStatusRequest>,
) -> Result<Json<User>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut user = state
        .users
        .get_mut(&id)
        .filter(|user| user.has_role(Role::Driver))
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    if payload.status == DriverStatus::Approved && user.driver_documents.is_none() {
        return Err(AppError::BadRequest(
            "driver has not uploaded identity documents".to_string(),
        ));
    }

    user.driver_status = Some(payload.status);
    info!(user_id = %id, status = ?payload.status, "driver status changed");

    Ok(Json(user.clone()))
}

async fn delete_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletionSummary>, AppError> {
    actor.require(Role::SuperAdmin)?;
    Ok(Json(deletion::delete_driver(&state, id).await?))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<User>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut users: Vec<User> = state
        .users
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(users))
}

async fn set_roles(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<RolesRequest>,
) -> Result<Json<User>, AppError> {
    actor.require(Role::SuperAdmin)?;

    if id == actor.id && !payload.roles.contains(&Role::SuperAdmin) {
        return Err(AppError::BadRequest(
            "cannot remove your own super admin role".to_string(),
        ));
    }

    let mut roles: Vec<Role> = Vec::with_capacity(payload.roles.len());
    for role in payload.roles {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    if roles.is_empty() {
        return Err(AppError::BadRequest("a user needs at least one role".to_string()));
    }

    let mut user = state
        .users
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;
    if !roles.contains(&Role::Driver) {
        user.driver_status = None;
    } else if user.driver_status.is_none() {
        user.driver_status = Some(DriverStatus::Pending);
    }
    user.roles = roles;

    Ok(Json(user.clone()))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletionSummary>, AppError> {
    actor.require(Role::SuperAdmin)?;

    if id == actor.id {
        return Err(AppError::BadRequest("cannot delete your own account".to_string()));
    }
    Ok(Json(deletion::delete_user(&state, id).await?))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<BroadcastDraft>,
) -> Result<Json<Message>, AppError> {
    actor.require(Role::SuperAdmin)?;
    Ok(Json(fanout::broadcast(&state, &actor, payload).await?))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Message>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut messages: Vec<Message> = state
        .messages
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));

    Ok(Json(messages))
}
