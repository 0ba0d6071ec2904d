use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::orders::manages_merchant;
use crate::engine::verification;
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::merchant::{Merchant, MerchantType};
use crate::models::order::Order;
use crate::models::product::{Product, ProductStatus};
use crate::models::user::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/merchants", post(create_merchant).get(list_merchants))
        .route("/merchants/:id", get(get_merchant))
        .route(
            "/merchants/:id/products",
            post(create_product).get(list_products),
        )
        .route(
            "/merchants/:id/products/:product_id/visibility",
            patch(set_visibility),
        )
        .route("/merchants/:id/orders", get(merchant_orders))
}

#[derive(Deserialize)]
pub struct CreateMerchantRequest {
    pub name: String,
    pub merchant_type: MerchantType,
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct MerchantFilter {
    pub merchant_type: Option<MerchantType>,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: u64,
}

#[derive(Deserialize)]
pub struct VisibilityRequest {
    pub is_visible: bool,
}

fn require_manager(state: &AppState, actor: &Actor, merchant_id: Uuid) -> Result<(), AppError> {
    if !state.merchants.contains_key(&merchant_id) {
        return Err(AppError::NotFound(format!("merchant {merchant_id} not found")));
    }
    if actor.is_admin() || manages_merchant(state, actor.id, merchant_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("not a manager of this merchant".to_string()))
    }
}

async fn create_merchant(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateMerchantRequest>,
) -> Result<Json<Merchant>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !payload.location.is_valid() {
        return Err(AppError::BadRequest("location is out of range".to_string()));
    }

    let merchant = Merchant {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        merchant_type: payload.merchant_type,
        manager_ids: vec![actor.id],
        address: payload.address,
        location: payload.location,
        is_verified: false,
        created_at: Utc::now(),
    };

    if let Some(mut user) = state.users.get_mut(&actor.id) {
        user.grant(Role::Merchant);
    }
    state.merchants.insert(merchant.id, merchant.clone());
    info!(merchant_id = %merchant.id, manager_id = %actor.id, "merchant created");

    Ok(Json(merchant))
}

/// Public storefront listing: verified merchants only.
async fn list_merchants(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MerchantFilter>,
) -> Json<Vec<Merchant>> {
    let mut merchants: Vec<Merchant> = state
        .merchants
        .iter()
        .filter(|entry| entry.is_verified)
        .filter(|entry| {
            filter
                .merchant_type
                .is_none_or(|merchant_type| entry.merchant_type == merchant_type)
        })
        .map(|entry| entry.value().clone())
        .collect();
    merchants.sort_by(|a, b| a.name.cmp(&b.name));

    Json(merchants)
}

async fn get_merchant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Merchant>, AppError> {
    let merchant = state
        .merchants
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("merchant {id} not found")))?;

    Ok(Json(merchant.value().clone()))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<Product>, AppError> {
    require_manager(&state, &actor, id)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.price == 0 {
        return Err(AppError::BadRequest("price must be > 0".to_string()));
    }

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4(),
        merchant_id: id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        price: payload.price,
        status: ProductStatus::Pending,
        is_visible: true,
        created_at: now,
        updated_at: now,
    };
    state.products.insert(product.id, product.clone());

    Ok(Json(product))
}

/// Customers see listed products; managers and admins see the whole catalogue.
async fn list_products(
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Product>>, AppError> {
    if !state.merchants.contains_key(&id) {
        return Err(AppError::NotFound(format!("merchant {id} not found")));
    }

    let full_catalogue = actor
        .as_ref()
        .is_some_and(|actor| actor.is_admin() || manages_merchant(&state, actor.id, id));

    let mut products: Vec<Product> = state
        .products
        .iter()
        .filter(|entry| entry.merchant_id == id && (full_catalogue || entry.is_listed()))
        .map(|entry| entry.value().clone())
        .collect();
    products.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(products))
}

async fn set_visibility(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((id, product_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<Json<Product>, AppError> {
    require_manager(&state, &actor, id)?;

    let listed_before = verification::listed_product_count(&state, id);
    let updated = {
        let mut product = state
            .products
            .get_mut(&product_id)
            .filter(|product| product.merchant_id == id)
            .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))?;

        product.is_visible = payload.is_visible;
        product.updated_at = Utc::now();
        product.clone()
    };

    verification::reconcile(&state, id, listed_before);
    Ok(Json(updated))
}

async fn merchant_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    require_manager(&state, &actor, id)?;

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| entry.merchant_id == id)
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(orders))
}
