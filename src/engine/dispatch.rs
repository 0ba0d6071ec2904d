use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::orders::{record_transition, transition};
use crate::engine::{codes, lifecycle};
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::location::GeoPoint;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct AvailableOrder {
    #[serde(flatten)]
    pub order: Order,
    pub merchant_name: String,
    pub pickup: GeoPoint,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverDashboard {
    pub active_orders: Vec<Order>,
    pub completed_deliveries: usize,
    pub earned_delivery_fees: u64,
}

fn require_approved(driver: &User) -> Result<(), AppError> {
    if driver.is_approved_driver() {
        Ok(())
    } else {
        Err(AppError::Forbidden("driver account is not approved".to_string()))
    }
}

fn claim_outcome(state: &AppState, outcome: &str) {
    state
        .metrics
        .claim_attempts_total
        .with_label_values(&[outcome])
        .inc();
}

/// Orders waiting for a driver, nearest pickup first when the driver's
/// position is known.
pub fn available_orders(state: &AppState, driver: &User) -> Result<Vec<AvailableOrder>, AppError> {
    require_approved(driver)?;

    let here = state
        .driver_locations
        .get(&driver.id)
        .map(|entry| entry.location);

    let mut available: Vec<AvailableOrder> = state
        .orders
        .iter()
        .filter(|entry| entry.status == OrderStatus::ReadyToDeliver && entry.driver_id.is_none())
        .filter_map(|entry| {
            let merchant = state.merchants.get(&entry.merchant_id)?;
            Some(AvailableOrder {
                order: entry.value().clone(),
                merchant_name: merchant.name.clone(),
                pickup: merchant.location,
                distance_km: here.map(|point| haversine_km(&point, &merchant.location)),
            })
        })
        .collect();

    available.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.order.created_at.cmp(&b.order.created_at),
    });

    Ok(available)
}

/// Assigns an order to the driver presenting the merchant's pickup code. The
/// status and driver checks and the assignment happen under one entry lock, so
/// of two concurrent claimers exactly one wins.
pub async fn claim(
    state: &AppState,
    driver: &User,
    order_id: Uuid,
    pickup_code: &str,
) -> Result<Order, AppError> {
    require_approved(driver)?;

    let _gate = state.write_gate.read().await;
    if !state.users.contains_key(&driver.id) {
        return Err(AppError::Unauthorized("driver account no longer exists".to_string()));
    }

    let claimed = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::ReadyToDeliver || order.driver_id.is_some() {
            claim_outcome(state, "conflict");
            warn!(order_id = %order_id, driver_id = %driver.id, status = order.status.as_str(), "claim lost");
            return Err(AppError::Conflict("order is no longer available".to_string()));
        }

        if !codes::matches(&order.pickup_code, pickup_code) {
            claim_outcome(state, "invalid_code");
            return Err(AppError::BadRequest("invalid pickup code".to_string()));
        }

        lifecycle::advance(&mut order, OrderStatus::AcceptedByDriver)?;
        order.driver_id = Some(driver.id);
        order.clone()
    };

    claim_outcome(state, "success");
    record_transition(state, OrderStatus::AcceptedByDriver);
    info!(order_id = %order_id, driver_id = %driver.id, "order claimed by driver");

    Ok(claimed)
}

pub async fn start(state: &AppState, driver: &User, order_id: Uuid) -> Result<Order, AppError> {
    require_approved(driver)?;

    transition(state, order_id, OrderStatus::OnTheWay, |order| {
        ensure_assigned(order, driver)
    })
    .await
}

pub async fn complete(
    state: &AppState,
    driver: &User,
    order_id: Uuid,
    delivery_code: &str,
) -> Result<Order, AppError> {
    require_approved(driver)?;

    transition(state, order_id, OrderStatus::Completed, |order| {
        ensure_assigned(order, driver)?;
        if order.status == OrderStatus::OnTheWay && !codes::matches(&order.delivery_code, delivery_code) {
            return Err(AppError::BadRequest("invalid delivery code".to_string()));
        }
        Ok(())
    })
    .await
}

fn ensure_assigned(order: &Order, driver: &User) -> Result<(), AppError> {
    if order.driver_id == Some(driver.id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("order is not assigned to this driver".to_string()))
    }
}

pub fn dashboard(state: &AppState, driver: &User) -> DriverDashboard {
    let mut active_orders = Vec::new();
    let mut completed_deliveries = 0;
    let mut earned_delivery_fees = 0u64;

    for entry in state.orders.iter() {
        if entry.driver_id != Some(driver.id) {
            continue;
        }
        match entry.status {
            OrderStatus::Completed => {
                completed_deliveries += 1;
                earned_delivery_fees = earned_delivery_fees.saturating_add(entry.prices.delivery_fee);
            }
            status if status.is_tracked() => active_orders.push(entry.value().clone()),
            _ => {}
        }
    }

    active_orders.sort_by_key(|order| order.updated_at);

    DriverDashboard {
        active_orders,
        completed_deliveries,
        earned_delivery_fees,
    }
}
