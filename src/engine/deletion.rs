use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::Order;
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct DeletionSummary {
    pub deleted_id: Uuid,
    pub merchants_removed: Vec<Uuid>,
    pub products_removed: usize,
}

fn count_active<F>(state: &AppState, predicate: F) -> usize
where
    F: Fn(&Order) -> bool,
{
    state
        .orders
        .iter()
        .filter(|entry| entry.status.is_active() && predicate(entry.value()))
        .count()
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 active {noun}")
    } else {
        format!("{count} active {noun}s")
    }
}

fn remove_products_of(state: &AppState, merchant_id: Uuid) -> usize {
    let before = state.products.len();
    state.products.retain(|_, product| product.merchant_id != merchant_id);
    before.saturating_sub(state.products.len())
}

/// Removes a user together with the merchants only they manage. Every guard is
/// checked before the first removal, so a rejected delete changes nothing.
pub async fn delete_user(state: &AppState, user_id: Uuid) -> Result<DeletionSummary, AppError> {
    let _gate = state.write_gate.write().await;

    if !state.users.contains_key(&user_id) {
        return Err(AppError::NotFound(format!("user {user_id} not found")));
    }

    let as_customer = count_active(state, |order| order.user_id == user_id);
    if as_customer > 0 {
        return Err(AppError::Conflict(format!(
            "user has {} as customer",
            plural(as_customer, "order")
        )));
    }

    let as_driver = count_active(state, |order| order.driver_id == Some(user_id));
    if as_driver > 0 {
        return Err(AppError::Conflict(format!(
            "user has {} as driver",
            plural(as_driver, "order")
        )));
    }

    let (sole, shared): (Vec<Uuid>, Vec<Uuid>) = {
        let managed: Vec<(Uuid, usize)> = state
            .merchants
            .iter()
            .filter(|entry| entry.is_managed_by(user_id))
            .map(|entry| (entry.id, entry.manager_ids.len()))
            .collect();
        let (sole, shared): (Vec<_>, Vec<_>) = managed.into_iter().partition(|(_, managers)| *managers == 1);
        (
            sole.into_iter().map(|(id, _)| id).collect(),
            shared.into_iter().map(|(id, _)| id).collect(),
        )
    };

    for merchant_id in sole.iter().chain(&shared) {
        let active = count_active(state, |order| order.merchant_id == *merchant_id);
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "user manages merchant {merchant_id} which has {}",
                plural(active, "order")
            )));
        }
    }

    let mut products_removed = 0;
    for merchant_id in &sole {
        products_removed += remove_products_of(state, *merchant_id);
        state.merchants.remove(merchant_id);
    }
    for merchant_id in &shared {
        if let Some(mut merchant) = state.merchants.get_mut(merchant_id) {
            merchant.manager_ids.retain(|id| *id != user_id);
        }
    }

    state.driver_locations.remove(&user_id);
    state.users.remove(&user_id);

    info!(
        user_id = %user_id,
        merchants_removed = sole.len(),
        products_removed,
        "user deleted"
    );

    Ok(DeletionSummary {
        deleted_id: user_id,
        merchants_removed: sole,
        products_removed,
    })
}

/// Revokes the driver role and documents; the user account stays.
pub async fn delete_driver(state: &AppState, user_id: Uuid) -> Result<DeletionSummary, AppError> {
    let _gate = state.write_gate.write().await;

    let is_driver = state
        .users
        .get(&user_id)
        .is_some_and(|user| user.has_role(Role::Driver));
    if !is_driver {
        return Err(AppError::NotFound(format!("driver {user_id} not found")));
    }

    let active = count_active(state, |order| order.driver_id == Some(user_id));
    if active > 0 {
        return Err(AppError::Conflict(format!(
            "driver has {}",
            plural(active, "order")
        )));
    }

    if let Some(mut user) = state.users.get_mut(&user_id) {
        user.revoke(Role::Driver);
        user.driver_status = None;
        user.driver_documents = None;
    }
    state.driver_locations.remove(&user_id);

    info!(user_id = %user_id, "driver removed");

    Ok(DeletionSummary {
        deleted_id: user_id,
        merchants_removed: Vec::new(),
        products_removed: 0,
    })
}

pub async fn delete_merchant(
    state: &AppState,
    merchant_id: Uuid,
) -> Result<DeletionSummary, AppError> {
    let _gate = state.write_gate.write().await;

    let managers = state
        .merchants
        .get(&merchant_id)
        .map(|merchant| merchant.manager_ids.clone())
        .ok_or_else(|| AppError::NotFound(format!("merchant {merchant_id} not found")))?;

    let active = count_active(state, |order| order.merchant_id == merchant_id);
    if active > 0 {
        return Err(AppError::Conflict(format!(
            "merchant has {}",
            plural(active, "order")
        )));
    }

    let products_removed = remove_products_of(state, merchant_id);
    state.merchants.remove(&merchant_id);

    for manager_id in managers {
        let still_manages = state
            .merchants
            .iter()
            .any(|entry| entry.is_managed_by(manager_id));
        if !still_manages {
            if let Some(mut user) = state.users.get_mut(&manager_id) {
                user.revoke(Role::Merchant);
            }
        }
    }

    info!(merchant_id = %merchant_id, products_removed, "merchant deleted");

    Ok(DeletionSummary {
        deleted_id: merchant_id,
        merchants_removed: vec![merchant_id],
        products_removed,
    })
}

pub async fn delete_zone(state: &AppState, zone_id: Uuid) -> Result<(), AppError> {
    let _gate = state.write_gate.write().await;

    if !state.zones.contains_key(&zone_id) {
        return Err(AppError::NotFound(format!("zone {zone_id} not found")));
    }

    let active = count_active(state, |order| order.delivery_zone_id == Some(zone_id));
    if active > 0 {
        return Err(AppError::Conflict(format!(
            "zone is referenced by {}",
            plural(active, "order")
        )));
    }

    state.zones.remove(&zone_id);
    info!(zone_id = %zone_id, "zone deleted");
    Ok(())
}

