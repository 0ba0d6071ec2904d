use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::{DriverLocation, GeoPoint, RouteEstimate, TrackingUpdate};
use crate::models::order::OrderStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationFix {
    pub location: GeoPoint,
    pub accuracy: Option<f64>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationAck {
    pub accepted: bool,
    pub tracked_orders: Vec<Uuid>,
}

struct TrackedOrder {
    order_id: Uuid,
    status: OrderStatus,
    merchant_id: Uuid,
    delivery_point: GeoPoint,
}

/// Stores a driver's position fix and refreshes tracking for every order the
/// driver is carrying. Fixes not newer than the stored one are dropped.
pub async fn record_fix(
    state: &AppState,
    driver_id: Uuid,
    fix: LocationFix,
) -> Result<LocationAck, AppError> {
    if !fix.location.is_valid() {
        return Err(AppError::BadRequest("location is out of range".to_string()));
    }

    let recorded_at = fix.recorded_at.unwrap_or_else(Utc::now);
    let latest = DriverLocation {
        driver_id,
        location: fix.location,
        accuracy: fix.accuracy,
        recorded_at,
    };

    let accepted = {
        let _gate = state.write_gate.read().await;
        if !state.users.contains_key(&driver_id) {
            return Err(AppError::Unauthorized("driver account no longer exists".to_string()));
        }

        match state.driver_locations.entry(driver_id) {
            Entry::Occupied(mut current) => {
                if current.get().recorded_at >= recorded_at {
                    false
                } else {
                    current.insert(latest);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(latest);
                true
            }
        }
    };

    if !accepted {
        state
            .metrics
            .location_updates_total
            .with_label_values(&["stale"])
            .inc();
        debug!(driver_id = %driver_id, %recorded_at, "stale location fix dropped");
        return Ok(LocationAck {
            accepted: false,
            tracked_orders: Vec::new(),
        });
    }

    state
        .metrics
        .location_updates_total
        .with_label_values(&["accepted"])
        .inc();

    let carried: Vec<TrackedOrder> = state
        .orders
        .iter()
        .filter(|entry| entry.driver_id == Some(driver_id) && entry.status.is_tracked())
        .map(|entry| TrackedOrder {
            order_id: entry.id,
            status: entry.status,
            merchant_id: entry.merchant_id,
            delivery_point: entry.delivery_info.coordinates,
        })
        .collect();

    let mut tracked_orders = Vec::with_capacity(carried.len());
    for order in carried {
        let merchant_location = state
            .merchants
            .get(&order.merchant_id)
            .map(|merchant| merchant.location);

        let (to_merchant, to_delivery) = tokio::join!(
            async {
                match merchant_location {
                    Some(pickup) => estimate(state, fix.location, pickup).await,
                    None => None,
                }
            },
            estimate(state, fix.location, order.delivery_point),
        );

        let update = TrackingUpdate {
            order_id: order.order_id,
            driver_id,
            status: order.status,
            location: fix.location,
            to_merchant,
            to_delivery,
            recorded_at,
        };

        // The order may have been completed or canceled while routing ran.
        let still_tracked = state
            .orders
            .get(&order.order_id)
            .is_some_and(|current| current.status.is_tracked() && current.driver_id == Some(driver_id));
        if !still_tracked {
            continue;
        }

        state.tracking.insert(order.order_id, update.clone());
        let _ = state.tracking_tx.send(update);
        tracked_orders.push(order.order_id);
    }

    state.metrics.tracked_orders.set(state.tracking.len() as i64);

    Ok(LocationAck {
        accepted: true,
        tracked_orders,
    })
}

async fn estimate(state: &AppState, from: GeoPoint, to: GeoPoint) -> Option<RouteEstimate> {
    match state.services.routing.route(from, to).await {
        Ok(route) => {
            state
                .metrics
                .route_lookups_total
                .with_label_values(&["success"])
                .inc();
            Some(route)
        }
        Err(err) => {
            state
                .metrics
                .route_lookups_total
                .with_label_values(&["error"])
                .inc();
            warn!(error = %err, "route lookup failed");
            None
        }
    }
}

pub fn snapshot(state: &AppState, order_id: Uuid) -> Option<TrackingUpdate> {
    state.tracking.get(&order_id).map(|entry| entry.value().clone())
}

pub fn forget(state: &AppState, order_id: Uuid) {
    if state.tracking.remove(&order_id).is_some() {
        state.metrics.tracked_orders.set(state.tracking.len() as i64);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{LocationFix, record_fix};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::location::GeoPoint;
    use crate::state::{AppState, Services};

    #[tokio::test]
    async fn fix_from_removed_driver_is_not_stored() {
        let state = AppState::new(Config::default(), Services::offline());
        let removed = Uuid::new_v4();

        let result = record_fix(
            &state,
            removed,
            LocationFix {
                location: GeoPoint { lat: 4.05, lng: 9.7 },
                accuracy: None,
                recorded_at: None,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert!(state.driver_locations.is_empty());
    }
}
