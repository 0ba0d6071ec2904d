use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::checkout::{price_order, resolve_zone};
use crate::engine::{codes, lifecycle, tracking};
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::order::{Contact, DeliveryInfo, Order, OrderItem, OrderStatus};
use crate::models::user::{Role, User};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct DraftItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryDraft {
    pub address: Option<String>,
    pub coordinates: GeoPoint,
    pub contact: Contact,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub merchant_id: Uuid,
    pub items: Vec<DraftItem>,
    pub delivery: DeliveryDraft,
}

pub async fn place_order(
    state: &AppState,
    customer: &User,
    draft: OrderDraft,
) -> Result<Order, AppError> {
    if draft.items.is_empty() {
        return Err(AppError::BadRequest("an order needs at least one item".to_string()));
    }
    if !draft.delivery.coordinates.is_valid() {
        return Err(AppError::BadRequest("delivery coordinates are out of range".to_string()));
    }
    let contact = &draft.delivery.contact;
    if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
        return Err(AppError::BadRequest(
            "delivery contact needs a name and a phone".to_string(),
        ));
    }

    if !state.merchants.contains_key(&draft.merchant_id) {
        return Err(AppError::NotFound(format!(
            "merchant {} not found",
            draft.merchant_id
        )));
    }

    let items = draft
        .items
        .iter()
        .map(|line| resolve_item(state, draft.merchant_id, line))
        .collect::<Result<Vec<_>, _>>()?;

    let zone = resolve_zone(state, &draft.delivery.coordinates).ok_or_else(|| {
        AppError::BadRequest("delivery address is outside every delivery zone".to_string())
    })?;

    let address = match draft.delivery.address.as_deref().map(str::trim) {
        Some(address) if !address.is_empty() => address.to_string(),
        _ => describe_location(state, draft.delivery.coordinates).await,
    };

    let prices = price_order(&items, state.config.shipping_fee, zone.delivery_fee, 0);
    let (pickup_code, delivery_code) = codes::generate_pair();
    let now = Utc::now();

    let order = Order {
        id: Uuid::new_v4(),
        status: OrderStatus::Pending,
        merchant_id: draft.merchant_id,
        driver_id: None,
        user_id: customer.id,
        items,
        prices,
        delivery_info: DeliveryInfo {
            address,
            coordinates: draft.delivery.coordinates,
            contact: draft.delivery.contact,
            notes: draft.delivery.notes.filter(|notes| !notes.trim().is_empty()),
        },
        pickup_code,
        delivery_code,
        delivery_zone_id: Some(zone.id),
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    let _gate = state.write_gate.read().await;
    if !state.users.contains_key(&customer.id)
        || !state.merchants.contains_key(&order.merchant_id)
        || !state.zones.contains_key(&zone.id)
    {
        return Err(AppError::Conflict(
            "customer, merchant or zone was removed while placing the order".to_string(),
        ));
    }
    state.orders.insert(order.id, order.clone());
    record_transition(state, OrderStatus::Pending);

    info!(
        order_id = %order.id,
        merchant_id = %order.merchant_id,
        zone_id = %zone.id,
        total = order.prices.total,
        "order placed"
    );

    Ok(order)
}

fn resolve_item(state: &AppState, merchant_id: Uuid, line: &DraftItem) -> Result<OrderItem, AppError> {
    if line.quantity == 0 {
        return Err(AppError::BadRequest(format!(
            "quantity for product {} must be > 0",
            line.product_id
        )));
    }

    let product = state
        .products
        .get(&line.product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {} not found", line.product_id)))?;

    if product.merchant_id != merchant_id {
        return Err(AppError::BadRequest(format!(
            "product {} is not sold by merchant {merchant_id}",
            product.id
        )));
    }
    if !product.is_listed() {
        return Err(AppError::BadRequest(format!(
            "product {} is not available",
            product.id
        )));
    }

    Ok(OrderItem {
        product_id: product.id,
        name: product.name.clone(),
        quantity: line.quantity,
        unit_price: product.price,
    })
}

async fn describe_location(state: &AppState, point: GeoPoint) -> String {
    match state.services.geocoder.reverse(point).await {
        Ok(label) => label,
        Err(err) => {
            warn!(error = %err, "reverse geocoding failed; using coordinates as address");
            format!("{:.5}, {:.5}", point.lat, point.lng)
        }
    }
}

pub fn record_transition(state: &AppState, to: OrderStatus) {
    state
        .metrics
        .order_transitions_total
        .with_label_values(&[to.as_str()])
        .inc();
}

/// Applies a status change under the order's entry lock. `guard` runs against
/// the current order before anything is mutated.
pub async fn transition<F>(
    state: &AppState,
    order_id: Uuid,
    to: OrderStatus,
    guard: F,
) -> Result<Order, AppError>
where
    F: FnOnce(&Order) -> Result<(), AppError>,
{
    let _gate = state.write_gate.read().await;

    let updated = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        guard(&order)?;
        let from = lifecycle::advance(&mut order, to)?;
        info!(
            order_id = %order_id,
            from = from.as_str(),
            to = to.as_str(),
            "order status changed"
        );
        order.clone()
    };

    record_transition(state, to);
    if !to.is_tracked() {
        tracking::forget(state, order_id);
    }

    Ok(updated)
}

pub fn manages_merchant(state: &AppState, user_id: Uuid, merchant_id: Uuid) -> bool {
    state
        .merchants
        .get(&merchant_id)
        .is_some_and(|merchant| merchant.is_managed_by(user_id))
}

/// Admins, the ordering customer, the assigned driver and the merchant's
/// managers may see an order.
pub fn can_view(state: &AppState, user: &User, order: &Order) -> bool {
    user.has_role(Role::SuperAdmin)
        || order.user_id == user.id
        || order.driver_id == Some(user.id)
        || manages_merchant(state, user.id, order.merchant_id)
}

pub async fn cancel(state: &AppState, user: &User, order_id: Uuid) -> Result<Order, AppError> {
    let is_admin = user.has_role(Role::SuperAdmin);

    transition(state, order_id, OrderStatus::Canceled, |order| {
        if is_admin || order.status.is_terminal() {
            return Ok(());
        }
        if manages_merchant(state, user.id, order.merchant_id) {
            return match order.status {
                OrderStatus::Pending
                | OrderStatus::AcceptedByMerchant
                | OrderStatus::ReadyToDeliver => Ok(()),
                _ => Err(AppError::Conflict(
                    "a driver already has this order; contact an administrator".to_string(),
                )),
            };
        }
        if order.user_id == user.id {
            return match order.status {
                OrderStatus::Pending => Ok(()),
                _ => Err(AppError::Conflict(
                    "the merchant already accepted this order".to_string(),
                )),
            };
        }
        Err(AppError::Forbidden("not allowed to cancel this order".to_string()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::{DeliveryDraft, DraftItem, OrderDraft, place_order};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::geo::polygon::build_polygon;
    use crate::models::location::GeoPoint;
    use crate::models::merchant::{Merchant, MerchantType};
    use crate::models::order::Contact;
    use crate::models::product::{Product, ProductStatus};
    use crate::models::user::User;
    use crate::models::zone::{DeliveryZone, ZoneCode, ZoneStatus};
    use crate::state::{AppState, Services};

    struct Seeded {
        customer: User,
        merchant_id: Uuid,
        product_id: Uuid,
        zone_id: Uuid,
    }

    fn seed(state: &AppState) -> Seeded {
        let customer = User::new("Carine".to_string(), "+237600000002".to_string(), None);
        state.users.insert(customer.id, customer.clone());

        let now = Utc::now();
        let merchant = Merchant {
            id: Uuid::new_v4(),
            name: "Chez Mama".to_string(),
            merchant_type: MerchantType::Restaurant,
            manager_ids: Vec::new(),
            address: "Rue Joss".to_string(),
            location: GeoPoint { lat: 0.2, lng: 0.2 },
            is_verified: true,
            created_at: now,
        };
        let product = Product {
            id: Uuid::new_v4(),
            merchant_id: merchant.id,
            name: "Ndole".to_string(),
            description: None,
            price: 2_500,
            status: ProductStatus::Verified,
            is_visible: true,
            created_at: now,
            updated_at: now,
        };
        let points = [
            GeoPoint { lat: 0.0, lng: 0.0 },
            GeoPoint { lat: 0.0, lng: 1.0 },
            GeoPoint { lat: 1.0, lng: 1.0 },
            GeoPoint { lat: 1.0, lng: 0.0 },
        ];
        let zone = DeliveryZone {
            id: Uuid::new_v4(),
            code: ZoneCode::Central,
            name: "Akwa".to_string(),
            geometry: build_polygon(&points).unwrap(),
            landmarks: Vec::new(),
            delivery_fee: 1_000,
            priority: 0,
            status: ZoneStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let seeded = Seeded {
            customer,
            merchant_id: merchant.id,
            product_id: product.id,
            zone_id: zone.id,
        };
        state.merchants.insert(merchant.id, merchant);
        state.products.insert(product.id, product);
        state.zones.insert(zone.id, zone);
        seeded
    }

    fn draft(seeded: &Seeded) -> OrderDraft {
        OrderDraft {
            merchant_id: seeded.merchant_id,
            items: vec![DraftItem {
                product_id: seeded.product_id,
                quantity: 1,
            }],
            delivery: DeliveryDraft {
                address: Some("Bonanjo".to_string()),
                coordinates: GeoPoint { lat: 0.5, lng: 0.5 },
                contact: Contact {
                    name: "Carine".to_string(),
                    phone: "+237600000002".to_string(),
                },
                notes: None,
            },
        }
    }

    #[tokio::test]
    async fn order_records_the_resolved_zone() {
        let state = AppState::new(Config::default(), Services::offline());
        let seeded = seed(&state);

        let order = place_order(&state, &seeded.customer, draft(&seeded)).await.unwrap();

        assert_eq!(order.delivery_zone_id, Some(seeded.zone_id));
        assert_eq!(order.prices.total, 3_500);
    }

    #[tokio::test]
    async fn zone_removed_before_insert_aborts_the_order() {
        let state = Arc::new(AppState::new(Config::default(), Services::offline()));
        let seeded = seed(&state);

        let gate = state.write_gate.write().await;
        let placing = tokio::spawn({
            let state = state.clone();
            let customer = seeded.customer.clone();
            let draft = draft(&seeded);
            async move { place_order(&state, &customer, draft).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        state.zones.remove(&seeded.zone_id);
        drop(gate);

        let result = placing.await.unwrap();
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(state.orders.is_empty());
    }
}
