use crate::geo::polygon;
use crate::models::location::GeoPoint;
use crate::models::order::{OrderItem, OrderPrices};
use crate::models::zone::{DeliveryZone, ZoneStatus};
use crate::state::AppState;

pub fn price_order(items: &[OrderItem], shipping: u64, delivery_fee: u64, discount: u64) -> OrderPrices {
    let subtotal = items
        .iter()
        .map(|item| item.unit_price.saturating_mul(u64::from(item.quantity)))
        .fold(0u64, u64::saturating_add);

    let gross = subtotal
        .saturating_add(shipping)
        .saturating_add(delivery_fee);

    OrderPrices {
        subtotal,
        shipping,
        discount,
        total: gross.saturating_sub(discount),
        delivery_fee,
    }
}

/// Picks the active zone containing `point`. Overlapping zones are resolved by
/// highest priority, then by lowest fee.
pub fn resolve_zone(state: &AppState, point: &GeoPoint) -> Option<DeliveryZone> {
    state
        .zones
        .iter()
        .filter(|entry| entry.status == ZoneStatus::Active)
        .filter(|entry| polygon::contains(&entry.geometry, point))
        .map(|entry| entry.value().clone())
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.delivery_fee.cmp(&a.delivery_fee))
        })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{price_order, resolve_zone};
    use crate::config::Config;
    use crate::geo::polygon::build_polygon;
    use crate::models::location::GeoPoint;
    use crate::models::order::OrderItem;
    use crate::models::zone::{DeliveryZone, ZoneCode, ZoneStatus};
    use crate::state::{AppState, Services};

    fn item(quantity: u32, unit_price: u64) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            name: "item".to_string(),
            quantity,
            unit_price,
        }
    }

    fn zone(priority: i32, fee: u64, status: ZoneStatus, size: f64) -> DeliveryZone {
        let points = [
            GeoPoint { lat: 0.0, lng: 0.0 },
            GeoPoint { lat: 0.0, lng: size },
            GeoPoint { lat: size, lng: size },
            GeoPoint { lat: size, lng: 0.0 },
        ];
        DeliveryZone {
            id: Uuid::new_v4(),
            code: ZoneCode::Central,
            name: "zone".to_string(),
            geometry: build_polygon(&points).unwrap(),
            landmarks: Vec::new(),
            delivery_fee: fee,
            priority,
            status,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn totals_add_fees_and_subtract_discount() {
        let prices = price_order(&[item(2, 1_500), item(1, 700)], 100, 500, 200);

        assert_eq!(prices.subtotal, 3_700);
        assert_eq!(prices.total, 3_700 + 100 + 500 - 200);
        assert_eq!(prices.delivery_fee, 500);
    }

    #[test]
    fn discount_never_drives_total_negative() {
        let prices = price_order(&[item(1, 100)], 0, 0, 1_000);
        assert_eq!(prices.total, 0);
    }

    #[test]
    fn highest_priority_zone_wins_and_inactive_zones_are_ignored() {
        let state = AppState::new(Config::default(), Services::offline());
        let wide = zone(1, 1_000, ZoneStatus::Active, 2.0);
        let narrow = zone(5, 500, ZoneStatus::Active, 1.0);
        let disabled = zone(10, 100, ZoneStatus::Inactive, 1.0);
        let narrow_id = narrow.id;
        for z in [wide, narrow, disabled] {
            state.zones.insert(z.id, z);
        }

        let inside_both = GeoPoint { lat: 0.5, lng: 0.5 };
        assert_eq!(resolve_zone(&state, &inside_both).map(|z| z.id), Some(narrow_id));

        let outside_all = GeoPoint { lat: 5.0, lng: 5.0 };
        assert!(resolve_zone(&state, &outside_all).is_none());
    }
}
