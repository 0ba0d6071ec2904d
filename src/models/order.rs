use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    AcceptedByMerchant,
    ReadyToDeliver,
    AcceptedByDriver,
    OnTheWay,
    Completed,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::AcceptedByMerchant,
        OrderStatus::ReadyToDeliver,
        OrderStatus::AcceptedByDriver,
        OrderStatus::OnTheWay,
        OrderStatus::Completed,
        OrderStatus::Canceled,
        OrderStatus::Rejected,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Statuses during which the assigned driver's position is tracked.
    pub fn is_tracked(self) -> bool {
        matches!(self, OrderStatus::AcceptedByDriver | OrderStatus::OnTheWay)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::AcceptedByMerchant => "ACCEPTED_BY_MERCHANT",
            OrderStatus::ReadyToDeliver => "READY_TO_DELIVER",
            OrderStatus::AcceptedByDriver => "ACCEPTED_BY_DRIVER",
            OrderStatus::OnTheWay => "ON_THE_WAY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: u64,
}

/// Amounts in minor currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderPrices {
    pub subtotal: u64,
    pub shipping: u64,
    pub discount: u64,
    pub total: u64,
    pub delivery_fee: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub address: String,
    pub coordinates: GeoPoint,
    pub contact: Contact,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    pub merchant_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub prices: OrderPrices,
    pub delivery_info: DeliveryInfo,
    #[serde(skip_serializing)]
    pub pickup_code: String,
    #[serde(skip_serializing)]
    pub delivery_code: String,
    pub delivery_zone_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
