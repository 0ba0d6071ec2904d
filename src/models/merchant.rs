use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MerchantType {
    Restaurant,
    Grocery,
    Pharmacy,
    Shop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: Uuid,
    pub name: String,
    pub merchant_type: MerchantType,
    pub manager_ids: Vec<Uuid>,
    pub address: String,
    pub location: GeoPoint,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    pub fn is_managed_by(&self, user_id: Uuid) -> bool {
        self.manager_ids.contains(&user_id)
    }
}
