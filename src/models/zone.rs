use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneCode {
    Central,
    Intermediate,
    Peripheral,
    Extended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneStatus {
    Active,
    Inactive,
}

/// GeoJSON geometry. Positions are `[lng, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmark {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryZone {
    pub id: Uuid,
    pub code: ZoneCode,
    pub name: String,
    pub geometry: Geometry,
    pub landmarks: Vec<Landmark>,
    pub delivery_fee: u64,
    pub priority: i32,
    pub status: ZoneStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryZone {
    /// Records a geometry or landmark edit. Concurrent editors are not detected.
    pub fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
        self.updated_at = Utc::now();
    }
}
