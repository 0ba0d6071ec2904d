use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::deletion;
use crate::error::AppError;
use crate::geo::polygon::build_polygon;
use crate::models::location::GeoPoint;
use crate::models::user::Role;
use crate::models::zone::{DeliveryZone, Landmark, ZoneCode, ZoneStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/zones", get(active_zones))
        .route("/admin/zones", post(create_zone).get(list_zones))
        .route(
            "/admin/zones/:id",
            get(get_zone).patch(update_zone).delete(delete_zone),
        )
        .route("/admin/zones/:id/geometry", put(replace_geometry))
        .route("/admin/zones/:id/landmarks", post(add_landmark))
        .route(
            "/admin/zones/:id/landmarks/:landmark_id",
            delete(remove_landmark),
        )
}

#[derive(Deserialize)]
pub struct CreateZoneRequest {
    pub code: ZoneCode,
    pub name: String,
    pub points: Vec<GeoPoint>,
    pub delivery_fee: u64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub landmarks: Vec<LandmarkRequest>,
}

#[derive(Deserialize)]
pub struct UpdateZoneRequest {
    pub name: Option<String>,
    pub code: Option<ZoneCode>,
    pub delivery_fee: Option<u64>,
    pub priority: Option<i32>,
    pub status: Option<ZoneStatus>,
}

#[derive(Deserialize)]
pub struct GeometryRequest {
    pub points: Vec<GeoPoint>,
}

#[derive(Deserialize)]
pub struct LandmarkRequest {
    pub name: String,
    pub location: GeoPoint,
}

fn new_landmark(request: LandmarkRequest) -> Result<Landmark, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("landmark name cannot be empty".to_string()));
    }
    if !request.location.is_valid() {
        return Err(AppError::BadRequest("landmark location is out of range".to_string()));
    }

    Ok(Landmark {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        location: request.location,
    })
}

fn zone_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("zone {id} not found"))
}

fn sorted(mut zones: Vec<DeliveryZone>) -> Vec<DeliveryZone> {
    zones.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
    zones
}

async fn active_zones(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryZone>> {
    let zones = state
        .zones
        .iter()
        .filter(|entry| entry.status == ZoneStatus::Active)
        .map(|entry| entry.value().clone())
        .collect();

    Json(sorted(zones))
}

async fn create_zone(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateZoneRequest>,
) -> Result<Json<DeliveryZone>, AppError> {
    actor.require(Role::SuperAdmin)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    let geometry =
        build_polygon(&payload.points).map_err(|err| AppError::BadRequest(err.to_string()))?;
    let landmarks = payload
        .landmarks
        .into_iter()
        .map(new_landmark)
        .collect::<Result<Vec<_>, _>>()?;

    let now = Utc::now();
    let zone = DeliveryZone {
        id: Uuid::new_v4(),
        code: payload.code,
        name: payload.name.trim().to_string(),
        geometry,
        landmarks,
        delivery_fee: payload.delivery_fee,
        priority: payload.priority,
        status: ZoneStatus::Active,
        version: 1,
        created_at: now,
        updated_at: now,
    };
    state.zones.insert(zone.id, zone.clone());
    info!(zone_id = %zone.id, name = %zone.name, "zone created");

    Ok(Json(zone))
}

async fn list_zones(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DeliveryZone>>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let zones = state
        .zones
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(sorted(zones)))
}

async fn get_zone(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryZone>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let zone = state.zones.get(&id).ok_or_else(|| zone_not_found(id))?;
    Ok(Json(zone.value().clone()))
}

async fn update_zone(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateZoneRequest>,
) -> Result<Json<DeliveryZone>, AppError> {
    actor.require(Role::SuperAdmin)?;

    if payload.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let mut zone = state.zones.get_mut(&id).ok_or_else(|| zone_not_found(id))?;
    if let Some(name) = payload.name {
        zone.name = name.trim().to_string();
    }
    if let Some(code) = payload.code {
        zone.code = code;
    }
    if let Some(fee) = payload.delivery_fee {
        zone.delivery_fee = fee;
    }
    if let Some(priority) = payload.priority {
        zone.priority = priority;
    }
    if let Some(status) = payload.status {
        zone.status = status;
    }
    zone.updated_at = Utc::now();

    Ok(Json(zone.clone()))
}

async fn replace_geometry(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<GeometryRequest>,
) -> Result<Json<DeliveryZone>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let geometry =
        build_polygon(&payload.points).map_err(|err| AppError::BadRequest(err.to_string()))?;

    let mut zone = state.zones.get_mut(&id).ok_or_else(|| zone_not_found(id))?;
    zone.geometry = geometry;
    zone.bump_version();
    info!(zone_id = %id, version = zone.version, "zone geometry replaced");

    Ok(Json(zone.clone()))
}

async fn add_landmark(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<LandmarkRequest>,
) -> Result<Json<DeliveryZone>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let landmark = new_landmark(payload)?;
    let mut zone = state.zones.get_mut(&id).ok_or_else(|| zone_not_found(id))?;
    zone.landmarks.push(landmark);
    zone.bump_version();

    Ok(Json(zone.clone()))
}

async fn remove_landmark(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path((id, landmark_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeliveryZone>, AppError> {
    actor.require(Role::SuperAdmin)?;

    let mut zone = state.zones.get_mut(&id).ok_or_else(|| zone_not_found(id))?;
    let before = zone.landmarks.len();
    zone.landmarks.retain(|landmark| landmark.id != landmark_id);
    if zone.landmarks.len() == before {
        return Err(AppError::NotFound(format!("landmark {landmark_id} not found")));
    }
    zone.bump_version();

    Ok(Json(zone.clone()))
}

async fn delete_zone(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    actor.require(Role::SuperAdmin)?;

    deletion::delete_zone(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
