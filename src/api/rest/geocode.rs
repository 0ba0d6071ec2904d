use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::client::{GeoError, Place};
use crate::models::location::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geo/reverse", get(reverse))
        .route("/geo/search", get(search))
}

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Serialize)]
pub struct ReverseResponse {
    pub address: String,
}

fn upstream(err: GeoError) -> AppError {
    match err {
        GeoError::NoResult => AppError::NotFound("no matching place".to_string()),
        other => AppError::Upstream(format!("geocoding failed: {other}")),
    }
}

async fn reverse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<ReverseResponse>, AppError> {
    let point = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    if !point.is_valid() {
        return Err(AppError::BadRequest("coordinates are out of range".to_string()));
    }

    let address = state.services.geocoder.reverse(point).await.map_err(upstream)?;
    Ok(Json(ReverseResponse { address }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Place>>, AppError> {
    let q = query.q.trim();
    if q.len() < 3 {
        return Err(AppError::BadRequest("query must be at least 3 characters".to_string()));
    }

    let places = state.services.geocoder.search(q).await.map_err(upstream)?;
    Ok(Json(places))
}
