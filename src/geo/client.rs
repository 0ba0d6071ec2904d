//! Clients for the external geocoding and routing services.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::location::{GeoPoint, RouteEstimate};

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("no result")]
    NoResult,

    #[error("service unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub label: String,
    pub location: GeoPoint,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, point: GeoPoint) -> Result<String, GeoError>;

    async fn search(&self, query: &str) -> Result<Vec<Place>, GeoError>;
}

#[async_trait]
pub trait RouteDistance: Send + Sync {
    /// Road distance and travel time between two points.
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteEstimate, GeoError>;
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("courier-market/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Nominatim-compatible geocoder.
#[derive(Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
    error: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: http_client(timeout),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, point: GeoPoint) -> Result<String, GeoError> {
        let response = self
            .client
            .get(self.url("reverse"))
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", point.lat.to_string()),
                ("lon", point.lng.to_string()),
            ])
            .send()
            .await
            .map_err(|err| GeoError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| GeoError::Request(err.to_string()))?;

        let body: NominatimReverse = response
            .json()
            .await
            .map_err(|err| GeoError::Response(err.to_string()))?;

        match (body.display_name, body.error) {
            (Some(name), _) => Ok(name),
            (None, Some(err)) => Err(GeoError::Response(err)),
            (None, None) => Err(GeoError::NoResult),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<Place>, GeoError> {
        let response = self
            .client
            .get(self.url("search"))
            .query(&[("format", "jsonv2"), ("q", query)])
            .send()
            .await
            .map_err(|err| GeoError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| GeoError::Request(err.to_string()))?;

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|err| GeoError::Response(err.to_string()))?;

        places
            .into_iter()
            .map(|place| {
                let lat = place
                    .lat
                    .parse::<f64>()
                    .map_err(|err| GeoError::Response(format!("bad lat: {err}")))?;
                let lng = place
                    .lon
                    .parse::<f64>()
                    .map_err(|err| GeoError::Response(format!("bad lon: {err}")))?;
                Ok(Place {
                    label: place.display_name,
                    location: GeoPoint { lat, lng },
                })
            })
            .collect()
    }
}

/// OSRM-compatible routing client.
#[derive(Clone)]
pub struct OsrmRouter {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: http_client(timeout),
        }
    }
}

#[async_trait]
impl RouteDistance for OsrmRouter {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteEstimate, GeoError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url.trim_end_matches('/'),
            from.lng,
            from.lat,
            to.lng,
            to.lat
        );

        let response = self
            .client
            .get(url)
            .query(&[("overview", "false")])
            .send()
            .await
            .map_err(|err| GeoError::Request(err.to_string()))?
            .error_for_status()
            .map_err(|err| GeoError::Request(err.to_string()))?;

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| GeoError::Response(err.to_string()))?;

        if body.code != "Ok" {
            return Err(GeoError::Response(format!("routing code {}", body.code)));
        }

        let route = body.routes.first().ok_or(GeoError::NoResult)?;
        Ok(RouteEstimate {
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}

/// Stand-in used when no external geo services are reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

#[async_trait]
impl Geocoder for Offline {
    async fn reverse(&self, _point: GeoPoint) -> Result<String, GeoError> {
        Err(GeoError::Unavailable)
    }

    async fn search(&self, _query: &str) -> Result<Vec<Place>, GeoError> {
        Err(GeoError::Unavailable)
    }
}

#[async_trait]
impl RouteDistance for Offline {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<RouteEstimate, GeoError> {
        Err(GeoError::Unavailable)
    }
}
