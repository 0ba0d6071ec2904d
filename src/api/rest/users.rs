use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::info;

use crate::api::rest::auth::Actor;
use crate::error::AppError;
use crate::models::user::{DriverDocuments, DriverStatus, Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register))
        .route("/me", get(me))
        .route("/drivers/apply", post(apply_as_driver))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct DriverApplication {
    pub documents: DriverDocuments,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    let name = payload.name.trim();
    let phone = payload.phone.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if phone.is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }

    let email = payload
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());
    if email.as_deref().is_some_and(|email| !email.contains('@')) {
        return Err(AppError::BadRequest("email is malformed".to_string()));
    }

    let _gate = state.write_gate.write().await;
    if state.users.iter().any(|entry| entry.phone == phone) {
        return Err(AppError::Conflict(format!("phone {phone} is already registered")));
    }

    let user = User::new(name.to_string(), phone.to_string(), email);
    state.users.insert(user.id, user.clone());
    info!(user_id = %user.id, "user registered");

    Ok(Json(user))
}

async fn me(actor: Actor) -> Json<User> {
    Json(actor.0)
}

async fn apply_as_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<DriverApplication>,
) -> Result<Json<User>, AppError> {
    let docs = &payload.documents;
    if [&docs.cni_front, &docs.cni_back, &docs.driver_document]
        .iter()
        .any(|url| url.trim().is_empty())
    {
        return Err(AppError::BadRequest(
            "identity card (both sides) and driver document are required".to_string(),
        ));
    }

    let mut user = state
        .users
        .get_mut(&actor.id)
        .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))?;

    match user.driver_status {
        Some(DriverStatus::Banned) => {
            return Err(AppError::Forbidden("account is banned from driving".to_string()));
        }
        Some(DriverStatus::Approved) => {
            return Err(AppError::Conflict("driver is already approved".to_string()));
        }
        _ => {}
    }

    user.grant(Role::Driver);
    user.driver_status = Some(DriverStatus::Pending);
    user.driver_documents = Some(payload.documents);

    info!(user_id = %user.id, "driver application submitted");
    Ok(Json(user.clone()))
}
