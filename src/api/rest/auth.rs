use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// The calling user, resolved from the `x-user-id` header on every request.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl Actor {
    /// Resolves a raw user id, as sent in the header or a query parameter.
    pub fn lookup(state: &AppState, raw: &str) -> Result<Actor, AppError> {
        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthorized("malformed user id".to_string()))?;

        state
            .users
            .get(&id)
            .map(|entry| Actor(entry.value().clone()))
            .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))
    }

    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.0.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{role:?} role required")))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.0.has_role(Role::SuperAdmin)
    }
}

impl Deref for Actor {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))?;

        let raw = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("malformed {USER_HEADER} header")))?;

        Actor::lookup(state, raw)
    }
}
