use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::auth::Actor;
use crate::engine::orders::can_view;
use crate::engine::tracking;
use crate::error::AppError;
use crate::models::location::TrackingUpdate;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TrackingQuery {
    pub user_id: Option<String>,
}

pub async fn tracking_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    header_actor: Option<Actor>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<TrackingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = resolve_viewer(&state, header_actor, &query)?;
    authorize(&state, &viewer, order_id)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, order_id)))
}

/// Browser websocket clients cannot set headers, so the user id may also be
/// passed as `?user_id=`.
fn resolve_viewer(
    state: &AppState,
    header_actor: Option<Actor>,
    query: &TrackingQuery,
) -> Result<Actor, AppError> {
    match (header_actor, query.user_id.as_deref()) {
        (Some(actor), _) => Ok(actor),
        (None, Some(raw)) => Actor::lookup(state, raw),
        (None, None) => Err(AppError::Unauthorized("missing user id".to_string())),
    }
}

fn authorize(state: &AppState, viewer: &Actor, order_id: Uuid) -> Result<(), AppError> {
    let allowed = state
        .orders
        .get(&order_id)
        .is_some_and(|order| can_view(state, viewer, &order));
    if allowed {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("order {order_id} not found")))
    }
}

fn encode(update: &TrackingUpdate) -> Option<Message> {
    match serde_json::to_string(update) {
        Ok(json) => Some(Message::Text(json)),
        Err(err) => {
            warn!(error = %err, "failed to serialize tracking update for ws");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, order_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = BroadcastStream::new(state.tracking_tx.subscribe());
    let current = tracking::snapshot(&state, order_id);

    info!(order_id = %order_id, "tracking client connected");

    let send_task = tokio::spawn(async move {
        if let Some(message) = current.as_ref().and_then(encode) {
            if sender.send(message).await.is_err() {
                return;
            }
        }

        while let Some(item) = updates.next().await {
            let update = match item {
                Ok(update) if update.order_id == order_id => update,
                Ok(_) => continue,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(order_id = %order_id, skipped, "tracking client lagged");
                    continue;
                }
            };

            let Some(message) = encode(&update) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(order_id = %order_id, "tracking client disconnected");
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{TrackingQuery, resolve_viewer};
    use crate::api::rest::auth::Actor;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::user::User;
    use crate::state::{AppState, Services};

    fn state_with(user: &User) -> AppState {
        let state = AppState::new(Config::default(), Services::offline());
        state.users.insert(user.id, user.clone());
        state
    }

    #[test]
    fn query_parameter_identifies_browser_clients() {
        let user = User::new("Carine".to_string(), "+237600000002".to_string(), None);
        let state = state_with(&user);
        let query = TrackingQuery {
            user_id: Some(user.id.to_string()),
        };

        let viewer = resolve_viewer(&state, None, &query).unwrap();
        assert_eq!(viewer.id, user.id);
    }

    #[test]
    fn header_takes_precedence_over_query() {
        let user = User::new("Carine".to_string(), "+237600000002".to_string(), None);
        let state = state_with(&user);
        let query = TrackingQuery {
            user_id: Some(Uuid::new_v4().to_string()),
        };

        let viewer = resolve_viewer(&state, Some(Actor(user.clone())), &query).unwrap();
        assert_eq!(viewer.id, user.id);
    }

    #[test]
    fn missing_or_unknown_ids_are_unauthorized() {
        let user = User::new("Carine".to_string(), "+237600000002".to_string(), None);
        let state = state_with(&user);

        let missing = resolve_viewer(&state, None, &TrackingQuery::default());
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));

        let unknown = TrackingQuery {
            user_id: Some(Uuid::new_v4().to_string()),
        };
        assert!(matches!(
            resolve_viewer(&state, None, &unknown),
            Err(AppError::Unauthorized(_))
        ));

        let malformed = TrackingQuery {
            user_id: Some("not-a-uuid".to_string()),
        };
        assert!(matches!(
            resolve_viewer(&state, None, &malformed),
            Err(AppError::Unauthorized(_))
        ));
    }
}
