//! Axum WebSocket upgrade handler.

use axum::Extension;
use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use utoipa::IntoParams;

use super::connection::{Connection, ConnectionIdentity};
use crate::app_state::AppState;
use crate::auth::Principal;
use crate::domain::ChatId;
use crate::error::{ErrorResponse, RelayError};

/// Query parameters accepted by `GET /ws`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConnectParams {
    /// Chat the connection is scoped to.
    pub chat_id: Option<String>,
    /// Bearer token for clients that cannot send an `Authorization` header.
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The caller must be authenticated and must name the chat to join.
/// Establishment failures are answered with a plain HTTP error and the
/// connection never reaches the hub.
#[utoipa::path(
    get,
    path = "/ws",
    tag = "Realtime",
    summary = "Open a chat WebSocket",
    description = "Upgrades to a WebSocket scoped to `chat_id`. Frames are JSON envelopes `{\"content\": string, \"chat_id\": integer?}`.",
    params(ConnectParams),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 400, description = "Missing or invalid chat_id", body = ErrorResponse),
        (status = 401, description = "No authenticated caller", body = ErrorResponse),
        (status = 404, description = "Caller is not a known user", body = ErrorResponse),
    )
)]
pub async fn ws_handler(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    Query(params): Query<ConnectParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let identity = match establish(&state, principal.map(|Extension(p)| p), &params).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::info!(error = %err, "websocket establishment rejected");
            return err.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let settings = state.settings;
    let connection = Connection::new(
        identity,
        state.hub.clone(),
        std::sync::Arc::clone(&state.store),
        settings,
    );

    ws.max_message_size(settings.max_frame_bytes)
        .max_frame_size(settings.max_frame_bytes)
        .on_upgrade(move |socket| async move {
            let _ = connection.run(socket).await;
        })
}

/// Validates the caller and scope of an upgrade request.
///
/// # Errors
///
/// - [`RelayError::Unauthorized`] when no principal is attached.
/// - [`RelayError::UserNotFound`] when the principal is unknown.
/// - [`RelayError::InvalidRequest`] when `chat_id` is missing, not an
///   integer, or not a positive identifier.
pub async fn establish(
    state: &AppState,
    principal: Option<Principal>,
    params: &ConnectParams,
) -> Result<ConnectionIdentity, RelayError> {
    let principal = principal.ok_or(RelayError::Unauthorized)?;
    let user_id = state.identities.resolve(&principal).await?;

    let raw = params
        .chat_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("missing chat_id parameter".to_string()))?;
    let chat_id: ChatId = raw
        .parse()
        .map_err(|_| RelayError::InvalidRequest(format!("invalid chat_id: {raw}")))?;
    if !chat_id.is_assigned() {
        return Err(RelayError::InvalidRequest(format!("invalid chat_id: {raw}")));
    }

    Ok(ConnectionIdentity::new(user_id, chat_id))
}
