//! Chat history handler.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::api::dto::{ChatMessagesResponse, MessageDto, PaginationParams};
use crate::app_state::AppState;
use crate::auth::Principal;
use crate::domain::ChatId;
use crate::error::{ErrorResponse, RelayError};

/// `GET /chats/{chat_id}/messages` — Stored messages of a chat.
///
/// # Errors
///
/// Returns [`RelayError::Unauthorized`] without a valid token and
/// [`RelayError::Persistence`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/chats/{chat_id}/messages",
    tag = "Chats",
    summary = "List chat messages",
    description = "Returns a page of a chat's stored messages, oldest first.",
    params(
        ("chat_id" = i64, Path, description = "Chat identifier"),
        PaginationParams,
    ),
    responses(
        (status = 200, description = "Message page", body = ChatMessagesResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
    Path(chat_id): Path<i64>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let Some(Extension(principal)) = principal else {
        return Err(RelayError::Unauthorized);
    };
    let params = params.clamped();

    let messages = state
        .store
        .messages_for_chat(ChatId::new(chat_id), params.to_page())
        .await?;
    tracing::debug!(
        username = %principal.username,
        chat_id,
        count = messages.len(),
        "chat history served"
    );

    let messages: Vec<MessageDto> = messages.into_iter().map(MessageDto::from).collect();
    Ok(Json(ChatMessagesResponse {
        count: messages.len(),
        messages,
        page: params.page,
        per_page: params.per_page,
    }))
}

/// Chat routes, nested under `/api/v1` by the caller.
pub fn routes() -> Router<AppState> {
    Router::new().route("/chats/{chat_id}/messages", get(list_messages))
}
