//! OpenAPI document for the REST and upgrade endpoints.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::dto::{ChatMessagesResponse, MessageDto};
use crate::api::handlers::system::HealthResponse;
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "chat-relay",
        description = "Real-time chat relay: WebSocket fan-out scoped by chat, with REST history."
    ),
    paths(
        crate::api::handlers::system::health_handler,
        crate::api::handlers::chat::list_messages,
        crate::ws::handler::ws_handler,
    ),
    components(schemas(
        HealthResponse,
        ChatMessagesResponse,
        MessageDto,
        ErrorResponse,
        ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Health and service metadata"),
        (name = "Chats", description = "Stored chat history"),
        (name = "Realtime", description = "WebSocket relay"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
