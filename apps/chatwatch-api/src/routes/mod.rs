pub mod health;
pub mod messages;
pub mod observer;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(observer::router())
        .merge(messages::router())
        .merge(crate::gateway::server::router())
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Observer
        observer::start,
        observer::stop,
        observer::status,
        // Messages
        messages::list_messages,
        // Stream
        crate::gateway::server::stream_events,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::models::chat_event::ChatEvent,
            observer::StartParams,
            observer::StartResponse,
            observer::StopResponse,
            observer::StatusResponse,
            messages::ListMessagesResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Observer", description = "Observer lifecycle"),
        (name = "Messages", description = "Retained chat history"),
        (name = "Stream", description = "Live push of accepted chat events"),
    )
)]
pub struct ApiDoc;
