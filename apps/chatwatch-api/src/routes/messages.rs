//! Pull access to the retained chat history.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::models::chat_event::ChatEvent;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub fn router() -> Router<AppState> {
    Router::new().route("/messages", get(list_messages))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListMessagesParams {
    /// Maximum events to return (default 50, clamped to 1..=200). Values
    /// that are not integers fall back to the default.
    #[param(value_type = Option<i64>)]
    pub limit: Option<String>,
    /// Only return events with a greater id. Ignored unless a non-negative
    /// integer.
    #[param(value_type = Option<u64>)]
    pub since_id: Option<String>,
}

impl ListMessagesParams {
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT) as usize
    }

    pub fn since_id(&self) -> Option<u64> {
        self.since_id.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    pub ok: bool,
    pub running: bool,
    pub count: usize,
    /// Cursor for the next `sinceId`.
    pub last_id: u64,
    pub data: Vec<ChatEvent>,
}

#[utoipa::path(
    get,
    path = "/messages",
    tag = "Messages",
    params(ListMessagesParams),
    responses(
        (status = 200, description = "Most recent matching events, oldest first", body = ListMessagesResponse),
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListMessagesParams>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    let page = state.hub.query(params.since_id(), params.limit());

    Ok(Json(ListMessagesResponse {
        ok: true,
        running: state.observer.is_running(),
        count: page.count(),
        last_id: page.last_id,
        data: page.data.iter().map(|e| e.as_ref().clone()).collect(),
    }))
}
