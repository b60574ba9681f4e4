//! Observer lifecycle endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiErrorBody};
use crate::extract::{ApiQuery, OptionalJson};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", get(start).post(start))
        .route("/stop", get(stop).post(stop))
        .route("/status", get(status))
}

// ---------------------------------------------------------------------------
// /start
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StartParams {
    /// Broadcast id to observe.
    pub live_id: Option<String>,
    /// Channel whose current broadcast to observe.
    pub channel_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartResponse {
    pub ok: bool,
    pub msg: String,
    pub running: bool,
    pub keywords: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/start",
    tag = "Observer",
    params(StartParams),
    request_body(content = StartParams, description = "Optional; alternative to the query parameters"),
    responses(
        (status = 200, description = "Start attempted; `ok` is false if the source refused", body = StartResponse),
        (status = 400, description = "Neither liveId nor channelId given, or a malformed body", body = ApiErrorBody),
    )
)]
pub async fn start(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StartParams>,
    OptionalJson(body): OptionalJson<StartParams>,
) -> Result<Json<StartResponse>, ApiError> {
    // Body fields win over query fields.
    let body = body.unwrap_or_default();
    let outcome = state
        .observer
        .start(
            body.live_id.or(query.live_id),
            body.channel_id.or(query.channel_id),
        )
        .await?;

    Ok(Json(StartResponse {
        ok: outcome.ok,
        msg: outcome.msg,
        running: outcome.running,
        keywords: state.observer.keywords().to_vec(),
    }))
}

// ---------------------------------------------------------------------------
// /stop
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct StopResponse {
    pub ok: bool,
    pub msg: String,
    pub running: bool,
}

#[utoipa::path(
    post,
    path = "/stop",
    tag = "Observer",
    responses(
        (status = 200, description = "Observer idle", body = StopResponse),
    )
)]
pub async fn stop(State(state): State<AppState>) -> Json<StopResponse> {
    let outcome = state.observer.stop();
    Json(StopResponse {
        ok: true,
        msg: outcome.msg,
        running: state.observer.is_running(),
    })
}

// ---------------------------------------------------------------------------
// /status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub buffer_size: usize,
    pub last_id: u64,
    pub keywords: Vec<String>,
    pub consumer_count: usize,
}

#[utoipa::path(
    get,
    path = "/status",
    tag = "Observer",
    responses(
        (status = 200, description = "Current observer state", body = StatusResponse),
    )
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.observer.status();
    tracing::debug!(
        running = status.running,
        buffer_size = status.buffer_size,
        oldest_id = ?status.oldest_id,
        last_id = status.last_id,
        "status requested"
    );
    let (live_id, channel_id) = status
        .target
        .map(|t| (t.live_id, t.channel_id))
        .unwrap_or_default();

    Json(StatusResponse {
        ok: true,
        running: status.running,
        live_id,
        channel_id,
        buffer_size: status.buffer_size,
        last_id: status.last_id,
        keywords: status.keywords,
        consumer_count: status.consumer_count,
    })
}
