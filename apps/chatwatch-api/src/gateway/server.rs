//! Server-sent-events endpoint and per-connection stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::AppState;

use super::events::{HelloPayload, StreamRecord};
use super::fanout::{FanoutHub, Subscription};

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(stream_events))
}

#[utoipa::path(
    get,
    path = "/stream",
    tag = "Stream",
    responses(
        (status = 200, description = "Event stream: `hello`, periodic `ping`, and one data record per accepted chat event", content_type = "text/event-stream", body = String),
    )
)]
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let records = subscriber_stream(
        &state.hub,
        state.observer.is_running(),
        state.config.ping_interval,
    );
    Sse::new(records.map(|record| Ok(record.to_sse())))
}

/// Live state of one connection. Dropping it unregisters the subscriber and
/// cancels its keep-alive timer.
struct Connection {
    subscription: Subscription,
    ping: Interval,
}

/// Register a subscriber and build its record stream: one `hello`, then
/// accepted events and keep-alive pings until the subscriber is dropped.
pub fn subscriber_stream(
    hub: &FanoutHub,
    running: bool,
    ping_every: Duration,
) -> impl Stream<Item = StreamRecord> + Send + 'static {
    // Register before reading last_id so nothing falls between the two.
    let subscription = hub.register();
    let hello = StreamRecord::Hello(HelloPayload {
        running,
        last_id: hub.last_id(),
    });
    tracing::info!(
        subscriber_id = %subscription.id(),
        subscribers = hub.subscriber_count(),
        "stream subscriber connected"
    );

    let mut ping = time::interval_at(Instant::now() + ping_every, ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let connection = Connection { subscription, ping };

    stream::once(async move { hello }).chain(stream::unfold(connection, |mut conn| async move {
        let record = tokio::select! {
            event = conn.subscription.recv() => event.map(StreamRecord::Chat),
            _ = conn.ping.tick() => Some(StreamRecord::Ping),
        };
        if record.is_none() {
            tracing::debug!(subscriber_id = %conn.subscription.id(), "subscriber dropped by hub");
        }
        record.map(|r| (r, conn))
    }))
}
