//! Boundary to the external live-chat provider.
//!
//! A provider is opened against a [`SourceTarget`] and, once it acknowledges,
//! hands back a [`SourceSession`]: a single-consumer channel of
//! [`SourceSignal`]s plus a handle to request termination.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ObserverError, SourceError};
use crate::models::chat_event::RawChatEvent;

/// Signals buffered between a provider and the observer.
pub const SIGNAL_CAPACITY: usize = 1024;

/// Which broadcast to observe. At least one reference is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTarget {
    pub live_id: Option<String>,
    pub channel_id: Option<String>,
}

impl SourceTarget {
    /// Build a target from optional references; blank values count as absent.
    pub fn new(
        live_id: Option<String>,
        channel_id: Option<String>,
    ) -> Result<Self, ObserverError> {
        let live_id = non_blank(live_id);
        let channel_id = non_blank(channel_id);
        if live_id.is_none() && channel_id.is_none() {
            return Err(ObserverError::MissingTarget);
        }
        Ok(Self {
            live_id,
            channel_id,
        })
    }
}

impl fmt::Display for SourceTarget {
    /// `liveId` wins when both references are given.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.live_id, &self.channel_id) {
            (Some(live), _) => write!(f, "liveId={live}"),
            (None, Some(channel)) => write!(f, "channelId={channel}"),
            (None, None) => write!(f, "<none>"),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lifecycle callbacks from a provider session, delivered in order.
#[derive(Debug, Clone)]
pub enum SourceSignal {
    Started,
    Event(RawChatEvent),
    Ended(String),
    Error(String),
}

/// Requests termination of a provider session. Dropping it has the same
/// effect as calling [`StopHandle::stop`].
#[derive(Debug)]
pub struct StopHandle(oneshot::Sender<()>);

impl StopHandle {
    pub fn stop(self) {
        let _ = self.0.send(());
    }
}

/// Observer side of an acknowledged provider session.
#[derive(Debug)]
pub struct SourceSession {
    pub signals: mpsc::Receiver<SourceSignal>,
    pub stop: StopHandle,
}

/// Provider side of a session: where to send signals and how to learn the
/// observer wants the session closed.
#[derive(Debug)]
pub struct SessionLink {
    pub signals: mpsc::Sender<SourceSignal>,
    pub stop: oneshot::Receiver<()>,
}

impl SessionLink {
    /// Whether the observer has asked for (or abandoned) this session.
    pub fn stop_requested(&mut self) -> bool {
        !matches!(self.stop.try_recv(), Err(oneshot::error::TryRecvError::Empty))
    }
}

impl SourceSession {
    /// Create the two connected ends of a session.
    pub fn pair() -> (SessionLink, SourceSession) {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();
        (
            SessionLink {
                signals: signal_tx,
                stop: stop_rx,
            },
            SourceSession {
                signals: signal_rx,
                stop: StopHandle(stop_tx),
            },
        )
    }
}

/// A live-chat provider.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Open a session for `target` and wait for the provider to acknowledge
    /// it. An `Err` means no session was created.
    async fn open(&self, target: &SourceTarget) -> Result<SourceSession, SourceError>;
}
