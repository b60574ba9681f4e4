//! Observer lifecycle: owns the single provider session and feeds its
//! signals through the keyword gate into the fan-out hub.
//!
//! ```text
//! Idle --start(ok ack)--> Running --stop / Ended--> Idle
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatwatch_common::id::{prefix, prefixed_ulid};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::source::{ChatSource, SourceSession, SourceSignal, SourceTarget, StopHandle};
use crate::error::ObserverError;
use crate::gateway::fanout::FanoutHub;
use crate::keywords::KeywordMatcher;
use crate::models::chat_event::{normalize, ChatEvent, RawChatEvent};

/// How long `start` waits for the provider to acknowledge a session.
const START_TIMEOUT: Duration = Duration::from_secs(20);

struct ActiveSession {
    session_id: String,
    target: SourceTarget,
    stop: StopHandle,
    pump: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Running(ActiveSession),
}

/// Outcome of [`Observer::start`]. Provider failures are reported here
/// rather than as errors.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub ok: bool,
    pub msg: String,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub msg: String,
}

#[derive(Debug, Clone)]
pub struct ObserverStatus {
    pub running: bool,
    pub target: Option<SourceTarget>,
    pub buffer_size: usize,
    pub oldest_id: Option<u64>,
    pub last_id: u64,
    pub consumer_count: usize,
    pub keywords: Vec<String>,
}

pub struct Observer {
    source: Arc<dyn ChatSource>,
    matcher: Arc<KeywordMatcher>,
    hub: Arc<FanoutHub>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    /// Serializes concurrent `start` calls across the acknowledgement wait.
    starting: tokio::sync::Mutex<()>,
    /// Bumped by every `stop`; a `start` that sees it change while waiting
    /// on the source abandons its session.
    stop_generation: AtomicU64,
}

impl Observer {
    pub fn new(
        source: Arc<dyn ChatSource>,
        matcher: Arc<KeywordMatcher>,
        hub: Arc<FanoutHub>,
    ) -> Self {
        Self {
            source,
            matcher,
            hub,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Idle)),
            starting: tokio::sync::Mutex::new(()),
            stop_generation: AtomicU64::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    pub fn keywords(&self) -> &[String] {
        self.matcher.keywords()
    }

    /// Open a provider session for the given references.
    ///
    /// Fails only when no reference is given. A provider that refuses or
    /// times out yields `ok: false` and leaves the observer idle.
    pub async fn start(
        &self,
        live_id: Option<String>,
        channel_id: Option<String>,
    ) -> Result<StartOutcome, ObserverError> {
        let target = SourceTarget::new(live_id, channel_id)?;
        let _starting = self.starting.lock().await;

        let running_target = match &*self.lifecycle.lock() {
            Lifecycle::Running(active) => Some(active.target.clone()),
            Lifecycle::Idle => None,
        };
        if let Some(current) = running_target {
            return Ok(StartOutcome {
                ok: true,
                msg: format!("already running ({current})"),
                running: true,
            });
        }

        let generation = self.stop_generation.load(Ordering::Acquire);
        tracing::info!(%target, "opening chat source");
        let session = match tokio::time::timeout(START_TIMEOUT, self.source.open(&target)).await {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => {
                tracing::warn!(%target, %err, "chat source failed to start");
                return Ok(StartOutcome {
                    ok: false,
                    msg: err.to_string(),
                    running: false,
                });
            }
            Err(_elapsed) => {
                tracing::warn!(%target, "chat source did not acknowledge in time");
                return Ok(StartOutcome {
                    ok: false,
                    msg: "chat source did not acknowledge in time".to_string(),
                    running: false,
                });
            }
        };

        let session_id = prefixed_ulid(prefix::SESSION);
        let SourceSession { signals, stop } = session;
        let pump = SignalPump {
            session_id: session_id.clone(),
            matcher: self.matcher.clone(),
            hub: self.hub.clone(),
            lifecycle: self.lifecycle.clone(),
        };

        // Spawn under the lock so the pump cannot observe the session
        // ending before it is recorded as running.
        let cancelled = {
            let mut lifecycle = self.lifecycle.lock();
            if self.stop_generation.load(Ordering::Acquire) != generation {
                Some(stop)
            } else {
                let handle = tokio::spawn(pump.run(signals));
                *lifecycle = Lifecycle::Running(ActiveSession {
                    session_id: session_id.clone(),
                    target: target.clone(),
                    stop,
                    pump: handle,
                });
                None
            }
        };
        if let Some(stop) = cancelled {
            stop.stop();
            tracing::info!(%target, "start abandoned: stop requested while opening");
            return Ok(StartOutcome {
                ok: false,
                msg: "stopped before the chat source acknowledged".to_string(),
                running: false,
            });
        }

        tracing::info!(%session_id, %target, "observer running");
        Ok(StartOutcome {
            ok: true,
            msg: format!("started ({target})"),
            running: true,
        })
    }

    /// Terminate the current session, if any. Always leaves the observer idle.
    pub fn stop(&self) -> StopOutcome {
        self.stop_generation.fetch_add(1, Ordering::AcqRel);
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Idle);
        match previous {
            Lifecycle::Running(active) => {
                active.stop.stop();
                active.pump.abort();
                tracing::info!(session_id = %active.session_id, target = %active.target, "observer stopped");
                StopOutcome {
                    msg: "stopped".to_string(),
                }
            }
            Lifecycle::Idle => StopOutcome {
                msg: "not running".to_string(),
            },
        }
    }

    pub fn status(&self) -> ObserverStatus {
        let target = match &*self.lifecycle.lock() {
            Lifecycle::Running(active) => Some(active.target.clone()),
            Lifecycle::Idle => None,
        };
        ObserverStatus {
            running: target.is_some(),
            target,
            buffer_size: self.hub.history_len(),
            oldest_id: self.hub.oldest_id(),
            last_id: self.hub.last_id(),
            consumer_count: self.hub.subscriber_count(),
            keywords: self.matcher.keywords().to_vec(),
        }
    }
}

/// Gate a raw event on its text and publish it if relevant. Ids are only
/// consumed by accepted events.
pub fn ingest(matcher: &KeywordMatcher, hub: &FanoutHub, raw: &RawChatEvent) -> Option<Arc<ChatEvent>> {
    if !matcher.matches(&raw.text()) {
        return None;
    }
    Some(hub.publish(|id| normalize(raw, id)))
}

/// Consumes one session's signals, one at a time.
struct SignalPump {
    session_id: String,
    matcher: Arc<KeywordMatcher>,
    hub: Arc<FanoutHub>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl SignalPump {
    async fn run(self, mut signals: mpsc::Receiver<SourceSignal>) {
        while let Some(signal) = signals.recv().await {
            match signal {
                SourceSignal::Started => {
                    tracing::info!(session_id = %self.session_id, "chat source started");
                }
                SourceSignal::Event(raw) => {
                    if let Some(event) = ingest(&self.matcher, &self.hub, &raw) {
                        tracing::debug!(
                            session_id = %self.session_id,
                            event_id = event.id(),
                            author = event.author().unwrap_or("-"),
                            "chat event accepted"
                        );
                    }
                }
                SourceSignal::Error(message) => {
                    tracing::warn!(session_id = %self.session_id, %message, "chat source error");
                }
                SourceSignal::Ended(reason) => {
                    self.finish(&reason);
                    return;
                }
            }
        }
        self.finish("source closed");
    }

    /// Return to idle, unless this session was already replaced or stopped.
    fn finish(&self, reason: &str) {
        let mut lifecycle = self.lifecycle.lock();
        let current = matches!(
            &*lifecycle,
            Lifecycle::Running(active) if active.session_id == self.session_id
        );
        if current {
            *lifecycle = Lifecycle::Idle;
            tracing::info!(session_id = %self.session_id, %reason, "chat source ended");
        }
    }
}
