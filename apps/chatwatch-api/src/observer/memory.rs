//! In-process chat source driven by hand.
//!
//! Used by the test suite and handy for local runs without a relay: open
//! outcomes are scripted and signals are pushed through [`MemorySource::emit`].

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::source::{ChatSource, SessionLink, SourceSession, SourceSignal, SourceTarget};
use crate::error::SourceError;
use crate::models::chat_event::RawChatEvent;

#[derive(Default)]
struct MemoryState {
    fail_next: Option<String>,
    active: Option<SessionLink>,
    opened: Vec<SourceTarget>,
}

#[derive(Default)]
pub struct MemorySource {
    state: Mutex<MemoryState>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail with `reason`.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.state.lock().fail_next = Some(reason.into());
    }

    /// Targets passed to `open`, in call order.
    pub fn opened(&self) -> Vec<SourceTarget> {
        self.state.lock().opened.clone()
    }

    /// Whether a session is open and has not been asked to stop.
    pub fn is_active(&self) -> bool {
        self.live_sender().is_some()
    }

    /// Deliver a signal to the open session. Returns `false` when there is no
    /// open session or the observer has stopped it.
    pub async fn emit(&self, signal: SourceSignal) -> bool {
        let Some(tx) = self.live_sender() else {
            return false;
        };
        let ending = matches!(signal, SourceSignal::Ended(_));
        let sent = tx.send(signal).await.is_ok();
        if ending {
            self.state.lock().active = None;
        }
        sent
    }

    /// Deliver a single-fragment chat message.
    pub async fn push_text(&self, author: Option<&str>, text: &str) -> bool {
        self.emit(SourceSignal::Event(RawChatEvent::from_text(author, text)))
            .await
    }

    /// End the open session as the provider would.
    pub async fn end(&self, reason: &str) -> bool {
        self.emit(SourceSignal::Ended(reason.to_string())).await
    }

    fn live_sender(&self) -> Option<mpsc::Sender<SourceSignal>> {
        let mut state = self.state.lock();
        let link = state.active.as_mut()?;
        if link.stop_requested() {
            state.active = None;
            return None;
        }
        Some(link.signals.clone())
    }
}

#[async_trait]
impl ChatSource for MemorySource {
    async fn open(&self, target: &SourceTarget) -> Result<SourceSession, SourceError> {
        let mut state = self.state.lock();
        state.opened.push(target.clone());
        if let Some(reason) = state.fail_next.take() {
            return Err(SourceError::Rejected(reason));
        }

        let (link, session) = SourceSession::pair();
        // Fresh channel, so this cannot be full.
        let _ = link.signals.try_send(SourceSignal::Started);
        state.active = Some(link);
        Ok(session)
    }
}
