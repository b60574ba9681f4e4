//! Records written to real-time stream subscribers.

use std::sync::Arc;

use axum::response::sse::Event;
use serde::Serialize;
use serde_json::Value;

use crate::models::chat_event::ChatEvent;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Named SSE events. Chat records use the default (unnamed) event type.
pub struct EventName;

impl EventName {
    pub const HELLO: &'static str = "hello";
    pub const PING: &'static str = "ping";
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Handshake sent once when a subscriber connects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    pub running: bool,
    pub last_id: u64,
}

// ---------------------------------------------------------------------------
// Server → client record
// ---------------------------------------------------------------------------

/// One record on a subscriber's stream.
#[derive(Debug, Clone)]
pub enum StreamRecord {
    Hello(HelloPayload),
    Ping,
    Chat(Arc<ChatEvent>),
}

impl StreamRecord {
    /// The SSE event name, or `None` for default-typed data records.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            Self::Hello(_) => Some(EventName::HELLO),
            Self::Ping => Some(EventName::PING),
            Self::Chat(_) => None,
        }
    }

    /// JSON body of the record.
    pub fn data(&self) -> Value {
        match self {
            Self::Hello(hello) => serde_json::to_value(hello).unwrap_or_default(),
            Self::Ping => serde_json::json!({}),
            Self::Chat(event) => serde_json::to_value(event.as_ref()).unwrap_or_default(),
        }
    }

    /// Encode as an SSE event. Chat records carry their id so clients can
    /// pick up the cursor for pull queries.
    pub fn to_sse(&self) -> Event {
        let mut event = Event::default().data(self.data().to_string());
        if let Some(name) = self.event_name() {
            event = event.event(name);
        }
        if let Self::Chat(chat) = self {
            event = event.id(chat.id().to_string());
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn hello_uses_camel_case() {
        let rec = StreamRecord::Hello(HelloPayload {
            running: true,
            last_id: 12,
        });
        assert_eq!(rec.event_name(), Some("hello"));
        assert_eq!(rec.data(), serde_json::json!({ "running": true, "lastId": 12 }));
    }

    #[test]
    fn ping_is_empty_object() {
        assert_eq!(StreamRecord::Ping.event_name(), Some("ping"));
        assert_eq!(StreamRecord::Ping.data(), serde_json::json!({}));
    }

    #[test]
    fn chat_carries_full_event() {
        let ev = Arc::new(ChatEvent::new(4, Utc::now(), Some("@budi".into()), "rip".into()));
        let rec = StreamRecord::Chat(ev);
        assert_eq!(rec.event_name(), None);
        let data = rec.data();
        assert_eq!(data["id"], 4);
        assert_eq!(data["author"], "@budi");
        assert_eq!(data["msg"], "rip");
        assert!(data["usec"].is_null());
    }
}
