//! Canonical chat event record and normalization of raw source events.

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

/// Prefix every normalized author handle carries.
pub const AUTHOR_MARKER: char = '@';

/// Fixed display timezone (WIB, UTC+07:00).
const DISPLAY_OFFSET_SECS: i32 = 7 * 3600;

const DISPLAY_FORMAT: &str = "%d/%m/%Y %H.%M.%S";

/// Epoch values above this are microseconds rather than milliseconds.
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

/// A chat message accepted by the observer. Never mutated after creation;
/// fields are read through accessors so `ts_local` cannot drift from `ts_utc`.
///
/// ```compile_fail
/// use chatwatch_api::models::chat_event::ChatEvent;
/// let mut ev = ChatEvent::new(1, chrono::Utc::now(), None, "rip".into());
/// ev.ts_local = String::new();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChatEvent {
    /// Dense sequence number over accepted events, starting at 1.
    id: u64,
    #[serde(rename = "tsIso", serialize_with = "serialize_iso_millis")]
    #[schema(value_type = String, example = "2026-10-16T07:05:03.120Z")]
    ts_utc: DateTime<Utc>,
    /// `ts_utc` rendered in WIB; derived at construction.
    #[serde(rename = "tsWIB")]
    #[schema(example = "16/10/2026 14.05.03")]
    ts_local: String,
    author: Option<String>,
    #[serde(rename = "msg")]
    text: String,
    /// Reserved, always null.
    #[schema(value_type = Option<i64>)]
    usec: (),
}

impl ChatEvent {
    pub fn new(id: u64, ts_utc: DateTime<Utc>, author: Option<String>, text: String) -> Self {
        Self {
            id,
            ts_utc,
            ts_local: display_time(ts_utc),
            author,
            text,
            usec: (),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ts_utc(&self) -> DateTime<Utc> {
        self.ts_utc
    }

    /// `ts_utc` in the display timezone.
    pub fn ts_local(&self) -> &str {
        &self.ts_local
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

fn serialize_iso_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Render an instant in the fixed display timezone.
pub fn display_time(ts: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    ts.with_timezone(&offset).format(DISPLAY_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Raw source events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub name: Option<String>,
}

/// A chat event as delivered by the external source.
///
/// Fields are loosely typed: `message` is expected to be a list of fragments
/// (`{"text": ...}`) and `timestamp` an RFC 3339 string or epoch number, but
/// anything else is tolerated and normalized to a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawChatEvent {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl RawChatEvent {
    /// Build a raw event with a single text fragment.
    pub fn from_text(author: Option<&str>, text: &str) -> Self {
        Self {
            timestamp: None,
            author: author.map(|name| RawAuthor {
                name: Some(name.to_string()),
            }),
            message: Some(serde_json::json!([{ "text": text }])),
        }
    }

    /// Concatenate fragment texts in order. A missing fragment text counts
    /// as empty; a missing or non-list message yields an empty string.
    pub fn text(&self) -> String {
        let Some(Value::Array(fragments)) = &self.message else {
            return String::new();
        };
        fragments
            .iter()
            .filter_map(|f| f.get("text").and_then(Value::as_str))
            .collect()
    }

    /// The source timestamp, if it is a valid instant.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => from_epoch(n),
                Err(_) => DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            },
            Value::Number(n) => from_epoch(n.as_i64()?),
            _ => None,
        }
    }

    /// Trimmed author name with the canonical marker, or `None` if blank.
    pub fn author(&self) -> Option<String> {
        let name = self.author.as_ref()?.name.as_deref()?.trim();
        if name.is_empty() {
            None
        } else if name.starts_with(AUTHOR_MARKER) {
            Some(name.to_string())
        } else {
            Some(format!("{AUTHOR_MARKER}{name}"))
        }
    }
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n > MICROS_THRESHOLD {
        DateTime::from_timestamp_micros(n)
    } else {
        DateTime::from_timestamp_millis(n)
    }
}

/// Convert a raw source event into a [`ChatEvent`] with the given id,
/// falling back to the current time when the source timestamp is unusable.
pub fn normalize(raw: &RawChatEvent, next_id: u64) -> ChatEvent {
    normalize_at(raw, next_id, Utc::now())
}

/// [`normalize`] with an explicit capture time.
pub fn normalize_at(raw: &RawChatEvent, next_id: u64, captured_at: DateTime<Utc>) -> ChatEvent {
    ChatEvent::new(
        next_id,
        raw.timestamp().unwrap_or(captured_at),
        raw.author(),
        raw.text(),
    )
}
