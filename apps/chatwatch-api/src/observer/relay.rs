//! WebSocket relay source.
//!
//! The relay speaks to the live-broadcast provider and forwards chat as JSON
//! text frames. Connecting is the start acknowledgement: a refused or failed
//! handshake means the session never started.
//!
//! Frames:
//! - `{"type":"chat", "timestamp":..., "author":{...}, "message":[...]}`
//! - `{"type":"error", "message":"..."}`
//! - `{"type":"end", "reason":"..."}`

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::source::{ChatSource, SessionLink, SourceSession, SourceSignal, SourceTarget};
use crate::error::SourceError;
use crate::models::chat_event::RawChatEvent;

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A frame received from the relay.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayFrame {
    Chat(RawChatEvent),
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    End {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl RelayFrame {
    pub fn decode(text: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(text)?)
    }
}

pub struct RelaySource {
    base_url: String,
}

impl RelaySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Relay URL with the target references as query parameters.
    pub fn session_url(&self, target: &SourceTarget) -> Result<url::Url, SourceError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| SourceError::Connect(format!("invalid relay url {:?}: {e}", self.base_url)))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(live_id) = &target.live_id {
                query.append_pair("liveId", live_id);
            }
            if let Some(channel_id) = &target.channel_id {
                query.append_pair("channelId", channel_id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ChatSource for RelaySource {
    async fn open(&self, target: &SourceTarget) -> Result<SourceSession, SourceError> {
        let url = self.session_url(target)?;
        let (socket, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!(status = %response.status(), %target, "relay handshake complete");

        let (link, session) = SourceSession::pair();
        tokio::spawn(pump_relay(socket, link));
        Ok(session)
    }
}

/// Forward relay frames as signals until the relay ends or the observer
/// stops the session. Always finishes with `Ended`.
async fn pump_relay(socket: RelaySocket, link: SessionLink) {
    let SessionLink { signals, mut stop } = link;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let _ = signals.send(SourceSignal::Started).await;

    let reason = loop {
        tokio::select! {
            _ = &mut stop => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break "stopped by observer".to_string();
            }

            msg = ws_rx.next() => {
                let signal = match msg {
                    Some(Ok(Message::Text(text))) => match RelayFrame::decode(text.as_str()) {
                        Ok(RelayFrame::Chat(raw)) => SourceSignal::Event(raw),
                        Ok(RelayFrame::Error { message }) => SourceSignal::Error(
                            message.unwrap_or_else(|| "relay reported an error".to_string()),
                        ),
                        Ok(RelayFrame::End { reason }) => {
                            break reason.unwrap_or_else(|| "ended by relay".to_string());
                        }
                        Err(e) => SourceSignal::Error(e.to_string()),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.as_str().to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "relay closed".to_string());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = signals.send(SourceSignal::Error(e.to_string())).await;
                        break "relay connection lost".to_string();
                    }
                    None => break "relay closed".to_string(),
                };

                if signals.send(signal).await.is_err() {
                    // Observer dropped the session.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return;
                }
            }
        }
    };

    tracing::debug!(%reason, "relay session finished");
    let _ = signals.send(SourceSignal::Ended(reason)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_chat_frame() {
        let frame = RelayFrame::decode(
            r#"{"type":"chat","author":{"name":"budi"},"message":[{"text":"RIP "},{"text":"bro"}]}"#,
        )
        .unwrap();
        match frame {
            RelayFrame::Chat(raw) => {
                assert_eq!(raw.text(), "RIP bro");
                assert_eq!(raw.author().as_deref(), Some("@budi"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn decodes_control_frames() {
        assert!(matches!(
            RelayFrame::decode(r#"{"type":"end","reason":"stream over"}"#).unwrap(),
            RelayFrame::End { reason: Some(r) } if r == "stream over"
        ));
        assert!(matches!(
            RelayFrame::decode(r#"{"type":"error"}"#).unwrap(),
            RelayFrame::Error { message: None }
        ));
    }

    #[test]
    fn rejects_unknown_frames() {
        assert!(matches!(
            RelayFrame::decode(r#"{"type":"gift"}"#),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn session_url_carries_references() {
        let relay = RelaySource::new("ws://relay.local:8765/chat");
        let target = SourceTarget::new(Some("abc 1".into()), Some("UC9".into())).unwrap();
        let url = relay.session_url(&target).unwrap();
        assert_eq!(url.as_str(), "ws://relay.local:8765/chat?liveId=abc+1&channelId=UC9");
    }

    #[test]
    fn invalid_base_url_is_a_connect_error() {
        let relay = RelaySource::new("not a url");
        let target = SourceTarget::new(Some("abc".into()), None).unwrap();
        assert!(matches!(relay.session_url(&target), Err(SourceError::Connect(_))));
    }

    #[tokio::test]
    async fn unreachable_relay_fails_open() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let relay = RelaySource::new("ws://127.0.0.1:9/chat");
        let target = SourceTarget::new(Some("abc".into()), None).unwrap();
        assert!(relay.open(&target).await.is_err());
    }
}
