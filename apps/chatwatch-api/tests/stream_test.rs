mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time;

/// One parsed server-sent event.
#[derive(Debug, Default)]
struct SseRecord {
    event: Option<String>,
    id: Option<String>,
    data: serde_json::Value,
}

/// Reads SSE records off a streaming response body.
struct SseReader {
    body: std::pin::Pin<Box<dyn futures_util::Stream<Item = reqwest::Result<Vec<u8>>> + Send>>,
    buf: String,
    skip_pings: bool,
}

impl SseReader {
    async fn connect(addr: SocketAddr) -> Self {
        let resp = reqwest::get(format!("http://{addr}/stream"))
            .await
            .expect("stream request");
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));
        Self {
            body: Box::pin(resp.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()))),
            buf: String::new(),
            skip_pings: true,
        }
    }

    /// Next record, or `None` when the server closes the stream.
    async fn next(&mut self) -> Option<SseRecord> {
        loop {
            if let Some(end) = self.buf.find("\n\n") {
                let frame: String = self.buf.drain(..end + 2).collect();
                match parse_frame(&frame) {
                    Some(record) if self.skip_pings && record.event.as_deref() == Some("ping") => {}
                    Some(record) => return Some(record),
                    None => {}
                }
                continue;
            }
            let chunk = time::timeout(Duration::from_secs(5), self.body.next())
                .await
                .expect("timed out waiting for stream data")?
                .ok()?;
            self.buf.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

fn parse_frame(frame: &str) -> Option<SseRecord> {
    let mut record = SseRecord::default();
    let mut data = None;
    for line in frame.lines() {
        if let Some(v) = line.strip_prefix("event:") {
            record.event = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("id:") {
            record.id = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("data:") {
            data = Some(v.trim().to_string());
        }
    }
    record.data = serde_json::from_str(&data?).ok()?;
    Some(record)
}

/// Helper: start an actual TCP server for streaming tests.
async fn start_server() -> (
    SocketAddr,
    chatwatch_api::AppState,
    std::sync::Arc<chatwatch_api::observer::memory::MemorySource>,
) {
    // Short pings so a dropped client is noticed on the next write.
    let mut config = common::test_config();
    config.ping_interval = Duration::from_millis(100);
    let (state, source) = common::test_state_with(config);
    let app = chatwatch_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, source)
}

#[tokio::test]
async fn stream_opens_with_hello() {
    let (addr, state, source) = start_server().await;
    state.observer.start(Some("abc".into()), None).await.unwrap();
    source.push_text(None, "rip").await;
    common::wait_until(|| state.hub.last_id() == 1).await;

    let mut reader = SseReader::connect(addr).await;
    let hello = reader.next().await.expect("hello");

    assert_eq!(hello.event.as_deref(), Some("hello"));
    assert_eq!(hello.data["running"], true);
    assert_eq!(hello.data["lastId"], 1);
}

#[tokio::test]
async fn accepted_events_reach_every_subscriber() {
    let (addr, state, source) = start_server().await;
    state.observer.start(Some("abc".into()), None).await.unwrap();

    let mut first = SseReader::connect(addr).await;
    let mut second = SseReader::connect(addr).await;
    first.next().await.expect("hello");
    second.next().await.expect("hello");
    common::wait_until(|| state.hub.subscriber_count() == 2).await;

    source.push_text(Some("andi"), "no match").await;
    source.push_text(Some("andi"), "RIP bro").await;

    for reader in [&mut first, &mut second] {
        let record = reader.next().await.expect("chat record");
        assert_eq!(record.event, None);
        assert_eq!(record.id.as_deref(), Some("1"));
        assert_eq!(record.data["id"], 1);
        assert_eq!(record.data["msg"], "RIP bro");
        assert_eq!(record.data["author"], "@andi");
    }
}

#[tokio::test]
async fn disconnecting_lowers_consumer_count() {
    let (addr, state, _source) = start_server().await;

    let mut reader = SseReader::connect(addr).await;
    reader.next().await.expect("hello");
    common::wait_until(|| state.hub.subscriber_count() == 1).await;

    drop(reader);
    common::wait_until(|| state.hub.subscriber_count() == 0).await;

    let status: serde_json::Value = reqwest::get(format!("http://{addr}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["consumerCount"], 0);
}

#[tokio::test]
async fn disconnect_all_closes_streams() {
    let (addr, state, _source) = start_server().await;

    let mut reader = SseReader::connect(addr).await;
    reader.next().await.expect("hello");
    common::wait_until(|| state.hub.subscriber_count() == 1).await;

    assert_eq!(state.hub.disconnect_all(), 1);
    assert!(reader.next().await.is_none());
}

#[tokio::test]
async fn idle_stream_receives_pings() {
    let (addr, _state, _source) = start_server().await;

    let mut reader = SseReader::connect(addr).await;
    reader.skip_pings = false;
    let hello = reader.next().await.expect("hello");
    assert_eq!(hello.data["running"], false);
    assert_eq!(hello.data["lastId"], 0);

    let ping = reader.next().await.expect("ping");
    assert_eq!(ping.event.as_deref(), Some("ping"));
    assert_eq!(ping.id, None);
}
