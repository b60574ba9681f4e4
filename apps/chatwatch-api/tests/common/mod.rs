#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use chatwatch_api::config::Config;
use chatwatch_api::observer::memory::MemorySource;
use chatwatch_api::AppState;

/// Keywords every test app is configured with.
pub const TEST_KEYWORDS: &[&str] = &["rip", "tp", "tepung"];

pub fn test_config() -> Config {
    Config {
        port: 0,
        keywords: TEST_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        source_url: "ws://127.0.0.1:9/unused".to_string(),
        ping_interval: Duration::from_secs(15),
    }
}

/// Build an `AppState` over a hand-driven source.
pub fn test_state() -> (AppState, Arc<MemorySource>) {
    test_state_with(test_config())
}

pub fn test_state_with(config: Config) -> (AppState, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::new());
    let state = AppState::new(config, source.clone());
    (state, source)
}

/// Build the full router for `TestServer`.
pub fn test_app() -> (Router, AppState, Arc<MemorySource>) {
    let (state, source) = test_state();
    let app = chatwatch_api::routes::router().with_state(state.clone());
    (app, state, source)
}

/// Wait for the observer's background pump to catch up.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
