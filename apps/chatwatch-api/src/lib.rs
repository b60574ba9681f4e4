pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod keywords;
pub mod models;
pub mod observer;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::fanout::FanoutHub;
use keywords::KeywordMatcher;
use observer::source::ChatSource;
use observer::Observer;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub observer: Arc<Observer>,
    pub hub: Arc<FanoutHub>,
}

impl AppState {
    /// Wire a fresh hub and an idle observer over `source`, gated by the
    /// configured keywords.
    pub fn new(config: Config, source: Arc<dyn ChatSource>) -> Self {
        let matcher = Arc::new(KeywordMatcher::compile(&config.keywords));
        let hub = Arc::new(FanoutHub::new());
        let observer = Arc::new(Observer::new(source, matcher, hub.clone()));
        Self {
            config: Arc::new(config),
            observer,
            hub,
        }
    }
}
