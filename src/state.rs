use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::{FanoutDispatcher, MessageStore, NotificationFeed, TypingRegistry};
use crate::websocket::ConnectionManager;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub messages: MessageStore,
    pub notifications: NotificationFeed,
    pub typing: TypingRegistry,
    pub registry: ConnectionManager,
    pub fanout: FanoutDispatcher,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = ConnectionManager::new();
        let fanout = FanoutDispatcher::new(registry.clone());
        let typing = TypingRegistry::new(Duration::from_secs(config.realtime.typing_ttl_secs));

        Self {
            config: Arc::new(config),
            messages: MessageStore::new(),
            notifications: NotificationFeed::new(),
            typing,
            registry,
            fanout,
        }
    }
}
