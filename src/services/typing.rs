use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::ConversationKey;

/// Ephemeral typing state, keyed by conversation and typist. Never
/// persisted; a restart simply loses it, which is acceptable by design.
///
/// Each keystroke re-arms the deadline. State is cleared by an explicit
/// stop, by a send, or by expiry of the inactivity window, whichever
/// comes first.
#[derive(Clone)]
pub struct TypingRegistry {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<(ConversationKey, Uuid), Instant>>>,
}

impl TypingRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Arm (or re-arm) the typing deadline. Returns true when this is a
    /// fresh start rather than a refresh, so the caller knows whether a
    /// `typing` fan-out is due.
    pub async fn start(&self, conversation: ConversationKey, typist: Uuid) -> bool {
        let mut guard = self.entries.write().await;
        guard
            .insert((conversation, typist), Instant::now() + self.ttl)
            .is_none()
    }

    /// Clear the state. Returns true if the typist was actually typing,
    /// so a spurious stop emits no fan-out.
    pub async fn stop(&self, conversation: ConversationKey, typist: Uuid) -> bool {
        let mut guard = self.entries.write().await;
        guard.remove(&(conversation, typist)).is_some()
    }

    /// Clear every typing state a user was broadcasting, returning the
    /// conversations affected. Used when a connection drops.
    pub async fn stop_all_for(&self, typist: Uuid) -> Vec<ConversationKey> {
        let mut guard = self.entries.write().await;
        let expired: Vec<ConversationKey> = guard
            .keys()
            .filter(|(_, t)| *t == typist)
            .map(|(c, _)| *c)
            .collect();
        guard.retain(|(_, t), _| *t != typist);
        expired
    }

    /// Remove entries whose deadline has passed, returning them so the
    /// caller can emit the `stopTyping` the sender never sent.
    pub async fn expire_due(&self) -> Vec<(ConversationKey, Uuid)> {
        let now = Instant::now();
        let mut guard = self.entries.write().await;
        let due: Vec<(ConversationKey, Uuid)> = guard
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &due {
            guard.remove(key);
        }
        due
    }

    pub async fn is_typing(&self, conversation: ConversationKey, typist: Uuid) -> bool {
        let guard = self.entries.read().await;
        guard
            .get(&(conversation, typist))
            .map(|deadline| *deadline > Instant::now())
            .unwrap_or(false)
    }
}
