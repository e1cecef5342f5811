use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub mod messages;
pub mod session;

pub use messages::{ClientEvent, ServerEvent};

/// Unique identifier for a live connection.
///
/// A user may hold several connections (multiple tabs); each gets its own
/// id so disconnect cleanup removes exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

struct Connection {
    id: ConnectionId,
    sender: EventSender,
}

/// Maps authenticated users to their live connections.
///
/// Associations are in-memory only: every reconnect must re-announce
/// identity (`join`) before fan-out can reach it again. A user with zero
/// connections is simply unreachable for push; the stores remain the
/// source of truth for anything missed.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    connections: Arc<RwLock<HashMap<Uuid, Vec<Connection>>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a connection with a user. Idempotent for the same
    /// connection id.
    pub async fn register(&self, user_id: Uuid, connection_id: ConnectionId, sender: EventSender) {
        let mut guard = self.connections.write().await;
        let entries = guard.entry(user_id).or_default();
        if entries.iter().any(|c| c.id == connection_id) {
            return;
        }
        entries.push(Connection {
            id: connection_id,
            sender,
        });

        tracing::debug!(
            user_id = %user_id,
            total = entries.len(),
            "connection registered"
        );
    }

    /// Drop a single connection. A no-op if it was never registered.
    pub async fn unregister(&self, user_id: Uuid, connection_id: ConnectionId) {
        let mut guard = self.connections.write().await;
        if let Some(entries) = guard.get_mut(&user_id) {
            entries.retain(|c| c.id != connection_id);
            if entries.is_empty() {
                guard.remove(&user_id);
            }
        }
    }

    /// Deliver an event to every live connection of a user, pruning dead
    /// senders as it goes. No connections means no delivery and no error.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) {
        let mut guard = self.connections.write().await;
        if let Some(entries) = guard.get_mut(&user_id) {
            entries.retain(|c| c.sender.send(event.clone()).is_ok());
            if entries.is_empty() {
                guard.remove(&user_id);
            }
        }
    }

    /// Deliver to every connection of a user except one (the originator).
    pub async fn send_to_user_except(
        &self,
        user_id: Uuid,
        except: ConnectionId,
        event: ServerEvent,
    ) {
        let mut guard = self.connections.write().await;
        if let Some(entries) = guard.get_mut(&user_id) {
            entries.retain(|c| c.id == except || c.sender.send(event.clone()).is_ok());
        }
    }

    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        let guard = self.connections.read().await;
        guard.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn total_connections(&self) -> usize {
        let guard = self.connections.read().await;
        guard.values().map(|v| v.len()).sum()
    }

    pub async fn connected_users_count(&self) -> usize {
        let guard = self.connections.read().await;
        guard.len()
    }
}
