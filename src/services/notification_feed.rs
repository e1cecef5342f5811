use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationKind, NotificationPage};

/// One user's feed. The unread counter lives next to the log it
/// summarizes so every mutation updates both under the same write guard;
/// it is a cache of `count(is_read == false)`, never a second source of
/// truth.
#[derive(Default)]
struct UserFeed {
    log: Vec<Notification>,
    unread: usize,
}

impl UserFeed {
    #[cfg(test)]
    fn counter_consistent(&self) -> bool {
        self.unread == self.log.iter().filter(|n| !n.is_read).count()
    }
}

/// Outcome of a mark operation, used to decide which fan-out to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkOutcome {
    /// How many notifications actually flipped from unread to read.
    pub newly_read: usize,
    /// Counter value after the mark.
    pub unread_count: usize,
}

/// Authoritative ordered log of notification events per user, with the
/// maintained unread counter.
#[derive(Clone, Default)]
pub struct NotificationFeed {
    inner: Arc<RwLock<HashMap<Uuid, UserFeed>>>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notification. The counter increment happens in the same
    /// critical section as the insert.
    pub async fn push(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message: &str,
        related_entity: Option<Uuid>,
    ) -> AppResult<Notification> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation(
                "notification message cannot be empty".into(),
            ));
        }

        let mut guard = self.inner.write().await;
        let feed = guard.entry(user_id).or_default();

        // Stamped under the write guard so log order and timestamp order
        // agree even when pushes race.
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind,
            message: message.to_string(),
            related_entity,
            is_read: false,
            created_at: Utc::now(),
        };
        feed.log.push(notification.clone());
        feed.unread += 1;

        tracing::debug!(
            notification_id = %notification.id,
            user_id = %user_id,
            kind = kind.as_str(),
            unread = feed.unread,
            "notification pushed"
        );

        Ok(notification)
    }

    /// Page through a user's feed, newest-first. `page` is 1-based; the
    /// first page replaces the client's local view, later pages append.
    pub async fn page(&self, user_id: Uuid, page: usize, limit: usize) -> NotificationPage {
        let page = page.max(1);
        let limit = limit.max(1);
        let guard = self.inner.read().await;

        let Some(feed) = guard.get(&user_id) else {
            return NotificationPage {
                notifications: Vec::new(),
                unread_count: 0,
                total_pages: 0,
                current_page: page,
                total_notifications: 0,
            };
        };

        let total = feed.log.len();
        let total_pages = total.div_ceil(limit);
        let notifications = feed
            .log
            .iter()
            .rev()
            .skip((page - 1) * limit)
            .take(limit)
            .cloned()
            .collect();

        NotificationPage {
            notifications,
            unread_count: feed.unread,
            total_pages,
            current_page: page,
            total_notifications: total,
        }
    }

    /// Mark one notification read. Marking an already-read notification
    /// does not touch the counter; an unknown id is NotFound.
    pub async fn mark_one(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<MarkOutcome> {
        let mut guard = self.inner.write().await;
        let feed = guard.get_mut(&user_id).ok_or(AppError::NotFound)?;

        let notification = feed
            .log
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(AppError::NotFound)?;

        let newly_read = if notification.is_read {
            0
        } else {
            notification.is_read = true;
            feed.unread -= 1;
            1
        };

        Ok(MarkOutcome {
            newly_read,
            unread_count: feed.unread,
        })
    }

    /// Mark everything read. Idempotent; the counter ends at zero either
    /// way.
    pub async fn mark_all(&self, user_id: Uuid) -> MarkOutcome {
        let mut guard = self.inner.write().await;
        let Some(feed) = guard.get_mut(&user_id) else {
            return MarkOutcome {
                newly_read: 0,
                unread_count: 0,
            };
        };

        let mut newly_read = 0;
        for notification in feed.log.iter_mut() {
            if !notification.is_read {
                notification.is_read = true;
                newly_read += 1;
            }
        }
        feed.unread = 0;

        MarkOutcome {
            newly_read,
            unread_count: 0,
        }
    }

    pub async fn unread_count(&self, user_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&user_id).map(|f| f.unread).unwrap_or(0)
    }

    /// Test hook: verifies the counter matches a scan of the log.
    #[cfg(test)]
    pub async fn assert_counter_consistent(&self, user_id: Uuid) {
        let guard = self.inner.read().await;
        if let Some(feed) = guard.get(&user_id) {
            assert!(
                feed.counter_consistent(),
                "unread counter diverged from log for {user_id}"
            );
        }
    }
}
