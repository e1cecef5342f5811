use uuid::Uuid;

use crate::models::{Notification, NotificationPage};
use crate::sync::chat_view::{Generation, SyncError};
use crate::websocket::ServerEvent;

/// Client-side merge reducer for the notification panel.
///
/// Applies the same dedupe-by-id discipline as the chat view. The
/// displayed unread counter always comes from the authoritative value
/// the server pushed or returned; the local list is typically truncated
/// and would undercount.
pub struct NotificationView {
    user_id: Uuid,
    /// Newest-first, deduplicated by id.
    items: Vec<Notification>,
    unread_count: usize,
    generation: u64,
    has_loaded: bool,
}

impl NotificationView {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            unread_count: 0,
            generation: 0,
            has_loaded: false,
        }
    }

    /// Newest-first notification list.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    /// Authoritative unread counter as last reported by the server.
    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    pub fn has_loaded(&self) -> bool {
        self.has_loaded
    }

    /// Begin a (re-)fetch; invalidates responses from earlier fetches.
    /// Called when the panel opens and after a reconnect.
    pub fn begin_refresh(&mut self) -> Generation {
        self.generation += 1;
        Generation::from_raw(self.generation)
    }

    /// Apply a REST page. Page one replaces the local view; later pages
    /// append-merge.
    pub fn apply_page(
        &mut self,
        generation: Generation,
        page: NotificationPage,
    ) -> Result<(), SyncError> {
        if generation.raw() != self.generation {
            return Err(SyncError::Stale);
        }

        if page.current_page <= 1 {
            self.items.clear();
        }
        for notification in page.notifications {
            self.insert_or_replace(notification);
        }
        self.unread_count = page.unread_count;
        self.has_loaded = true;
        Ok(())
    }

    /// Apply a live push event.
    pub fn apply_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::NewNotification { notification } => {
                if notification.user_id != self.user_id {
                    return;
                }
                // A new notification implies the counter bump; only a
                // genuinely new id counts.
                if self.insert_or_replace(notification.clone()) && !notification.is_read {
                    self.unread_count += 1;
                }
            }
            ServerEvent::NotificationRead {
                notification_id, ..
            } => {
                if let Some(item) = self.items.iter_mut().find(|n| n.id == *notification_id) {
                    item.is_read = true;
                }
                // The counter itself arrives via unreadNotificationCount.
            }
            ServerEvent::AllNotificationsRead { user_id } => {
                if *user_id != self.user_id {
                    return;
                }
                for item in self.items.iter_mut() {
                    item.is_read = true;
                }
                self.unread_count = 0;
            }
            ServerEvent::UnreadNotificationCount { count } => {
                self.unread_count = *count;
            }
            _ => {}
        }
    }

    /// Insert keeping newest-first order, or replace the entry with the
    /// same id. Returns true when the notification was new.
    fn insert_or_replace(&mut self, notification: Notification) -> bool {
        if let Some(existing) = self.items.iter_mut().find(|n| n.id == notification.id) {
            *existing = notification;
            return false;
        }

        let position = self.items.partition_point(|n| {
            (n.created_at, n.id) > (notification.created_at, notification.id)
        });
        self.items.insert(position, notification);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    use crate::models::NotificationKind;

    fn notification(user_id: Uuid, offset_ms: i64, message: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: NotificationKind::Message,
            message: message.into(),
            related_entity: None,
            is_read: false,
            created_at: Utc::now() + ChronoDuration::milliseconds(offset_ms),
        }
    }

    fn page(
        notifications: Vec<Notification>,
        unread_count: usize,
        current_page: usize,
    ) -> NotificationPage {
        let total = notifications.len();
        NotificationPage {
            notifications,
            unread_count,
            total_pages: 1,
            current_page,
            total_notifications: total,
        }
    }

    #[test]
    fn first_page_replaces_and_counter_comes_from_server() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);

        let generation = view.begin_refresh();
        // Server counter exceeds the page slice; the slice is truncated.
        view.apply_page(
            generation,
            page(vec![notification(user, 1, "order shipped")], 7, 1),
        )
        .unwrap();

        assert!(view.has_loaded());
        assert_eq!(view.items().len(), 1);
        assert_eq!(view.unread_count(), 7);
    }

    #[test]
    fn racing_fetch_and_push_never_duplicates() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);
        let n = notification(user, 1, "new message");

        view.apply_event(&ServerEvent::NewNotification {
            notification: n.clone(),
        });
        assert_eq!(view.unread_count(), 1);

        let generation = view.begin_refresh();
        view.apply_page(generation, page(vec![n.clone()], 1, 1))
            .unwrap();
        view.apply_event(&ServerEvent::NewNotification { notification: n });

        assert_eq!(view.items().len(), 1);
        // The duplicate push must not bump the counter again.
        assert_eq!(view.unread_count(), 1);
    }

    #[test]
    fn items_stay_newest_first() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);
        let older = notification(user, 1, "older");
        let newer = notification(user, 2, "newer");

        view.apply_event(&ServerEvent::NewNotification {
            notification: older,
        });
        view.apply_event(&ServerEvent::NewNotification {
            notification: newer,
        });

        let messages: Vec<&str> = view.items().iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["newer", "older"]);
    }

    #[test]
    fn stale_page_is_dropped() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);

        let old_generation = view.begin_refresh();
        let new_generation = view.begin_refresh();

        assert_eq!(
            view.apply_page(old_generation, page(vec![], 0, 1)),
            Err(SyncError::Stale)
        );
        view.apply_page(new_generation, page(vec![], 0, 1))
            .unwrap();
        assert!(view.has_loaded());
    }

    #[test]
    fn read_event_flips_flag_but_leaves_counter_to_server() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);
        let n = notification(user, 1, "listing approved");
        let id = n.id;

        view.apply_event(&ServerEvent::NewNotification { notification: n });
        assert_eq!(view.unread_count(), 1);

        view.apply_event(&ServerEvent::NotificationRead {
            notification_id: id,
            is_read: true,
        });
        assert!(view.items()[0].is_read);
        // Counter unchanged until the authoritative push arrives.
        assert_eq!(view.unread_count(), 1);

        view.apply_event(&ServerEvent::UnreadNotificationCount { count: 0 });
        assert_eq!(view.unread_count(), 0);
    }

    #[test]
    fn all_read_zeroes_counter_and_flags() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);
        for i in 0..3 {
            view.apply_event(&ServerEvent::NewNotification {
                notification: notification(user, i, "n"),
            });
        }
        assert_eq!(view.unread_count(), 3);

        view.apply_event(&ServerEvent::AllNotificationsRead { user_id: user });

        assert_eq!(view.unread_count(), 0);
        assert!(view.items().iter().all(|n| n.is_read));
    }

    #[test]
    fn events_for_other_users_are_ignored() {
        let user = Uuid::new_v4();
        let mut view = NotificationView::new(user);

        view.apply_event(&ServerEvent::NewNotification {
            notification: notification(Uuid::new_v4(), 1, "not mine"),
        });
        view.apply_event(&ServerEvent::AllNotificationsRead {
            user_id: Uuid::new_v4(),
        });

        assert!(view.items().is_empty());
        assert_eq!(view.unread_count(), 0);
    }
}
