use uuid::Uuid;

use crate::models::{ConversationKey, Message, Notification};
use crate::websocket::{ConnectionManager, ServerEvent};

/// Routes store events to the live connections of the users they
/// concern. Delivery is best-effort and at-least-once: a user with no
/// connection simply sees the change on their next REST fetch.
#[derive(Clone)]
pub struct FanoutDispatcher {
    manager: ConnectionManager,
}

impl FanoutDispatcher {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// A message was appended; push it to the receiver's connections.
    pub async fn message_created(&self, message: &Message) {
        self.manager
            .send_to_user(
                message.receiver_id,
                ServerEvent::NewMessage {
                    message: message.clone(),
                },
            )
            .await;
    }

    /// A reader marked a conversation read. One summarizing event per
    /// side, never one per message: `messagesRead` to the counterpart,
    /// `messagesReadByMe` to the reader's own other connections.
    pub async fn messages_read(
        &self,
        reader_id: Uuid,
        other_party_id: Uuid,
        book_id: Option<Uuid>,
    ) {
        self.manager
            .send_to_user(
                other_party_id,
                ServerEvent::MessagesRead { reader_id, book_id },
            )
            .await;
        self.manager
            .send_to_user(
                reader_id,
                ServerEvent::MessagesReadByMe {
                    other_user_id: other_party_id,
                    book_id,
                },
            )
            .await;
    }

    /// A notification landed. The event itself implies the counter bump,
    /// so no separate counter event is sent here.
    pub async fn notification_created(&self, notification: &Notification) {
        self.manager
            .send_to_user(
                notification.user_id,
                ServerEvent::NewNotification {
                    notification: notification.clone(),
                },
            )
            .await;
    }

    pub async fn notification_read(&self, user_id: Uuid, notification_id: Uuid, unread_count: usize) {
        self.manager
            .send_to_user(
                user_id,
                ServerEvent::NotificationRead {
                    notification_id,
                    is_read: true,
                },
            )
            .await;
        self.unread_count_changed(user_id, unread_count).await;
    }

    pub async fn all_notifications_read(&self, user_id: Uuid) {
        self.manager
            .send_to_user(user_id, ServerEvent::AllNotificationsRead { user_id })
            .await;
        self.unread_count_changed(user_id, 0).await;
    }

    /// Counter change not already implied by a `newNotification`; keeps
    /// counter-only subscribers correct.
    pub async fn unread_count_changed(&self, user_id: Uuid, count: usize) {
        self.manager
            .send_to_user(user_id, ServerEvent::UnreadNotificationCount { count })
            .await;
    }

    pub async fn typing_started(&self, conversation: ConversationKey, typist: Uuid) {
        self.manager
            .send_to_user(
                conversation.other(typist),
                ServerEvent::Typing {
                    sender_id: typist,
                    book_id: conversation.book_id,
                },
            )
            .await;
    }

    pub async fn typing_stopped(&self, conversation: ConversationKey, typist: Uuid) {
        self.manager
            .send_to_user(
                conversation.other(typist),
                ServerEvent::StopTyping {
                    sender_id: typist,
                    book_id: conversation.book_id,
                },
            )
            .await;
    }
}
