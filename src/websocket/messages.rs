use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Notification};

/// Inbound events, client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Identity announcement. Fan-out reaches this connection only after
    /// the join is processed; it must be re-sent on every reconnect.
    #[serde(rename = "join")]
    Join { user_id: Uuid },

    #[serde(rename = "typing")]
    Typing {
        receiver_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<Uuid>,
    },

    #[serde(rename = "stopTyping")]
    StopTyping {
        receiver_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<Uuid>,
    },
}

/// Outbound events, server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "newMessage")]
    NewMessage { message: Message },

    /// The counterpart has read the caller's messages in this conversation.
    #[serde(rename = "messagesRead")]
    MessagesRead {
        reader_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<Uuid>,
    },

    /// Another connection of the same user marked messages read; keeps
    /// multiple tabs consistent.
    #[serde(rename = "messagesReadByMe")]
    MessagesReadByMe {
        other_user_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<Uuid>,
    },

    #[serde(rename = "typing")]
    Typing {
        sender_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<Uuid>,
    },

    #[serde(rename = "stopTyping")]
    StopTyping {
        sender_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<Uuid>,
    },

    #[serde(rename = "newNotification")]
    NewNotification { notification: Notification },

    #[serde(rename = "notificationRead")]
    NotificationRead { notification_id: Uuid, is_read: bool },

    #[serde(rename = "allNotificationsRead")]
    AllNotificationsRead { user_id: Uuid },

    /// Counter-only update for clients without the full feed open.
    #[serde(rename = "unreadNotificationCount")]
    UnreadNotificationCount { count: usize },
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn client_events_use_wire_tags() {
        let join = serde_json::to_string(&ClientEvent::Join {
            user_id: Uuid::new_v4(),
        })
        .unwrap();
        assert!(join.contains(r#""type":"join""#));

        let stop = serde_json::to_string(&ClientEvent::StopTyping {
            receiver_id: Uuid::new_v4(),
            book_id: None,
        })
        .unwrap();
        assert!(stop.contains(r#""type":"stopTyping""#));
    }

    #[test]
    fn server_events_round_trip() {
        let events = vec![
            ServerEvent::NewMessage {
                message: Message {
                    id: Uuid::new_v4(),
                    sender_id: Uuid::new_v4(),
                    receiver_id: Uuid::new_v4(),
                    book_id: Some(Uuid::new_v4()),
                    content: "Is this book available?".into(),
                    seq: 1,
                    created_at: Utc::now(),
                    read: false,
                },
            },
            ServerEvent::MessagesRead {
                reader_id: Uuid::new_v4(),
                book_id: None,
            },
            ServerEvent::UnreadNotificationCount { count: 3 },
        ];

        for event in events {
            let json = event.to_json().unwrap();
            let back: ServerEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event, back);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let parsed: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"presence","user_id":"x"}"#);
        assert!(parsed.is_err());
    }
}
