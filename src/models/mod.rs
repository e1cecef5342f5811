use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a buyer/seller/listing conversation.
///
/// The user pair is stored ordered (min, max) so `of(a, b, ..)` and
/// `of(b, a, ..)` name the same conversation. Two users may hold several
/// conversations when scoped by different listings, plus one unscoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_low: Uuid,
    pub user_high: Uuid,
    pub book_id: Option<Uuid>,
}

impl ConversationKey {
    pub fn of(a: Uuid, b: Uuid, book_id: Option<Uuid>) -> Self {
        let (user_low, user_high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            user_low,
            user_high,
            book_id,
        }
    }

    /// The counterpart of `user` in this conversation.
    pub fn other(&self, user: Uuid) -> Uuid {
        if user == self.user_low {
            self.user_high
        } else {
            self.user_low
        }
    }

    pub fn involves(&self, user: Uuid) -> bool {
        self.user_low == user || self.user_high == user
    }
}

/// A chat message. Immutable once stored except for the `read` flag,
/// which only transitions false -> true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,

    pub sender_id: Uuid,

    pub receiver_id: Uuid,

    /// Listing the conversation is scoped to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<Uuid>,

    pub content: String,

    /// Store-assigned sequence, monotonic per conversation. Pagination cursor.
    pub seq: u64,

    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,

    pub read: bool,
}

impl Message {
    pub fn conversation(&self) -> ConversationKey {
        ConversationKey::of(self.sender_id, self.receiver_id, self.book_id)
    }
}

/// One page of message history, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// Per-counterpart conversation summary for the inbox view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub other_user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<Uuid>,
    pub last_message: Message,
    pub unread_count: usize,
}

/// Notification event category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// New chat message while the recipient had the conversation closed.
    Message,
    /// Order lifecycle event (placed, shipped, delivered).
    Order,
    /// Listing-related event (sold, price change, approval).
    Listing,
    /// Administrative/system notice.
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Message => "message",
            NotificationKind::Order => "order",
            NotificationKind::Listing => "listing",
            NotificationKind::System => "system",
        }
    }
}

/// A notification owned by its recipient. `is_read` transitions
/// false -> true only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    pub user_id: Uuid,

    pub kind: NotificationKind,

    pub message: String,

    /// Entity the notification points at (order, listing, conversation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_entity: Option<Uuid>,

    pub is_read: bool,

    pub created_at: DateTime<Utc>,
}

/// Paged notification feed response. `unread_count` is the authoritative
/// counter, not derived from the (truncated) `notifications` slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub total_notifications: usize,
}

/// Client-side read state for a message the local user is marking.
///
/// `PendingRead` is an optimistic mark awaiting server confirmation; it
/// rolls back to `Unread` if the mark-as-read call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Unread,
    PendingRead,
    Read,
}
