use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ConversationKey, ConversationSummary, HistoryPage, Message};

/// Append-only log of one conversation. `next_seq` backs the pagination
/// cursor; messages are held in seq order because appends happen under
/// the store's write lock.
#[derive(Default)]
struct ConversationLog {
    next_seq: u64,
    messages: Vec<Message>,
}

/// Authoritative ordered log of messages per conversation.
///
/// This is the single writer of truth: no other path may create messages.
/// Read flags are the only post-insert mutation and they flip one way,
/// inside the same write lock that guards appends.
#[derive(Clone, Default)]
pub struct MessageStore {
    inner: Arc<RwLock<HashMap<ConversationKey, ConversationLog>>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new message, assigning its id, per-conversation sequence
    /// and server timestamp.
    pub async fn append(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        book_id: Option<Uuid>,
        content: &str,
    ) -> AppResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("message content cannot be empty".into()));
        }
        if sender_id == receiver_id {
            return Err(AppError::Validation(
                "sender and receiver must be distinct".into(),
            ));
        }

        let key = ConversationKey::of(sender_id, receiver_id, book_id);

        let mut guard = self.inner.write().await;
        let log = guard.entry(key).or_default();
        log.next_seq += 1;

        let message = Message {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            book_id,
            content: content.to_string(),
            seq: log.next_seq,
            created_at: Utc::now(),
            read: false,
        };
        log.messages.push(message.clone());

        tracing::debug!(
            message_id = %message.id,
            seq = message.seq,
            "message appended"
        );

        Ok(message)
    }

    /// Newest-first page of history between two users.
    ///
    /// `before_seq` is the smallest sequence the caller already holds;
    /// omitted on the first page. Because the cursor is the monotonic
    /// sequence, concurrent appends (which only grow the newest end)
    /// cannot skip or duplicate entries across pages.
    pub async fn history(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        book_id: Option<Uuid>,
        limit: usize,
        before_seq: Option<u64>,
    ) -> HistoryPage {
        let key = ConversationKey::of(user_a, user_b, book_id);
        let guard = self.inner.read().await;

        let Some(log) = guard.get(&key) else {
            return HistoryPage {
                messages: Vec::new(),
                has_more: false,
            };
        };

        let mut matching: Vec<&Message> = log
            .messages
            .iter()
            .filter(|m| before_seq.map_or(true, |cursor| m.seq < cursor))
            .collect();
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));

        let has_more = matching.len() > limit;
        let messages = matching.into_iter().take(limit).cloned().collect();

        HistoryPage { messages, has_more }
    }

    /// Mark every unread message sent by `other_party` to `reader` as
    /// read. Returns the affected message ids; an empty result is a
    /// legitimate no-op, not an error, so repeated calls are idempotent.
    pub async fn mark_read(
        &self,
        reader_id: Uuid,
        other_party_id: Uuid,
        book_id: Option<Uuid>,
    ) -> Vec<Uuid> {
        let key = ConversationKey::of(reader_id, other_party_id, book_id);
        let mut guard = self.inner.write().await;

        let Some(log) = guard.get_mut(&key) else {
            return Vec::new();
        };

        let mut affected = Vec::new();
        for message in log.messages.iter_mut() {
            if message.sender_id == other_party_id
                && message.receiver_id == reader_id
                && !message.read
            {
                message.read = true;
                affected.push(message.id);
            }
        }
        affected
    }

    /// Inbox summaries for a user: last message and unread count per
    /// counterpart/listing, newest activity first.
    pub async fn conversations(&self, user_id: Uuid) -> Vec<ConversationSummary> {
        let guard = self.inner.read().await;

        let mut summaries: Vec<ConversationSummary> = guard
            .iter()
            .filter(|(key, log)| key.involves(user_id) && !log.messages.is_empty())
            .map(|(key, log)| {
                let last_message = log
                    .messages
                    .iter()
                    .max_by_key(|m| m.seq)
                    .cloned()
                    .expect("non-empty log");
                let unread_count = log
                    .messages
                    .iter()
                    .filter(|m| m.receiver_id == user_id && !m.read)
                    .count();
                ConversationSummary {
                    other_user_id: key.other(user_id),
                    book_id: key.book_id,
                    last_message,
                    unread_count,
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_rejects_empty_content() {
        let store = MessageStore::new();
        let err = store
            .append(Uuid::new_v4(), Uuid::new_v4(), None, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn append_rejects_self_messaging() {
        let store = MessageStore::new();
        let user = Uuid::new_v4();
        assert!(store.append(user, user, None, "hi").await.is_err());
    }

    #[tokio::test]
    async fn sequence_is_monotonic_per_conversation() {
        let store = MessageStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let m1 = store.append(a, b, None, "one").await.unwrap();
        let m2 = store.append(b, a, None, "two").await.unwrap();
        let m3 = store.append(a, b, None, "three").await.unwrap();

        assert_eq!((m1.seq, m2.seq, m3.seq), (1, 2, 3));

        // A differently-scoped conversation has its own sequence.
        let scoped = store
            .append(a, b, Some(Uuid::new_v4()), "scoped")
            .await
            .unwrap();
        assert_eq!(scoped.seq, 1);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_paginates() {
        let store = MessageStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for i in 0..5 {
            store.append(a, b, None, &format!("m{i}")).await.unwrap();
        }

        let page = store.history(a, b, None, 2, None).await;
        assert_eq!(page.messages.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.messages[0].content, "m4");
        assert_eq!(page.messages[1].content, "m3");

        let cursor = page.messages.last().unwrap().seq;
        let older = store.history(a, b, None, 2, Some(cursor)).await;
        assert_eq!(older.messages[0].content, "m2");
        assert!(older.has_more);
    }

    #[tokio::test]
    async fn history_cursor_is_stable_under_concurrent_appends() {
        let store = MessageStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for i in 0..4 {
            store.append(a, b, None, &format!("m{i}")).await.unwrap();
        }

        let first = store.history(a, b, None, 2, None).await;
        let cursor = first.messages.last().unwrap().seq;

        // A write lands between the two page fetches.
        store.append(a, b, None, "late").await.unwrap();

        let second = store.history(a, b, None, 2, Some(cursor)).await;
        let first_ids: Vec<Uuid> = first.messages.iter().map(|m| m.id).collect();

        // The older page neither repeats nor skips anything: it holds
        // exactly the two messages below the cursor.
        assert_eq!(second.messages.len(), 2);
        assert_eq!(second.messages[0].content, "m1");
        assert_eq!(second.messages[1].content, "m0");
        assert!(second.messages.iter().all(|m| !first_ids.contains(&m.id)));
    }

    #[tokio::test]
    async fn book_scoping_isolates_conversations() {
        let store = MessageStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let book = Uuid::new_v4();

        store.append(a, b, Some(book), "scoped").await.unwrap();
        store.append(a, b, None, "unscoped").await.unwrap();

        let scoped = store.history(a, b, Some(book), 10, None).await;
        let unscoped = store.history(a, b, None, 10, None).await;

        assert_eq!(scoped.messages.len(), 1);
        assert_eq!(scoped.messages[0].content, "scoped");
        assert_eq!(unscoped.messages.len(), 1);
        assert_eq!(unscoped.messages[0].content, "unscoped");
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let store = MessageStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.append(a, b, None, "one").await.unwrap();
        store.append(a, b, None, "two").await.unwrap();
        // b's own message must not be touched by b's mark.
        store.append(b, a, None, "mine").await.unwrap();

        let first = store.mark_read(b, a, None).await;
        assert_eq!(first.len(), 2);

        let second = store.mark_read(b, a, None).await;
        assert!(second.is_empty());

        let page = store.history(a, b, None, 10, None).await;
        let own = page.messages.iter().find(|m| m.sender_id == b).unwrap();
        assert!(!own.read);
        assert!(page
            .messages
            .iter()
            .filter(|m| m.sender_id == a)
            .all(|m| m.read));
    }

    #[tokio::test]
    async fn conversations_reports_unread_and_last_message() {
        let store = MessageStore::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store.append(b, a, None, "from b").await.unwrap();
        store.append(c, a, None, "from c 1").await.unwrap();
        store.append(c, a, None, "from c 2").await.unwrap();
        store.mark_read(a, b, None).await;

        let summaries = store.conversations(a).await;
        assert_eq!(summaries.len(), 2);

        let with_b = summaries.iter().find(|s| s.other_user_id == b).unwrap();
        let with_c = summaries.iter().find(|s| s.other_user_id == c).unwrap();
        assert_eq!(with_b.unread_count, 0);
        assert_eq!(with_c.unread_count, 2);
        assert_eq!(with_c.last_message.content, "from c 2");
    }
}
