use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::{ConversationKey, HistoryPage, Message, ReadState};
use crate::websocket::ServerEvent;

/// Error surfaced by the reducers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// A response arrived for a view generation the user has navigated
    /// away from. Callers drop it silently; it must never be applied.
    Stale,
}

/// Loading state of an open conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatViewState {
    LoadingInitial,
    Ready,
    LoadingOlder,
}

/// Token tying an in-flight REST response to the view generation that
/// requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

impl Generation {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// One locally-held message plus its client-side read state.
///
/// `read_state` tracks the three-state optimistic cycle for messages the
/// local user received; for messages the local user sent, `message.read`
/// reflects whether the counterpart has read them.
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub message: Message,
    pub read_state: ReadState,
}

impl MessageEntry {
    fn from_server(message: Message) -> Self {
        let read_state = if message.read {
            ReadState::Read
        } else {
            ReadState::Unread
        };
        Self {
            message,
            read_state,
        }
    }
}

/// Client-side merge reducer for one open conversation.
///
/// Merges REST history pages with live push events into a single
/// gap-free, duplicate-free, chronologically ordered view. The two
/// sources may arrive out of causal order relative to each other, so
/// every insertion dedupes by message id and orders by
/// `(created_at, id)` rather than trusting arrival order.
pub struct ChatView {
    viewer_id: Uuid,
    conversation: ConversationKey,
    state: ChatViewState,
    entries: Vec<MessageEntry>,
    has_more: bool,
    generation: u64,
    scroll_offset: f64,
    typing_deadline: Option<Instant>,
    /// Receiver-side defense against a missed stopTyping: 2x the
    /// sender's re-arm interval.
    typing_window: Duration,
}

impl ChatView {
    pub fn new(viewer_id: Uuid, other_user_id: Uuid, book_id: Option<Uuid>) -> Self {
        Self {
            viewer_id,
            conversation: ConversationKey::of(viewer_id, other_user_id, book_id),
            state: ChatViewState::LoadingInitial,
            entries: Vec::new(),
            has_more: false,
            generation: 0,
            scroll_offset: 0.0,
            typing_deadline: None,
            typing_window: Duration::from_secs(6),
        }
    }

    pub fn state(&self) -> ChatViewState {
        self.state
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Messages in chronological order (oldest first).
    pub fn messages(&self) -> &[MessageEntry] {
        &self.entries
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.scroll_offset = offset;
    }

    /// Begin (or re-begin, after a reconnect) the initial page fetch.
    /// Any response still in flight for an earlier generation will be
    /// rejected as stale.
    pub fn begin_initial_load(&mut self) -> Generation {
        self.state = ChatViewState::LoadingInitial;
        self.generation += 1;
        Generation(self.generation)
    }

    /// Begin fetching the page older than what is currently held.
    pub fn begin_load_older(&mut self) -> Generation {
        self.state = ChatViewState::LoadingOlder;
        Generation(self.generation)
    }

    /// Cursor for the next older page: smallest sequence currently held.
    pub fn oldest_seq(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.message.seq).min()
    }

    fn check_generation(&self, generation: Generation) -> Result<(), SyncError> {
        if generation.0 != self.generation {
            return Err(SyncError::Stale);
        }
        Ok(())
    }

    /// Apply the first page. Replaces the local view.
    pub fn apply_initial_page(
        &mut self,
        generation: Generation,
        page: HistoryPage,
    ) -> Result<(), SyncError> {
        self.check_generation(generation)?;

        self.entries.clear();
        for message in page.messages {
            self.insert_or_replace(message);
        }
        self.has_more = page.has_more;
        self.state = ChatViewState::Ready;
        Ok(())
    }

    /// Apply an older page, compensating the scroll anchor by exactly
    /// the height the prepended rows introduce so the visible content
    /// does not shift.
    pub fn apply_older_page(
        &mut self,
        generation: Generation,
        page: HistoryPage,
        height_of: impl Fn(&Message) -> f64,
    ) -> Result<(), SyncError> {
        self.check_generation(generation)?;

        let mut prepended_height = 0.0;
        for message in page.messages {
            let height = height_of(&message);
            if self.insert_or_replace(message) {
                prepended_height += height;
            }
        }
        self.scroll_offset += prepended_height;
        self.has_more = page.has_more;
        self.state = ChatViewState::Ready;
        Ok(())
    }

    /// The REST call that triggered `begin_load_older` failed; return to
    /// ready so the user can retry.
    pub fn load_older_failed(&mut self) {
        if self.state == ChatViewState::LoadingOlder {
            self.state = ChatViewState::Ready;
        }
    }

    /// Apply a live push event. Events for other conversations are
    /// ignored; they belong to other views.
    pub fn apply_event(&mut self, event: &ServerEvent, now: Instant) {
        match event {
            ServerEvent::NewMessage { message } => {
                if message.conversation() != self.conversation {
                    return;
                }
                // A message from the counterpart ends their typing state
                // even if the stopTyping push was lost.
                if message.sender_id != self.viewer_id {
                    self.typing_deadline = None;
                }
                self.insert_or_replace(message.clone());
            }
            ServerEvent::MessagesRead { reader_id, book_id } => {
                if *reader_id != self.conversation.other(self.viewer_id)
                    || *book_id != self.conversation.book_id
                {
                    return;
                }
                // The counterpart read our messages; flip without re-fetch.
                for entry in self.entries.iter_mut() {
                    if entry.message.sender_id == self.viewer_id {
                        entry.message.read = true;
                    }
                }
            }
            ServerEvent::MessagesReadByMe {
                other_user_id,
                book_id,
            } => {
                if *other_user_id != self.conversation.other(self.viewer_id)
                    || *book_id != self.conversation.book_id
                {
                    return;
                }
                // Another of our tabs marked the conversation read:
                // authoritative confirmation.
                self.confirm_mark_read();
            }
            ServerEvent::Typing { sender_id, book_id } => {
                if *sender_id == self.conversation.other(self.viewer_id)
                    && *book_id == self.conversation.book_id
                {
                    self.typing_deadline = Some(now + self.typing_window);
                }
            }
            ServerEvent::StopTyping { sender_id, book_id } => {
                if *sender_id == self.conversation.other(self.viewer_id)
                    && *book_id == self.conversation.book_id
                {
                    self.typing_deadline = None;
                }
            }
            _ => {}
        }
    }

    /// Optimistically mark every unread incoming message; the UI shows
    /// the mark immediately while the REST call is in flight. Returns
    /// the affected ids.
    pub fn mark_read_optimistic(&mut self) -> Vec<Uuid> {
        let mut affected = Vec::new();
        for entry in self.entries.iter_mut() {
            if entry.message.receiver_id == self.viewer_id && entry.read_state == ReadState::Unread
            {
                entry.read_state = ReadState::PendingRead;
                affected.push(entry.message.id);
            }
        }
        affected
    }

    /// The mark-as-read call (or a `messagesReadByMe` push) confirmed
    /// the optimistic marks.
    pub fn confirm_mark_read(&mut self) {
        for entry in self.entries.iter_mut() {
            if entry.read_state == ReadState::PendingRead {
                entry.read_state = ReadState::Read;
                entry.message.read = true;
            }
        }
    }

    /// The mark-as-read call failed: roll the optimistic marks back so
    /// the view again shows server truth.
    pub fn rollback_mark_read(&mut self) {
        for entry in self.entries.iter_mut() {
            if entry.read_state == ReadState::PendingRead {
                entry.read_state = ReadState::Unread;
            }
        }
    }

    /// Whether the counterpart's typing indicator should be shown.
    pub fn is_other_typing(&self, now: Instant) -> bool {
        self.typing_deadline.map(|d| d > now).unwrap_or(false)
    }

    /// Periodic tick; clears a typing indicator the sender never
    /// explicitly stopped. Returns true if the indicator changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.typing_deadline {
            if deadline <= now {
                self.typing_deadline = None;
                return true;
            }
        }
        false
    }

    /// Insert in chronological order or replace an existing entry with
    /// the same id. Returns true when the message was new.
    fn insert_or_replace(&mut self, message: Message) -> bool {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.message.id == message.id)
        {
            // Same id delivered by both REST and push: replace, never
            // duplicate. Keep an optimistic pending mark if one is set.
            let pending = existing.read_state == ReadState::PendingRead && !message.read;
            *existing = MessageEntry::from_server(message);
            if pending {
                existing.read_state = ReadState::PendingRead;
            }
            return false;
        }

        let entry = MessageEntry::from_server(message);
        let position = self
            .entries
            .partition_point(|e| {
                (e.message.created_at, e.message.id)
                    <= (entry.message.created_at, entry.message.id)
            });
        self.entries.insert(position, entry);
        true
    }
}
