pub mod chat_view;
pub mod notification_view;

pub use chat_view::{ChatView, ChatViewState, Generation, MessageEntry, SyncError};
pub use notification_view::NotificationView;
