pub mod fanout;
pub mod message_store;
pub mod notification_feed;
pub mod typing;

pub use fanout::FanoutDispatcher;
pub use message_store::MessageStore;
pub use notification_feed::{MarkOutcome, NotificationFeed};
pub use typing::TypingRegistry;
