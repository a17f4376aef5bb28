use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, Message};

/// Row-change events published on the store's change feed after every
/// successful relevant write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    /// A new message row was inserted
    MessageInserted(Message),

    /// Unread messages in a conversation were flipped to read
    ConversationRead {
        conversation_id: Uuid,
        reader_id: Uuid,
        marked: u64,
    },

    /// A conversation row was created
    ConversationCreated(Conversation),

    /// A user's cart rows changed (insert/update/delete)
    CartChanged { user_id: Uuid },

    /// An order was placed
    OrderPlaced { order_id: Uuid, buyer_id: Uuid },
}

impl StoreEvent {
    /// Returns the conversation id if this event is scoped to a specific
    /// conversation. Events that return `None` carry their own scoping.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageInserted(m) => Some(m.conversation_id),
            Self::ConversationRead {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::ConversationCreated(c) => Some(c.id),
            _ => None,
        }
    }
}

/// Payload for the transient toast surface: who sent the message and a
/// truncated preview of its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub sender_name: String,
    pub preview: String,
}
