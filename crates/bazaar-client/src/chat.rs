//! Chat service: the conversation directory, the message view for the
//! selected conversation, and the conversation-scoped live subscription.
//! The session-wide badge/toast subscription lives in `notify`; the two
//! are independent and no ordering between them is assumed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use bazaar_store::feed::Subscription;
use bazaar_store::{Store, StoreError};
use bazaar_types::events::StoreEvent;
use bazaar_types::models::{Conversation, ConversationEntry, Message};

use crate::{ClientError, Result, blocking};

pub struct ChatService {
    store: Arc<Store>,
    user_id: Uuid,
    /// Session-shutdown signal from the hub; live tasks exit when it flips.
    closed: watch::Receiver<bool>,
    conversations: Vec<ConversationEntry>,
    active: Option<ActiveConversation>,
}

/// The open conversation. Dropping it aborts the live task, so delivery
/// can never outlive the view that owns it.
struct ActiveConversation {
    conversation: Conversation,
    messages: Arc<Mutex<Vec<Message>>>,
    task: JoinHandle<()>,
}

impl Drop for ActiveConversation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ChatService {
    pub(crate) fn new(store: Arc<Store>, user_id: Uuid, closed: watch::Receiver<bool>) -> Self {
        Self {
            store,
            user_id,
            closed,
            conversations: Vec::new(),
            active: None,
        }
    }

    /// Fetch the conversation directory: everything the user takes part
    /// in, newest first, counterpart names resolved.
    pub async fn load_conversations(&mut self) -> Result<&[ConversationEntry]> {
        let user_id = self.user_id;
        self.conversations =
            blocking(&self.store, move |s| s.conversations_for_user(user_id)).await?;
        Ok(&self.conversations)
    }

    pub fn conversations(&self) -> &[ConversationEntry] {
        &self.conversations
    }

    /// "Contact this seller": reuse the existing (buyer, seller)
    /// conversation or create it, then open it. Calling this twice for the
    /// same seller resolves to the same conversation id.
    pub async fn contact(&mut self, seller_id: Uuid) -> Result<Uuid> {
        if seller_id == self.user_id {
            return Err(ClientError::Validation(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let buyer_id = self.user_id;
        let conversation = blocking(&self.store, move |s| {
            s.find_or_create_conversation(buyer_id, seller_id)
        })
        .await?;

        let id = conversation.id;
        self.select(id).await?;
        Ok(id)
    }

    /// Open a conversation: fetch its full history ascending, flip every
    /// foreign unread message with one conditioned bulk update, and attach
    /// the live subscription. On failure the previously selected
    /// conversation stays untouched.
    pub async fn select(&mut self, conversation_id: Uuid) -> Result<()> {
        if *self.closed.borrow() {
            return Err(ClientError::Validation("session is closed".into()));
        }

        // Subscribe before fetching history: an insert racing the fetch is
        // then either in the history or buffered for the pump, never lost.
        // The overlap is absorbed by the history-seeded dedup set.
        let sub = self.store.feed().subscribe();

        let user_id = self.user_id;
        let (conversation, history) = blocking(&self.store, move |s| {
            let conversation = s
                .conversation(conversation_id)?
                .ok_or(StoreError::NotFound)?;
            if !conversation.involves(user_id) {
                return Err(StoreError::Invalid("participant"));
            }
            let history = s.messages_for_conversation(conversation_id)?;
            s.mark_conversation_read(conversation_id, user_id)?;
            Ok((conversation, history))
        })
        .await?;

        let seen: HashSet<Uuid> = history.iter().map(|m| m.id).collect();
        let seen = Arc::new(Mutex::new(seen));
        let messages = Arc::new(Mutex::new(history));

        let task = tokio::spawn(pump_live(
            sub,
            self.store.clone(),
            self.user_id,
            conversation_id,
            messages.clone(),
            seen.clone(),
            self.closed.clone(),
        ));

        debug!("conversation {} selected", conversation_id);
        // Replacing the previous selection aborts its live task.
        self.active = Some(ActiveConversation {
            conversation,
            messages,
            task,
        });
        Ok(())
    }

    /// Close the open conversation and detach its subscription.
    pub fn close(&mut self) {
        self.active = None;
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.as_ref().map(|a| &a.conversation)
    }

    /// Snapshot of the open conversation's messages, in arrival order.
    pub fn messages(&self) -> Vec<Message> {
        self.active
            .as_ref()
            .map(|a| a.messages.lock().expect("message list lock poisoned").clone())
            .unwrap_or_default()
    }

    /// Send a message into the open conversation. Empty input is rejected
    /// before any store call; the inserted row is appended optimistically
    /// and deduped when the feed echoes it back.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let active = self.active.as_ref().ok_or_else(|| {
            ClientError::Validation("no conversation selected".into())
        })?;
        if content.trim().is_empty() {
            return Err(ClientError::Validation("message is empty".into()));
        }

        let conversation_id = active.conversation.id;
        let sender_id = self.user_id;
        let content = content.to_string();
        let message = blocking(&self.store, move |s| {
            s.insert_message(conversation_id, sender_id, &content)
        })
        .await?;

        append_once(&active.messages, message.clone());
        Ok(message)
    }
}

/// Append a message unless its id was already processed this selection.
fn append_once(messages: &Arc<Mutex<Vec<Message>>>, message: Message) -> bool {
    // Both the feed pump and the optimistic send path insert under this
    // lock, whichever lands second is a no-op.
    let mut list = messages.lock().expect("message list lock poisoned");
    if list.iter().any(|m| m.id == message.id) {
        return false;
    }
    list.push(message);
    true
}

/// Conversation-scoped live handler: append matching inserts in arrival
/// order, and mark foreign messages read immediately since the
/// conversation is open and on screen. Exits on session shutdown.
async fn pump_live(
    mut sub: Subscription,
    store: Arc<Store>,
    user_id: Uuid,
    conversation_id: Uuid,
    messages: Arc<Mutex<Vec<Message>>>,
    seen: Arc<Mutex<HashSet<Uuid>>>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        if *closed.borrow() {
            break;
        }
        let event = tokio::select! {
            changed = closed.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            event = sub.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        // Re-check after the await: the session may have closed while the
        // event was in flight.
        if *closed.borrow() {
            break;
        }

        if event.conversation_id() != Some(conversation_id) {
            continue;
        }
        let StoreEvent::MessageInserted(message) = event else {
            continue;
        };
        {
            let mut seen = seen.lock().expect("dedup set lock poisoned");
            if !seen.insert(message.id) {
                continue;
            }
        }

        let from_other = message.sender_id != user_id;
        let message_id = message.id;
        if !append_once(&messages, message) {
            continue;
        }

        if from_other {
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.mark_message_read(message_id, user_id))
                .await
            {
                Ok(Err(e)) => warn!("failed to mark live message {} read: {}", message_id, e),
                Err(e) => warn!("mark-read task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }
    debug!("live subscription for conversation {} closed", conversation_id);
}
