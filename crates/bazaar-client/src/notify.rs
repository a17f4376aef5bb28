//! Session-wide notification hub: the unread counter behind the message
//! badge, the cart badge, and the toast stream. The hub owns one
//! subscription spanning the whole session; the counters are always
//! recomputed from the store on each relevant event, so the incremental
//! value can never drift from a fresh recomputation.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use bazaar_store::feed::Subscription;
use bazaar_store::{Store, StoreError};
use bazaar_types::events::{Notification, StoreEvent};

use crate::Result;

/// Toast previews show at most this many characters of the message.
pub const PREVIEW_LEN: usize = 50;

const TOAST_CAPACITY: usize = 64;

/// Truncated content preview for a toast: first 50 chars, with an ellipsis
/// appended when the original is longer.
pub fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_LEN).collect();
    if content.chars().count() > PREVIEW_LEN {
        out.push_str("...");
    }
    out
}

#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    store: Arc<Store>,
    user_id: Uuid,
    unread_tx: watch::Sender<u64>,
    cart_tx: watch::Sender<u64>,
    toast_tx: broadcast::Sender<Notification>,
    /// Message ids already counted/toasted this session, so a redelivered
    /// insert is never processed twice.
    seen: Mutex<HashSet<Uuid>>,
    /// false = cold (badges read 0), true = tracked.
    tracked: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Flipped to true once, on sign-out. Everything spawned for this
    /// session watches it and exits.
    shutdown_tx: watch::Sender<bool>,
}

impl NotificationHub {
    /// Subscribe to the change feed, run the cold-start recomputation, and
    /// spawn the event-pump task. Subscribing first means an insert racing
    /// the initial scan is at worst recomputed twice, never missed.
    pub(crate) async fn start(store: Arc<Store>, user_id: Uuid) -> Result<Self> {
        let (unread_tx, _) = watch::channel(0);
        let (cart_tx, _) = watch::channel(0);
        let (toast_tx, _) = broadcast::channel(TOAST_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        let hub = Self {
            inner: Arc::new(HubInner {
                store: store.clone(),
                user_id,
                unread_tx,
                cart_tx,
                toast_tx,
                seen: Mutex::new(HashSet::new()),
                tracked: AtomicBool::new(false),
                task: Mutex::new(None),
                shutdown_tx,
            }),
        };

        let sub = store.feed().subscribe();
        hub.refresh().await?;

        let task = tokio::spawn(run(hub.inner.clone(), sub));
        *hub.inner.task.lock().expect("hub task lock poisoned") = Some(task);

        info!("notification hub tracking user {}", user_id);
        Ok(hub)
    }

    /// Recompute both badges from the store and move to the tracked state.
    pub async fn refresh(&self) -> Result<()> {
        let store = self.inner.store.clone();
        let user_id = self.inner.user_id;
        let (unread, cart) = tokio::task::spawn_blocking(move || {
            Ok::<_, StoreError>((
                store.unread_count_for_user(user_id)?,
                store.cart_count(user_id)?,
            ))
        })
        .await??;

        // send_replace: the value must stick even while no receiver exists.
        self.inner.unread_tx.send_replace(unread);
        self.inner.cart_tx.send_replace(cart);
        self.inner.tracked.store(true, Ordering::Release);
        Ok(())
    }

    /// Numeric unread-count signal for the nav badge.
    pub fn unread_badge(&self) -> watch::Receiver<u64> {
        self.inner.unread_tx.subscribe()
    }

    pub fn cart_badge(&self) -> watch::Receiver<u64> {
        self.inner.cart_tx.subscribe()
    }

    /// Toast stream for the transient notification surface.
    pub fn toasts(&self) -> broadcast::Receiver<Notification> {
        self.inner.toast_tx.subscribe()
    }

    pub fn unread_count(&self) -> u64 {
        *self.inner.unread_tx.borrow()
    }

    pub fn cart_count(&self) -> u64 {
        *self.inner.cart_tx.borrow()
    }

    pub fn is_tracked(&self) -> bool {
        self.inner.tracked.load(Ordering::Acquire)
    }

    /// Session-shutdown signal. Reads false until `stop` runs; tasks tied
    /// to this session watch it and exit once it flips.
    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Back to cold: abort the pump task, flip the shutdown signal, zero
    /// the badges, forget seen ids. No toast or badge update can be
    /// delivered after this returns.
    pub(crate) fn stop(&self) {
        if let Some(task) = self
            .inner
            .task
            .lock()
            .expect("hub task lock poisoned")
            .take()
        {
            task.abort();
        }
        self.inner.shutdown_tx.send_replace(true);
        self.inner.tracked.store(false, Ordering::Release);
        self.inner.unread_tx.send_replace(0);
        self.inner.cart_tx.send_replace(0);
        self.inner
            .seen
            .lock()
            .expect("seen set lock poisoned")
            .clear();
    }
}

async fn run(inner: Arc<HubInner>, mut sub: Subscription) {
    while let Some(event) = sub.recv().await {
        if let Err(e) = handle_event(&inner, event).await {
            error!("notification hub failed to handle event: {e}");
        }
    }
    debug!("change feed closed, notification hub task exiting");
}

async fn handle_event(inner: &Arc<HubInner>, event: StoreEvent) -> Result<()> {
    match event {
        StoreEvent::MessageInserted(message) => {
            if message.sender_id == inner.user_id {
                return Ok(());
            }
            {
                let mut seen = inner.seen.lock().expect("seen set lock poisoned");
                if !seen.insert(message.id) {
                    return Ok(());
                }
            }

            let store = inner.store.clone();
            let user_id = inner.user_id;
            let sender_id = message.sender_id;
            let conversation_id = message.conversation_id;
            let outcome = tokio::task::spawn_blocking(move || {
                // Only messages addressed to this user move the badge.
                let Some(conversation) = store.conversation(conversation_id)? else {
                    return Ok::<_, StoreError>(None);
                };
                if conversation.counterpart_of(user_id).is_none() {
                    return Ok(None);
                }
                let unread = store.unread_count_for_user(user_id)?;
                let sender_name = store
                    .display_name(sender_id)?
                    .unwrap_or_else(|| "Someone".to_string());
                Ok(Some((unread, sender_name)))
            })
            .await??;

            if let Some((unread, sender_name)) = outcome {
                inner.unread_tx.send_replace(unread);
                let _ = inner.toast_tx.send(Notification {
                    sender_name,
                    preview: preview(&message.content),
                });
            }
        }

        StoreEvent::ConversationRead { reader_id, .. } if reader_id == inner.user_id => {
            let store = inner.store.clone();
            let user_id = inner.user_id;
            let unread =
                tokio::task::spawn_blocking(move || store.unread_count_for_user(user_id)).await??;
            inner.unread_tx.send_replace(unread);
        }

        StoreEvent::CartChanged { user_id } if user_id == inner.user_id => {
            let store = inner.store.clone();
            let count = tokio::task::spawn_blocking(move || store.cart_count(user_id)).await??;
            inner.cart_tx.send_replace(count);
        }

        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bazaar_types::models::UserType;

    use super::*;
    use crate::session::Storefront;

    #[tokio::test]
    async fn foreign_message_moves_badge_and_toasts_once() {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        let front = Storefront::new(store.clone());
        let buyer = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();
        let seller = front
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .await
            .unwrap();

        let conv = store
            .find_or_create_conversation(buyer.user_id(), seller.user_id())
            .unwrap();

        let mut toasts = buyer.hub().toasts();
        let mut badge = buyer.hub().unread_badge();
        assert_eq!(*badge.borrow_and_update(), 0);

        // No conversation is open on the buyer's side
        let long = "x".repeat(60);
        store.insert_message(conv.id, seller.user_id(), &long).unwrap();

        let toast = tokio::time::timeout(Duration::from_secs(2), toasts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(toast.sender_name, "Ravi Kumar");
        assert_eq!(toast.preview, format!("{}...", "x".repeat(50)));

        tokio::time::timeout(Duration::from_secs(2), badge.wait_for(|c| *c == 1))
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(toasts.try_recv().is_err(), "exactly one toast expected");
    }

    #[tokio::test]
    async fn badge_values_stick_without_any_subscriber() {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        let front = Storefront::new(store.clone());
        let buyer = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();
        let seller = store
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .unwrap();

        let conv = store
            .find_or_create_conversation(buyer.user_id(), seller.user_id)
            .unwrap();
        // No watch receiver was ever taken from the hub.
        store.insert_message(conv.id, seller.user_id, "namaste").unwrap();

        let hub = buyer.hub().clone();
        for _ in 0..400 {
            if hub.unread_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hub.unread_count(), 1);
        assert!(hub.is_tracked());
    }

    #[tokio::test]
    async fn messages_between_other_users_are_invisible() {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        let front = Storefront::new(store.clone());
        let bystander = front
            .sign_up("meera@example.com", "password123", "Meera Bai", UserType::Buyer)
            .await
            .unwrap();
        let buyer = store
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .unwrap();
        let seller = store
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .unwrap();

        let conv = store
            .find_or_create_conversation(buyer.user_id, seller.user_id)
            .unwrap();

        let mut toasts = bystander.hub().toasts();
        store.insert_message(conv.id, seller.user_id, "not for you").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(toasts.try_recv().is_err());
        assert_eq!(bystander.hub().unread_count(), 0);
    }

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(preview("hello"), "hello");

        let exactly_fifty = "x".repeat(50);
        assert_eq!(preview(&exactly_fifty), exactly_fifty);
    }

    #[test]
    fn long_content_gets_fifty_chars_and_ellipsis() {
        let sixty = "a".repeat(60);
        let p = preview(&sixty);
        assert_eq!(p, format!("{}...", "a".repeat(50)));
        assert_eq!(p.chars().count(), 53);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let content = "नमस्ते ".repeat(12); // 84 chars, far more bytes
        let p = preview(&content);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 53);
    }
}
