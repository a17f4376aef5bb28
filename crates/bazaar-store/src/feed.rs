use tokio::sync::broadcast;
use tracing::warn;

use bazaar_types::events::StoreEvent;

const FEED_CAPACITY: usize = 1024;

/// Publish/subscribe change feed: row-change events are fanned out to every
/// live subscription. Delivery is best effort; a subscriber that falls too
/// far behind skips the lagged events.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Register a new subscription. The handle stops delivering as soon as
    /// it is dropped; consumers tie it to the lifetime of their view.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish an event to all current subscribers. Public so that tests
    /// can fabricate duplicate deliveries.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<StoreEvent>,
}

impl Subscription {
    /// Next event, or `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("change feed subscriber lagged by {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
