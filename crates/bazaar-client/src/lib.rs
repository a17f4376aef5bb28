//! Storefront state layer: explicit session context, the chat service and
//! its live subscriptions, the notification hub behind the nav badges, and
//! the CRUD services (catalog, cart, checkout, orders, seller, profile).
//! All persistence and event delivery is delegated to `bazaar-store`.

pub mod cart;
pub mod catalog;
pub mod chat;
pub mod checkout;
pub mod error;
pub mod notify;
pub mod orders;
pub mod seller;
pub mod session;

pub use error::{ClientError, Result};
pub use session::{SessionContext, Storefront};

use std::sync::Arc;

use bazaar_store::{Store, StoreError};

/// Run a store call off the async runtime. Every store round-trip in this
/// crate goes through here so callers suspend instead of blocking.
pub(crate) async fn blocking<T, F>(store: &Arc<Store>, f: F) -> Result<T>
where
    F: FnOnce(&Store) -> std::result::Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    let out = tokio::task::spawn_blocking(move || f(&store)).await?;
    Ok(out?)
}
