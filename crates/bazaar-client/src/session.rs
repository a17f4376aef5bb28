//! Entry point and explicit session context. A `Storefront` wraps the
//! backing store; authenticating yields a `SessionContext` that owns the
//! notification hub and hands out the per-feature services. Signing out
//! consumes the context and detaches everything it started.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use bazaar_store::Store;
use bazaar_types::api::Session;
use bazaar_types::models::{Profile, UserType};

use crate::cart::CartService;
use crate::catalog::CatalogService;
use crate::chat::ChatService;
use crate::checkout::CheckoutService;
use crate::notify::NotificationHub;
use crate::orders::OrderService;
use crate::seller::SellerService;
use crate::{ClientError, Result, blocking};

/// Unauthenticated surface. Browsing the catalog needs no session.
#[derive(Clone)]
pub struct Storefront {
    store: Arc<Store>,
}

impl Storefront {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Catalog browsing for visitors and signed-in users alike.
    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.store.clone())
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        user_type: UserType,
    ) -> Result<SessionContext> {
        let (email, password, full_name) =
            (email.to_string(), password.to_string(), full_name.to_string());
        let session = blocking(&self.store, move |s| {
            s.sign_up(&email, &password, &full_name, user_type)
        })
        .await?;
        self.open_session(session).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionContext> {
        let (email, password) = (email.to_string(), password.to_string());
        let session =
            blocking(&self.store, move |s| s.sign_in(&email, &password)).await?;
        self.open_session(session).await
    }

    /// Restore a session from a previously issued token.
    pub async fn resume(&self, token: &str) -> Result<SessionContext> {
        let claims = self.store.session_from_token(token)?;
        let session = Session {
            user_id: claims.sub,
            email: claims.email,
            token: token.to_string(),
        };
        self.open_session(session).await
    }

    async fn open_session(&self, session: Session) -> Result<SessionContext> {
        let hub = NotificationHub::start(self.store.clone(), session.user_id).await?;
        info!("session opened for {}", session.email);
        Ok(SessionContext {
            store: self.store.clone(),
            session,
            hub,
        })
    }
}

/// Authenticated session: identity, token, and the running notification
/// hub. Every per-user service is created from here so nothing can observe
/// user-scoped state without a session.
pub struct SessionContext {
    store: Arc<Store>,
    session: Session,
    hub: NotificationHub,
}

impl SessionContext {
    pub fn user_id(&self) -> Uuid {
        self.session.user_id
    }

    pub fn email(&self) -> &str {
        &self.session.email
    }

    pub fn token(&self) -> &str {
        &self.session.token
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn chat(&self) -> ChatService {
        ChatService::new(
            self.store.clone(),
            self.session.user_id,
            self.hub.closed_signal(),
        )
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.store.clone())
    }

    pub fn cart(&self) -> CartService {
        CartService::new(self.store.clone(), self.session.user_id)
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.store.clone(), self.session.user_id)
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.store.clone(), self.session.user_id)
    }

    /// Seller operations are reserved for seller accounts.
    pub async fn seller(&self) -> Result<SellerService> {
        let profile = self.profile().await?;
        if profile.user_type != UserType::Seller {
            return Err(ClientError::Validation("not a seller account".into()));
        }
        Ok(SellerService::new(self.store.clone(), self.session.user_id))
    }

    pub async fn profile(&self) -> Result<Profile> {
        let user_id = self.session.user_id;
        blocking(&self.store, move |s| s.profile(user_id)).await
    }

    pub async fn update_profile(
        &self,
        full_name: &str,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Profile> {
        let user_id = self.session.user_id;
        let full_name = full_name.to_string();
        let phone = phone.map(str::to_string);
        let address = address.map(str::to_string);
        blocking(&self.store, move |s| {
            s.update_profile(user_id, &full_name, phone.as_deref(), address.as_deref())?;
            s.profile(user_id)
        })
        .await
    }

    /// End the session: the hub stops, badges read zero, and no toast or
    /// badge update is delivered afterwards. Chat services created from
    /// this context are dropped with it, detaching their subscriptions.
    pub fn sign_out(self) {
        self.hub.stop();
        info!("session closed for {}", self.session.email);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn fixture() -> (Arc<Store>, Storefront) {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        (store.clone(), Storefront::new(store))
    }

    #[tokio::test]
    async fn resume_restores_the_same_identity() {
        let (_store, front) = fixture().await;
        let ctx = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();
        let token = ctx.token().to_string();
        let user_id = ctx.user_id();
        ctx.sign_out();

        let resumed = front.resume(&token).await.unwrap();
        assert_eq!(resumed.user_id(), user_id);
        assert_eq!(resumed.email(), "asha@example.com");
        assert!(resumed.hub().is_tracked());
    }

    #[tokio::test]
    async fn cold_start_counts_existing_unread_messages() {
        let (store, front) = fixture().await;
        let buyer = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();
        let seller = front
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .await
            .unwrap();

        // Three foreign unread messages; the buyer's own message and
        // already-read rows contribute nothing.
        let conv = store
            .find_or_create_conversation(buyer.user_id(), seller.user_id())
            .unwrap();
        for text in ["a", "b", "c"] {
            store.insert_message(conv.id, seller.user_id(), text).unwrap();
        }
        let mine = store.insert_message(conv.id, buyer.user_id(), "mine").unwrap();
        store.mark_message_read(mine.id, seller.user_id()).unwrap();

        buyer.sign_out();

        let fresh = front.sign_in("asha@example.com", "password123").await.unwrap();
        assert_eq!(fresh.hub().unread_count(), 3);
    }

    #[tokio::test]
    async fn sign_out_zeroes_badges_and_stops_delivery() {
        let (store, front) = fixture().await;
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

        let hub = buyer.hub().clone();
        let mut toasts = hub.toasts();
        let mut badge = hub.unread_badge();
        buyer.sign_out();

        assert_eq!(hub.unread_count(), 0);
        assert!(!hub.is_tracked());

        store.insert_message(conv.id, seller.user_id(), "too late").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(toasts.try_recv().is_err());
        assert_eq!(*badge.borrow_and_update(), 0);
        assert_eq!(hub.unread_count(), 0);
    }

    #[tokio::test]
    async fn buyers_do_not_get_seller_operations() {
        let (_store, front) = fixture().await;
        let buyer = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();
        let seller = front
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .await
            .unwrap();

        assert!(matches!(
            buyer.seller().await,
            Err(ClientError::Validation(_))
        ));
        assert!(seller.seller().await.is_ok());
    }

    #[tokio::test]
    async fn bad_credentials_do_not_open_a_session() {
        let (_store, front) = fixture().await;
        front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();

        assert!(front.sign_in("asha@example.com", "nope-nope").await.is_err());
        assert!(front.resume("not-a-token").await.is_err());
    }
}
