//! Checkout: validate the shipping details, turn the current cart into an
//! order, and hand back the placed order. The store clears the cart inside
//! the same transaction that writes the order.

use std::sync::Arc;

use uuid::Uuid;

use bazaar_store::Store;
use bazaar_types::models::{Order, PaymentMode};

use crate::{ClientError, Result, blocking};

/// Shipping details collected on the checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub shipping_address: String,
    pub phone: String,
    pub payment_mode: PaymentMode,
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<Store>,
    user_id: Uuid,
}

impl CheckoutService {
    pub(crate) fn new(store: Arc<Store>, user_id: Uuid) -> Self {
        Self { store, user_id }
    }

    /// Place an order from the current cart. An empty cart or blank
    /// shipping details are rejected before the store is touched.
    pub async fn place_order(&self, details: CheckoutDetails) -> Result<Order> {
        if details.shipping_address.trim().is_empty() {
            return Err(ClientError::Validation("shipping address is empty".into()));
        }
        if details.phone.trim().is_empty() {
            return Err(ClientError::Validation("phone number is empty".into()));
        }

        let user_id = self.user_id;
        blocking(&self.store, move |s| {
            let lines = s.cart_for_user(user_id)?;
            if lines.is_empty() {
                return Err(bazaar_store::StoreError::Invalid("cart is empty"));
            }
            s.place_order(
                user_id,
                &lines,
                details.shipping_address.trim(),
                details.phone.trim(),
                details.payment_mode,
            )
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use bazaar_types::models::{OrderStatus, PaymentStatus, UserType};

    use super::*;
    use crate::session::Storefront;

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            shipping_address: "12 Bazaar Road, Jaipur".into(),
            phone: "+91 9000000000".into(),
            payment_mode: PaymentMode::Cod,
        }
    }

    #[tokio::test]
    async fn placing_an_order_consumes_the_cart() {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        let front = Storefront::new(store.clone());
        let buyer = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();
        let seller = store
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .unwrap();
        let pot = store
            .insert_product(seller.user_id, "Clay Pot", None, "Handicrafts", 800, None)
            .unwrap();

        buyer.cart().add(pot.id, 3).await.unwrap();

        let order = buyer.checkout().place_order(details()).await.unwrap();
        assert_eq!(order.total_amount, 2400);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.order_status, OrderStatus::Pending);

        assert!(buyer.cart().lines().await.unwrap().is_empty());

        // A second checkout finds nothing to order
        assert!(buyer.checkout().place_order(details()).await.is_err());
    }

    #[tokio::test]
    async fn blank_details_are_rejected() {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        let front = Storefront::new(store.clone());
        let buyer = front
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .await
            .unwrap();

        let mut bad = details();
        bad.shipping_address = "   ".into();
        assert!(matches!(
            buyer.checkout().place_order(bad).await,
            Err(ClientError::Validation(_))
        ));

        let mut bad = details();
        bad.phone = "".into();
        assert!(matches!(
            buyer.checkout().place_order(bad).await,
            Err(ClientError::Validation(_))
        ));
    }
}
