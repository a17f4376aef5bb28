//! Order history for the signed-in buyer.

use std::sync::Arc;

use uuid::Uuid;

use bazaar_store::Store;
use bazaar_types::models::{Order, OrderItemEntry};

use crate::{Result, blocking};

/// One order with its item lines, as the order-history page shows it.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub order: Order,
    pub items: Vec<OrderItemEntry>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<Store>,
    user_id: Uuid,
}

impl OrderService {
    pub(crate) fn new(store: Arc<Store>, user_id: Uuid) -> Self {
        Self { store, user_id }
    }

    /// Full history newest first, items included.
    pub async fn history(&self) -> Result<Vec<OrderView>> {
        let user_id = self.user_id;
        blocking(&self.store, move |s| {
            let orders = s.orders_for_buyer(user_id)?;
            let mut views = Vec::with_capacity(orders.len());
            for order in orders {
                let items = s.order_items(order.id)?;
                views.push(OrderView { order, items });
            }
            Ok(views)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use bazaar_types::models::{PaymentMode, UserType};

    use super::*;
    use crate::checkout::CheckoutDetails;
    use crate::session::Storefront;

    #[tokio::test]
    async fn history_is_newest_first_with_items() {
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
        let saree = store
            .insert_product(seller.user_id, "Cotton Saree", None, "Textiles", 2500, None)
            .unwrap();

        let details = CheckoutDetails {
            shipping_address: "12 Bazaar Road, Jaipur".into(),
            phone: "+91 9000000000".into(),
            payment_mode: PaymentMode::Cod,
        };

        buyer.cart().add(pot.id, 1).await.unwrap();
        buyer.checkout().place_order(details.clone()).await.unwrap();

        buyer.cart().add(saree.id, 2).await.unwrap();
        let second = buyer.checkout().place_order(details).await.unwrap();

        let history = buyer.orders().history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].order.id, second.id);
        assert_eq!(history[0].items.len(), 1);
        assert_eq!(history[0].items[0].product_name, "Cotton Saree");
        assert_eq!(history[1].items[0].product_name, "Clay Pot");
    }
}
