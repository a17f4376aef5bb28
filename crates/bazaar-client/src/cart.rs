//! Cart operations for the signed-in user. Mutations go straight to the
//! store; the nav badge follows through the `CartChanged` events the store
//! publishes, so this service never touches the counter itself.

use std::sync::Arc;

use uuid::Uuid;

use bazaar_store::Store;
use bazaar_types::models::CartLine;

use crate::{ClientError, Result, blocking};

#[derive(Clone)]
pub struct CartService {
    store: Arc<Store>,
    user_id: Uuid,
}

impl CartService {
    pub(crate) fn new(store: Arc<Store>, user_id: Uuid) -> Self {
        Self { store, user_id }
    }

    /// Add a product; re-adding merges into the existing line.
    pub async fn add(&self, product_id: Uuid, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(ClientError::Validation("quantity must be positive".into()));
        }
        let user_id = self.user_id;
        blocking(&self.store, move |s| {
            // Only active products can be added.
            let product = s.product(product_id)?.ok_or(bazaar_store::StoreError::NotFound)?;
            if !product.is_active {
                return Err(bazaar_store::StoreError::Conflict("product is inactive"));
            }
            s.add_cart_item(user_id, product_id, quantity)
        })
        .await
    }

    /// Set a line's quantity; zero removes the line. Only lines in this
    /// user's cart are reachable.
    pub async fn set_quantity(&self, item_id: Uuid, quantity: u32) -> Result<()> {
        let user_id = self.user_id;
        blocking(&self.store, move |s| {
            s.set_cart_quantity(user_id, item_id, quantity)
        })
        .await
    }

    pub async fn remove(&self, item_id: Uuid) -> Result<()> {
        let user_id = self.user_id;
        blocking(&self.store, move |s| s.remove_cart_item(user_id, item_id)).await
    }

    /// Cart lines joined with their products, oldest first.
    pub async fn lines(&self) -> Result<Vec<CartLine>> {
        let user_id = self.user_id;
        blocking(&self.store, move |s| s.cart_for_user(user_id)).await
    }

    /// Sum of line subtotals, in rupees.
    pub async fn total(&self) -> Result<i64> {
        Ok(self.lines().await?.iter().map(CartLine::subtotal).sum())
    }
}
