//! Seller dashboard: manage the seller's own listings, upload product
//! images, and read the aggregated sales figures.

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use bazaar_store::Store;
use bazaar_store::objects::MediaStore;
use bazaar_types::models::{OrderStatus, Product, SellerStats};

use crate::{ClientError, Result, blocking};

/// Listing form contents, validated before anything is written.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    /// Price in whole rupees.
    pub price: i64,
    pub image_url: Option<String>,
}

impl ProductDraft {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation("product name is empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(ClientError::Validation("category is empty".into()));
        }
        if self.price <= 0 {
            return Err(ClientError::Validation("price must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SellerService {
    store: Arc<Store>,
    seller_id: Uuid,
}

impl SellerService {
    pub(crate) fn new(store: Arc<Store>, seller_id: Uuid) -> Self {
        Self { store, seller_id }
    }

    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        draft.validate()?;
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| {
            s.insert_product(
                seller_id,
                draft.name.trim(),
                draft.description.as_deref(),
                draft.category.trim(),
                draft.price,
                draft.image_url.as_deref(),
            )
        })
        .await
    }

    /// Update one of the seller's own listings. Editing somebody else's
    /// product is rejected as not found.
    pub async fn update_product(&self, product_id: Uuid, draft: ProductDraft) -> Result<()> {
        draft.validate()?;
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| {
            owned_product(s, product_id, seller_id)?;
            s.update_product(
                product_id,
                draft.name.trim(),
                draft.description.as_deref(),
                draft.category.trim(),
                draft.price,
                draft.image_url.as_deref(),
            )
        })
        .await
    }

    /// Show or hide a listing without deleting it.
    pub async fn set_active(&self, product_id: Uuid, active: bool) -> Result<()> {
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| {
            owned_product(s, product_id, seller_id)?;
            s.set_product_active(product_id, active)
        })
        .await
    }

    pub async fn delete_product(&self, product_id: Uuid) -> Result<()> {
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| {
            owned_product(s, product_id, seller_id)?;
            s.delete_product(product_id)
        })
        .await
    }

    /// The seller's listings, hidden ones included.
    pub async fn my_products(&self) -> Result<Vec<Product>> {
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| s.products_by_seller(seller_id)).await
    }

    /// Push a fulfilment update on an order that contains this seller's
    /// items. Orders the seller has no items in are invisible to them.
    pub async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<()> {
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| {
            let items = s.order_items(order_id)?;
            if !items.iter().any(|e| e.item.seller_id == seller_id) {
                return Err(bazaar_store::StoreError::NotFound);
            }
            s.update_order_status(order_id, status)
        })
        .await
    }

    pub async fn stats(&self) -> Result<SellerStats> {
        let seller_id = self.seller_id;
        blocking(&self.store, move |s| s.seller_stats(seller_id)).await
    }

    /// Upload a product image and return the URL to put in a draft.
    pub async fn upload_image(
        &self,
        media: &MediaStore,
        ext: &str,
        bytes: Bytes,
    ) -> Result<String> {
        Ok(media.upload(self.seller_id, ext, bytes).await?)
    }
}

fn owned_product(
    store: &Store,
    product_id: Uuid,
    seller_id: Uuid,
) -> std::result::Result<(), bazaar_store::StoreError> {
    let product = store
        .product(product_id)?
        .ok_or(bazaar_store::StoreError::NotFound)?;
    if product.seller_id != seller_id {
        return Err(bazaar_store::StoreError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bazaar_types::models::UserType;

    use super::*;
    use crate::session::Storefront;

    fn draft(name: &str, price: i64) -> ProductDraft {
        ProductDraft {
            name: name.into(),
            description: None,
            category: "Handicrafts".into(),
            price,
            image_url: None,
        }
    }

    async fn fixture() -> (Arc<Store>, crate::session::SessionContext) {
        let store = Arc::new(Store::open_in_memory("test-secret").unwrap());
        let front = Storefront::new(store.clone());
        let seller = front
            .sign_up("ravi@example.com", "password123", "Ravi Kumar", UserType::Seller)
            .await
            .unwrap();
        (store, seller)
    }

    #[tokio::test]
    async fn listing_lifecycle() {
        let (store, seller) = fixture().await;
        let service = seller.seller().await.unwrap();

        let pot = service.create_product(draft("Clay Pot", 800)).await.unwrap();
        assert!(pot.is_active);

        service
            .update_product(pot.id, draft("Painted Clay Pot", 950))
            .await
            .unwrap();
        service.set_active(pot.id, false).await.unwrap();

        let mine = service.my_products().await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Painted Clay Pot");
        assert!(!mine[0].is_active);
        assert!(store.products().unwrap().is_empty());

        service.delete_product(pot.id).await.unwrap();
        assert!(service.my_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cannot_touch_another_sellers_listing() {
        let (store, seller) = fixture().await;
        let other = store
            .sign_up("meera@example.com", "password123", "Meera", UserType::Seller)
            .unwrap();
        let foreign = store
            .insert_product(other.user_id, "Silk Scarf", None, "Textiles", 1500, None)
            .unwrap();

        let service = seller.seller().await.unwrap();
        assert!(service.update_product(foreign.id, draft("X", 10)).await.is_err());
        assert!(service.set_active(foreign.id, false).await.is_err());
        assert!(service.delete_product(foreign.id).await.is_err());
    }

    #[tokio::test]
    async fn only_participating_sellers_update_order_status() {
        let (store, seller) = fixture().await;
        let other = store
            .sign_up("meera@example.com", "password123", "Meera", UserType::Seller)
            .unwrap();
        let buyer = store
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .unwrap();

        // The order contains only the other seller's product.
        let scarf = store
            .insert_product(other.user_id, "Silk Scarf", None, "Textiles", 1500, None)
            .unwrap();
        store.add_cart_item(buyer.user_id, scarf.id, 1).unwrap();
        let lines = store.cart_for_user(buyer.user_id).unwrap();
        let order = store
            .place_order(buyer.user_id, &lines, "addr", "phone", bazaar_types::models::PaymentMode::Cod)
            .unwrap();

        let service = seller.seller().await.unwrap();
        assert!(service
            .update_order_status(order.id, OrderStatus::Shipped)
            .await
            .is_err());
        assert_eq!(
            store.orders_for_buyer(buyer.user_id).unwrap()[0].order_status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn draft_validation() {
        let (_store, seller) = fixture().await;
        let service = seller.seller().await.unwrap();

        assert!(matches!(
            service.create_product(draft("  ", 10)).await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            service.create_product(draft("Pot", 0)).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn image_upload_returns_a_stable_url() {
        let (_store, seller) = fixture().await;
        let dir = std::env::temp_dir().join(format!("bazaar-media-{}", Uuid::new_v4()));
        let media = MediaStore::new(dir, "https://media.localbazaar.test")
            .await
            .unwrap();

        let url = seller
            .seller()
            .await
            .unwrap()
            .upload_image(&media, "jpg", Bytes::from_static(b"image-bytes"))
            .await
            .unwrap();
        assert!(url.contains(&seller.user_id().to_string()));
    }
}
