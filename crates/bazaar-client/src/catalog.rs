//! Product browsing. Listing pulls the active catalog from the store and
//! applies the search/category/price filter in memory, the same shape the
//! marketplace pages render from.

use std::sync::Arc;

use uuid::Uuid;

use bazaar_store::Store;
use bazaar_types::models::Product;

use crate::{ClientError, Result, blocking};

/// Filter applied on top of the active-products listing. An empty filter
/// passes everything through.
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    /// Case-insensitive substring match over name and description.
    pub search: Option<String>,
    pub category: Option<String>,
    pub max_price: Option<i64>,
}

impl ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&needle);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !product.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price > max {
                return false;
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<Store>,
}

impl CatalogService {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Active products newest first, narrowed by the filter.
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let filter = filter.clone();
        blocking(&self.store, move |s| {
            let mut products = s.products()?;
            products.retain(|p| filter.matches(p));
            Ok(products)
        })
        .await
    }

    pub async fn product(&self, id: Uuid) -> Result<Product> {
        blocking(&self.store, move |s| s.product(id))
            .await?
            .ok_or(ClientError::Store(bazaar_store::StoreError::NotFound))
    }

    /// Distinct categories present in the active catalog, for the filter
    /// dropdown.
    pub async fn categories(&self) -> Result<Vec<String>> {
        blocking(&self.store, move |s| {
            let mut categories: Vec<String> =
                s.products()?.into_iter().map(|p| p.category).collect();
            categories.sort();
            categories.dedup();
            Ok(categories)
        })
        .await
    }
}
