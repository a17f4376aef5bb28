use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use bazaar_types::models::Product;

use crate::{Store, StoreError, parse_col};

const PRODUCT_COLS: &str =
    "id, seller_id, name, description, category, price, image_url, is_active, created_at";

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: parse_col(0, row.get(0)?)?,
        seller_id: parse_col(1, row.get(1)?)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        price: row.get(5)?,
        image_url: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl Store {
    pub fn insert_product(
        &self,
        seller_id: Uuid,
        name: &str,
        description: Option<&str>,
        category: &str,
        price: i64,
        image_url: Option<&str>,
    ) -> Result<Product, StoreError> {
        let product = Product {
            id: Uuid::new_v4(),
            seller_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            category: category.to_string(),
            price,
            image_url: image_url.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (id, seller_id, name, description, category, price, image_url, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
                rusqlite::params![
                    product.id.to_string(),
                    product.seller_id.to_string(),
                    product.name,
                    product.description,
                    product.category,
                    product.price,
                    product.image_url,
                    product.created_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(product)
    }

    pub fn update_product(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
        category: &str,
        price: i64,
        image_url: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE products SET name = ?2, description = ?3, category = ?4, price = ?5, image_url = ?6
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), name, description, category, price, image_url],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn set_product_active(&self, id: Uuid, active: bool) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE products SET is_active = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), active],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn delete_product(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM products WHERE id = ?1", [id.to_string()])?;
            Ok(())
        })
    }

    /// All active products, newest first.
    pub fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLS} FROM products WHERE is_active = 1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], product_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {PRODUCT_COLS} FROM products WHERE id = ?1"),
                    [id.to_string()],
                    product_from_row,
                )
                .optional()?)
        })
    }

    /// A seller's own products, active or not.
    pub fn products_by_seller(&self, seller_id: Uuid) -> Result<Vec<Product>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PRODUCT_COLS} FROM products WHERE seller_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([seller_id.to_string()], product_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
