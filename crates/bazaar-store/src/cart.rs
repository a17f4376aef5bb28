use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use bazaar_types::events::StoreEvent;
use bazaar_types::models::{CartItem, CartLine, Product};

use crate::{Store, StoreError, parse_col};

fn cart_line_from_row(row: &Row<'_>) -> rusqlite::Result<CartLine> {
    Ok(CartLine {
        item: CartItem {
            id: parse_col(0, row.get(0)?)?,
            user_id: parse_col(1, row.get(1)?)?,
            product_id: parse_col(2, row.get(2)?)?,
            quantity: row.get(3)?,
            created_at: row.get(4)?,
        },
        product: Product {
            id: parse_col(5, row.get(5)?)?,
            seller_id: parse_col(6, row.get(6)?)?,
            name: row.get(7)?,
            description: row.get(8)?,
            category: row.get(9)?,
            price: row.get(10)?,
            image_url: row.get(11)?,
            is_active: row.get(12)?,
            created_at: row.get(13)?,
        },
    })
}

impl Store {
    /// Add a product to a user's cart; adding the same product again merges
    /// quantities into the existing row.
    pub fn add_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<(), StoreError> {
        if quantity == 0 {
            return Err(StoreError::Invalid("quantity"));
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cart_items (id, user_id, product_id, quantity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, product_id)
                 DO UPDATE SET quantity = quantity + excluded.quantity",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    product_id.to_string(),
                    quantity,
                    Utc::now(),
                ],
            )?;
            Ok(())
        })?;

        self.feed.publish(StoreEvent::CartChanged { user_id });
        Ok(())
    }

    /// Set a line's quantity. Scoped to the owning user so a leaked item
    /// id cannot touch another user's cart.
    pub fn set_cart_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<(), StoreError> {
        if quantity == 0 {
            return self.remove_cart_item(user_id, item_id);
        }

        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE cart_items SET quantity = ?3 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![item_id.to_string(), user_id.to_string(), quantity],
            )?)
        })?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        self.feed.publish(StoreEvent::CartChanged { user_id });
        Ok(())
    }

    pub fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), StoreError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM cart_items WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![item_id.to_string(), user_id.to_string()],
            )?)
        })?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        self.feed.publish(StoreEvent::CartChanged { user_id });
        Ok(())
    }

    /// Cart rows joined with their products, oldest first.
    pub fn cart_for_user(&self, user_id: Uuid) -> Result<Vec<CartLine>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ci.id, ci.user_id, ci.product_id, ci.quantity, ci.created_at,
                        p.id, p.seller_id, p.name, p.description, p.category, p.price,
                        p.image_url, p.is_active, p.created_at
                 FROM cart_items ci
                 JOIN products p ON ci.product_id = p.id
                 WHERE ci.user_id = ?1
                 ORDER BY ci.created_at ASC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], cart_line_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct-item count for the nav badge.
    pub fn cart_count(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM cart_items WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )?)
        })
    }
}
