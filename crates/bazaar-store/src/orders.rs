use chrono::{Datelike, Utc};
use rusqlite::Row;
use uuid::Uuid;

use bazaar_types::events::StoreEvent;
use bazaar_types::models::{
    CartLine, Order, OrderItem, OrderItemEntry, OrderStatus, PaymentMode, PaymentStatus,
    SellerStats,
};

use crate::{Store, StoreError, parse_col};

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: parse_col(0, row.get(0)?)?,
        buyer_id: parse_col(1, row.get(1)?)?,
        total_amount: row.get(2)?,
        shipping_address: row.get(3)?,
        phone: row.get(4)?,
        payment_mode: parse_col(5, row.get(5)?)?,
        payment_status: parse_col(6, row.get(6)?)?,
        order_status: parse_col(7, row.get(7)?)?,
        created_at: row.get(8)?,
    })
}

impl Store {
    /// Create the order plus its items and clear the buyer's cart, all in
    /// one transaction. COD orders start payment-pending; online payment is
    /// simulated as already settled.
    pub fn place_order(
        &self,
        buyer_id: Uuid,
        lines: &[CartLine],
        shipping_address: &str,
        phone: &str,
        payment_mode: PaymentMode,
    ) -> Result<Order, StoreError> {
        let total_amount: i64 = lines.iter().map(CartLine::subtotal).sum();
        let payment_status = match payment_mode {
            PaymentMode::Cod => PaymentStatus::Pending,
            PaymentMode::Online => PaymentStatus::Paid,
        };

        let order = Order {
            id: Uuid::new_v4(),
            buyer_id,
            total_amount,
            shipping_address: shipping_address.to_string(),
            phone: phone.to_string(),
            payment_mode,
            payment_status,
            order_status: OrderStatus::Pending,
            created_at: Utc::now(),
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO orders (id, buyer_id, total_amount, shipping_address, phone,
                                     payment_mode, payment_status, order_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    order.id.to_string(),
                    order.buyer_id.to_string(),
                    order.total_amount,
                    order.shipping_address,
                    order.phone,
                    order.payment_mode.as_str(),
                    order.payment_status.as_str(),
                    order.order_status.as_str(),
                    order.created_at,
                ],
            )?;

            for line in lines {
                tx.execute(
                    "INSERT INTO order_items (id, order_id, product_id, seller_id, quantity, price)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        order.id.to_string(),
                        line.product.id.to_string(),
                        line.product.seller_id.to_string(),
                        line.item.quantity,
                        line.product.price,
                    ],
                )?;
            }

            tx.execute(
                "DELETE FROM cart_items WHERE user_id = ?1",
                [buyer_id.to_string()],
            )?;

            tx.commit()?;
            Ok(())
        })?;

        self.feed.publish(StoreEvent::OrderPlaced {
            order_id: order.id,
            buyer_id,
        });
        self.feed
            .publish(StoreEvent::CartChanged { user_id: buyer_id });

        Ok(order)
    }

    /// A buyer's orders, newest first.
    pub fn orders_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, buyer_id, total_amount, shipping_address, phone,
                        payment_mode, payment_status, order_status, created_at
                 FROM orders WHERE buyer_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([buyer_id.to_string()], order_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Items of one order with product display fields joined in.
    pub fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItemEntry>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT oi.id, oi.order_id, oi.product_id, oi.seller_id, oi.quantity, oi.price,
                        p.name, p.image_url
                 FROM order_items oi
                 JOIN products p ON oi.product_id = p.id
                 WHERE oi.order_id = ?1",
            )?;
            let rows = stmt
                .query_map([order_id.to_string()], |row| {
                    Ok(OrderItemEntry {
                        item: OrderItem {
                            id: parse_col(0, row.get(0)?)?,
                            order_id: parse_col(1, row.get(1)?)?,
                            product_id: parse_col(2, row.get(2)?)?,
                            seller_id: parse_col(3, row.get(3)?)?,
                            quantity: row.get(4)?,
                            price: row.get(5)?,
                        },
                        product_name: row.get(6)?,
                        product_image_url: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE orders SET order_status = ?2 WHERE id = ?1",
                rusqlite::params![order_id.to_string(), status.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Dashboard figures: product count plus lifetime and current-month
    /// revenue, each from a single aggregated query.
    pub fn seller_stats(&self, seller_id: Uuid) -> Result<SellerStats, StoreError> {
        let month_start = Utc::now()
            .date_naive()
            .with_day(1)
            .unwrap_or_else(|| Utc::now().date_naive())
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();

        self.with_conn(|conn| {
            let product_count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM products WHERE seller_id = ?1",
                [seller_id.to_string()],
                |row| row.get(0),
            )?;

            let total_sales: i64 = conn.query_row(
                "SELECT COALESCE(SUM(oi.quantity * oi.price), 0)
                 FROM order_items oi WHERE oi.seller_id = ?1",
                [seller_id.to_string()],
                |row| row.get(0),
            )?;

            let month_sales: i64 = conn.query_row(
                "SELECT COALESCE(SUM(oi.quantity * oi.price), 0)
                 FROM order_items oi
                 JOIN orders o ON oi.order_id = o.id
                 WHERE oi.seller_id = ?1 AND o.created_at >= ?2",
                rusqlite::params![seller_id.to_string(), month_start],
                |row| row.get(0),
            )?;

            Ok(SellerStats {
                product_count,
                total_sales,
                month_sales,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_types::models::UserType;

    fn fixture() -> (Store, Uuid, Uuid) {
        let store = Store::open_in_memory("test-secret").unwrap();
        let buyer = store
            .sign_up("buyer@example.com", "password123", "Buyer", UserType::Buyer)
            .unwrap()
            .user_id;
        let seller = store
            .sign_up("seller@example.com", "password123", "Seller", UserType::Seller)
            .unwrap()
            .user_id;
        (store, buyer, seller)
    }

    #[test]
    fn place_order_writes_items_and_clears_cart() {
        let (store, buyer, seller) = fixture();
        let pot = store
            .insert_product(seller, "Clay Pot", None, "Handicrafts", 800, None)
            .unwrap();
        let saree = store
            .insert_product(seller, "Cotton Saree", None, "Textiles", 2500, None)
            .unwrap();

        store.add_cart_item(buyer, pot.id, 2).unwrap();
        store.add_cart_item(buyer, saree.id, 1).unwrap();
        let lines = store.cart_for_user(buyer).unwrap();

        let order = store
            .place_order(buyer, &lines, "12 Bazaar Road, Jaipur", "+91 9000000000", PaymentMode::Cod)
            .unwrap();

        assert_eq!(order.total_amount, 2 * 800 + 2500);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.order_status, OrderStatus::Pending);
        assert!(store.cart_for_user(buyer).unwrap().is_empty());

        let orders = store.orders_for_buyer(buyer).unwrap();
        assert_eq!(orders.len(), 1);

        let items = store.order_items(order.id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|e| e.product_name == "Clay Pot" && e.item.quantity == 2));
    }

    #[test]
    fn online_payment_is_settled_immediately() {
        let (store, buyer, seller) = fixture();
        let pot = store
            .insert_product(seller, "Clay Pot", None, "Handicrafts", 800, None)
            .unwrap();
        store.add_cart_item(buyer, pot.id, 1).unwrap();
        let lines = store.cart_for_user(buyer).unwrap();

        let order = store
            .place_order(buyer, &lines, "addr", "phone", PaymentMode::Online)
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn status_updates_and_seller_stats() {
        let (store, buyer, seller) = fixture();
        let pot = store
            .insert_product(seller, "Clay Pot", None, "Handicrafts", 800, None)
            .unwrap();
        store.add_cart_item(buyer, pot.id, 3).unwrap();
        let lines = store.cart_for_user(buyer).unwrap();
        let order = store
            .place_order(buyer, &lines, "addr", "phone", PaymentMode::Cod)
            .unwrap();

        store
            .update_order_status(order.id, OrderStatus::Shipped)
            .unwrap();
        assert_eq!(
            store.orders_for_buyer(buyer).unwrap()[0].order_status,
            OrderStatus::Shipped
        );

        let stats = store.seller_stats(seller).unwrap();
        assert_eq!(stats.product_count, 1);
        assert_eq!(stats.total_sales, 2400);
        assert_eq!(stats.month_sales, 2400);
    }
}
