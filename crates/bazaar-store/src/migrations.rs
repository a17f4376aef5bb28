use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id     TEXT PRIMARY KEY REFERENCES users(id),
            full_name   TEXT NOT NULL,
            user_type   TEXT NOT NULL,
            phone       TEXT,
            address     TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id          TEXT PRIMARY KEY,
            seller_id   TEXT NOT NULL REFERENCES users(id),
            name        TEXT NOT NULL,
            description TEXT,
            category    TEXT NOT NULL,
            price       INTEGER NOT NULL,
            image_url   TEXT,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_products_seller
            ON products(seller_id);

        CREATE TABLE IF NOT EXISTS cart_items (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            product_id  TEXT NOT NULL REFERENCES products(id),
            quantity    INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, product_id)
        );

        CREATE TABLE IF NOT EXISTS orders (
            id               TEXT PRIMARY KEY,
            buyer_id         TEXT NOT NULL REFERENCES users(id),
            total_amount     INTEGER NOT NULL,
            shipping_address TEXT NOT NULL,
            phone            TEXT NOT NULL,
            payment_mode     TEXT NOT NULL,
            payment_status   TEXT NOT NULL,
            order_status     TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_items (
            id          TEXT PRIMARY KEY,
            order_id    TEXT NOT NULL REFERENCES orders(id),
            product_id  TEXT NOT NULL REFERENCES products(id),
            seller_id   TEXT NOT NULL REFERENCES users(id),
            quantity    INTEGER NOT NULL,
            price       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_order_items_order
            ON order_items(order_id);
        CREATE INDEX IF NOT EXISTS idx_order_items_seller
            ON order_items(seller_id);

        -- One conversation per (buyer, seller) pair; concurrent
        -- find-or-create resolves on this constraint, not on a
        -- client-side check.
        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            buyer_id    TEXT NOT NULL REFERENCES users(id),
            seller_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            UNIQUE(buyer_id, seller_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            read            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(conversation_id, read);
        ",
    )?;

    info!("Store migrations complete");
    Ok(())
}
