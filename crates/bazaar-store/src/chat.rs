use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use bazaar_types::events::StoreEvent;
use bazaar_types::models::{Conversation, ConversationEntry, Message};

use crate::{Store, StoreError, parse_col};

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: parse_col(0, row.get(0)?)?,
        buyer_id: parse_col(1, row.get(1)?)?,
        seller_id: parse_col(2, row.get(2)?)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: parse_col(0, row.get(0)?)?,
        conversation_id: parse_col(1, row.get(1)?)?,
        sender_id: parse_col(2, row.get(2)?)?,
        content: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Store {
    /// Every conversation where the user is buyer or seller, newest first,
    /// with the counterpart's display name resolved in the same query
    /// (eliminates the per-row profile lookup).
    pub fn conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationEntry>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.buyer_id, c.seller_id, c.created_at,
                        COALESCE(p.full_name, 'User')
                 FROM conversations c
                 LEFT JOIN profiles p ON p.user_id =
                     CASE WHEN c.buyer_id = ?1 THEN c.seller_id ELSE c.buyer_id END
                 WHERE c.buyer_id = ?1 OR c.seller_id = ?1
                 ORDER BY c.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(ConversationEntry {
                        conversation: conversation_from_row(row)?,
                        counterpart_name: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Reuse the (buyer, seller) conversation if one exists, otherwise
    /// create it. Races resolve on the UNIQUE(buyer_id, seller_id)
    /// constraint: a losing insert is ignored and the winner's row is
    /// fetched back.
    pub fn find_or_create_conversation(
        &self,
        buyer_id: Uuid,
        seller_id: Uuid,
    ) -> Result<Conversation, StoreError> {
        if buyer_id == seller_id {
            return Err(StoreError::Invalid("counterpart"));
        }

        let (conversation, created) = self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO conversations (id, buyer_id, seller_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    buyer_id.to_string(),
                    seller_id.to_string(),
                    Utc::now(),
                ],
            )?;

            let conversation = conn.query_row(
                "SELECT id, buyer_id, seller_id, created_at
                 FROM conversations WHERE buyer_id = ?1 AND seller_id = ?2",
                rusqlite::params![buyer_id.to_string(), seller_id.to_string()],
                conversation_from_row,
            )?;

            Ok((conversation, inserted == 1))
        })?;

        if created {
            self.feed
                .publish(StoreEvent::ConversationCreated(conversation.clone()));
        }
        Ok(conversation)
    }

    pub fn conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, buyer_id, seller_id, created_at FROM conversations WHERE id = ?1",
                    [id.to_string()],
                    conversation_from_row,
                )
                .optional()?)
        })
    }

    /// Full history of a conversation, by creation time ascending.
    pub fn messages_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, content, read, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([conversation_id.to_string()], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a message (read = false) and publish it on the change feed.
    pub fn insert_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Message, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::Invalid("message content"));
        }

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: content.trim().to_string(),
            read: false,
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id.to_string(),
                    message.sender_id.to_string(),
                    message.content,
                    message.created_at,
                ],
            )?;
            Ok(())
        })?;

        self.feed
            .publish(StoreEvent::MessageInserted(message.clone()));
        Ok(message)
    }

    /// One conditioned bulk update flipping every unread message not sent
    /// by the reader. Returns how many rows were marked.
    pub fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, StoreError> {
        let marked = self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read = 1
                 WHERE conversation_id = ?1 AND read = 0 AND sender_id != ?2",
                rusqlite::params![conversation_id.to_string(), reader_id.to_string()],
            )?;
            Ok(changed as u64)
        })?;

        if marked > 0 {
            self.feed.publish(StoreEvent::ConversationRead {
                conversation_id,
                reader_id,
                marked,
            });
        }
        Ok(marked)
    }

    /// Flip a single live-received message to read. Idempotent: a message
    /// that is already read publishes nothing.
    pub fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<(), StoreError> {
        let conversation_id: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "UPDATE messages SET read = 1 WHERE id = ?1 AND read = 0
                     RETURNING conversation_id",
                    [message_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        if let Some(cid) = conversation_id {
            if let Ok(conversation_id) = cid.parse() {
                self.feed.publish(StoreEvent::ConversationRead {
                    conversation_id,
                    reader_id,
                    marked: 1,
                });
            }
        }
        Ok(())
    }

    /// Unread-and-not-mine count across every conversation the user takes
    /// part in, as one aggregated query (replaces the per-conversation
    /// round-trip chain).
    pub fn unread_count_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*)
                 FROM messages m
                 JOIN conversations c ON m.conversation_id = c.id
                 WHERE m.read = 0 AND m.sender_id != ?1
                   AND (c.buyer_id = ?1 OR c.seller_id = ?1)",
                [user_id.to_string()],
                |row| row.get(0),
            )?)
        })
    }
}
