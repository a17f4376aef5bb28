//! Embedded implementation of the hosted platform contract: row CRUD over
//! SQLite, a typed change feed, credential auth, and object storage for
//! product media. The rest of the workspace treats this crate as the
//! opaque backend and talks to it only through its public API.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod feed;
pub mod migrations;
pub mod objects;
pub mod orders;
pub mod profiles;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

use crate::feed::ChangeFeed;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("invalid {0}")]
    Invalid(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hash error: {0}")]
    PasswordHash(String),

    #[error("{0}")]
    Internal(String),
}

pub struct Store {
    conn: Mutex<Connection>,
    feed: ChangeFeed,
    jwt_secret: String,
}

impl Store {
    pub fn open(path: &Path, jwt_secret: impl Into<String>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            feed: ChangeFeed::new(),
            jwt_secret: jwt_secret.into(),
        })
    }

    /// In-memory store, used as a fixture by tests.
    pub fn open_in_memory(jwt_secret: impl Into<String>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            feed: ChangeFeed::new(),
            jwt_secret: jwt_secret.into(),
        })
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("db lock poisoned: {e}")))?;
        f(&conn)
    }

    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("db lock poisoned: {e}")))?;
        f(&mut conn)
    }
}

/// Parse a TEXT column into any `FromStr` type, mapping failures onto the
/// rusqlite conversion error so they surface through the usual path.
pub(crate) fn parse_col<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unparseable column value: {value}").into(),
        )
    })
}
