use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use bazaar_types::models::Profile;

use crate::{Store, StoreError, parse_col};

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: parse_col(0, row.get(0)?)?,
        full_name: row.get(1)?,
        user_type: parse_col(2, row.get(2)?)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Store {
    pub fn profile(&self, user_id: Uuid) -> Result<Profile, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, full_name, user_type, phone, address, created_at
                 FROM profiles WHERE user_id = ?1",
                [user_id.to_string()],
                profile_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
        })
    }

    /// Display-name lookup used when resolving a message counterpart.
    pub fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT full_name FROM profiles WHERE user_id = ?1",
                    [user_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn update_profile(
        &self,
        user_id: Uuid,
        full_name: &str,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET full_name = ?2, phone = ?3, address = ?4 WHERE user_id = ?1",
                rusqlite::params![user_id.to_string(), full_name, phone, address],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}
