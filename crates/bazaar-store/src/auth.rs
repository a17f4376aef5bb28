use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use bazaar_types::api::{Claims, Session};
use bazaar_types::models::UserType;

use crate::{Store, StoreError};

/// Sessions are valid for 30 days.
const TOKEN_TTL_DAYS: i64 = 30;

impl Store {
    /// Create a user plus its profile row and issue a session.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        user_type: UserType,
    ) -> Result<Session, StoreError> {
        let email = email.trim().to_ascii_lowercase();
        if !email.contains('@') || email.len() < 5 {
            return Err(StoreError::Invalid("email"));
        }
        if password.len() < 8 {
            return Err(StoreError::Invalid("password"));
        }
        if full_name.trim().is_empty() {
            return Err(StoreError::Invalid("full name"));
        }

        // Hash with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?
            .to_string();

        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let full_name = full_name.trim().to_string();

        self.with_conn_mut(|conn| {
            let taken: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                    [&email],
                    |row| row.get(0),
                )?;
            if taken {
                return Err(StoreError::Conflict("email already registered"));
            }

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id.to_string(), email, password_hash, now],
            )?;
            tx.execute(
                "INSERT INTO profiles (user_id, full_name, user_type, phone, address, created_at)
                 VALUES (?1, ?2, ?3, NULL, NULL, ?4)",
                rusqlite::params![user_id.to_string(), full_name, user_type.as_str(), now],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        let token = self.create_token(user_id, &email)?;
        Ok(Session {
            user_id,
            email,
            token,
        })
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let email = email.trim().to_ascii_lowercase();

        let row = self.with_conn(|conn| {
            use rusqlite::OptionalExtension;
            conn.query_row(
                "SELECT id, password FROM users WHERE email = ?1",
                [&email],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(StoreError::from)
        })?;

        let (id, stored_hash) = row.ok_or(StoreError::InvalidCredentials)?;

        let parsed_hash = PasswordHash::new(&stored_hash)
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| StoreError::InvalidCredentials)?;

        let user_id: Uuid = id
            .parse()
            .map_err(|_| StoreError::Internal(format!("corrupt user id: {id}")))?;

        let token = self.create_token(user_id, &email)?;
        Ok(Session {
            user_id,
            email,
            token,
        })
    }

    /// Current-session accessor: validate a token and return its claims.
    pub fn session_from_token(&self, token: &str) -> Result<Claims, StoreError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    fn create_token(&self, user_id: Uuid, email: &str) -> Result<String, StoreError> {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: (Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory("test-secret").unwrap()
    }

    #[test]
    fn sign_up_then_sign_in() {
        let store = store();
        let session = store
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .unwrap();

        let again = store.sign_in("asha@example.com", "password123").unwrap();
        assert_eq!(again.user_id, session.user_id);

        let claims = store.session_from_token(&again.token).unwrap();
        assert_eq!(claims.sub, session.user_id);
        assert_eq!(claims.email, "asha@example.com");
    }

    #[test]
    fn duplicate_email_conflicts() {
        let store = store();
        store
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .unwrap();

        let err = store
            .sign_up("asha@example.com", "password456", "Other Asha", UserType::Seller)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn wrong_password_rejected() {
        let store = store();
        store
            .sign_up("asha@example.com", "password123", "Asha Devi", UserType::Buyer)
            .unwrap();

        let err = store.sign_in("asha@example.com", "wrong-password").unwrap_err();
        assert!(matches!(err, StoreError::InvalidCredentials));

        let err = store.sign_in("nobody@example.com", "password123").unwrap_err();
        assert!(matches!(err, StoreError::InvalidCredentials));
    }

    #[test]
    fn weak_input_rejected_before_any_write() {
        let store = store();
        assert!(matches!(
            store.sign_up("not-an-email", "password123", "A", UserType::Buyer),
            Err(StoreError::Invalid("email"))
        ));
        assert!(matches!(
            store.sign_up("a@example.com", "short", "A", UserType::Buyer),
            Err(StoreError::Invalid("password"))
        ));
    }
}
