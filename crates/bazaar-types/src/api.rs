use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims shared between the store's auth layer and the client's
/// session context. Canonical definition lives here in bazaar-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

/// A signed-in session as issued by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}
