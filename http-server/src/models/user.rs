use casino::types::{User, UserId};
use serde::{Deserialize, Serialize};

// User as exposed over the API (no password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub wallet_address: Option<String>,
    pub created_at: u64,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            wallet_address: user.wallet_address,
            created_at: user.created_at,
        }
    }
}
