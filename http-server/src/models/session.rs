use casino::types::UserId;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Session {
    user_id: UserId,
    expires_at: Instant,
}

// Bearer sessions, keyed by the SHA-256 of the token so raw tokens are never held
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    // Issue a fresh random token for a user, dropping any expired sessions
    pub fn create(&self, user_id: UserId) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!(expired, "Dropped expired sessions");
        }
        sessions.insert(
            Self::hash_token(&token),
            Session {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub fn user_id(&self, token: &str) -> Option<UserId> {
        let key = Self::hash_token(token);
        let mut sessions = self.lock();
        let session = sessions.get(&key)?;
        if session.expires_at <= Instant::now() {
            sessions.remove(&key);
            return None;
        }
        Some(session.user_id)
    }

    // Returns false if the token was unknown
    pub fn revoke(&self, token: &str) -> bool {
        self.lock().remove(&Self::hash_token(token)).is_some()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }
}
