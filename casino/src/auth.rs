use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use crate::error::{CasinoError, Result};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hashes a password with Argon2id and a fresh salt. Returns the PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CasinoError::Storage(format!("password hashing failed: {e}")))
}

/// Verifies a password against a PHC hash; malformed hashes never verify
pub fn verify_password(password: &str, hash: &str) -> bool {
    if hash.is_empty() {
        return false;
    }
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn validate_signup(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<()> {
    if username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(CasinoError::validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    let email = email.trim();
    if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(CasinoError::validation("A valid email address is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CasinoError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirm_password {
        return Err(CasinoError::validation("Passwords don't match"));
    }
    Ok(())
}
