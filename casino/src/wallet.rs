use std::collections::HashMap;
use std::sync::Mutex;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{CasinoError, Result};
use crate::types::{Currency, UserId, current_timestamp};

/// Challenges older than this are refused
pub const CHALLENGE_TTL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub message: String,
    pub issued_at: u64,
}

/// Outstanding wallet ownership challenges, one per user.
///
/// Issuing a new challenge replaces the previous one; a challenge is consumed
/// by the first connect attempt whether or not the proof verifies.
#[derive(Default)]
pub struct ChallengeBook {
    pending: Mutex<HashMap<UserId, Challenge>>,
}

impl ChallengeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, user_id: UserId) -> Challenge {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        let issued_at = current_timestamp();
        let challenge = Challenge {
            message: format!(
                "Sign this message to link your wallet to account {user_id}.\nNonce: {}\nIssued: {issued_at}",
                hex::encode(nonce)
            ),
            issued_at,
        };
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(user_id, challenge.clone());
        challenge
    }

    pub fn take(&self, user_id: UserId) -> Result<Challenge> {
        let challenge = self
            .pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&user_id)
            .ok_or_else(|| CasinoError::InvalidWalletProof("no outstanding challenge".into()))?;

        if current_timestamp().saturating_sub(challenge.issued_at) > CHALLENGE_TTL_MS {
            return Err(CasinoError::InvalidWalletProof("challenge expired".into()));
        }
        Ok(challenge)
    }
}

/// Checks that `signature` (hex, 64 bytes) is an ed25519 signature of
/// `message` by the key whose hex encoding is `address`.
pub fn verify_wallet_proof(address: &str, message: &str, signature: &str) -> Result<()> {
    let key_bytes: [u8; 32] = hex::decode(address.trim_start_matches("0x"))
        .map_err(|e| CasinoError::InvalidWalletProof(format!("address is not hex: {e}")))?
        .try_into()
        .map_err(|_| CasinoError::InvalidWalletProof("address must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| CasinoError::InvalidWalletProof(e.to_string()))?;

    let sig_bytes: [u8; 64] = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| CasinoError::InvalidWalletProof(format!("signature is not hex: {e}")))?
        .try_into()
        .map_err(|_| CasinoError::InvalidWalletProof("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message.as_bytes(), &signature)
        .map_err(|_| CasinoError::InvalidWalletProof("signature does not match".into()))
}

/// Normalised form stored against the user
pub fn normalize_address(address: &str) -> String {
    address.trim().trim_start_matches("0x").to_ascii_lowercase()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn address_prefix(currency: Currency) -> &'static str {
    match currency {
        Currency::Btc => "1",
        Currency::Eth | Currency::Usdt => "0x",
        Currency::Sol => "So1",
        Currency::Ltc => "L",
    }
}

pub fn generate_deposit_address(currency: Currency) -> String {
    format!("{}{}", address_prefix(currency), random_hex(20))
}

/// Reference attached to deposit and withdrawal transactions
pub fn generate_tx_hash() -> String {
    format!("tx-{}-{}", current_timestamp(), random_hex(8))
}
