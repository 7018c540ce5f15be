//! Cryptographic helpers: password hashing, token generation, token hashing.
//!
//! ## Design
//! - Secrets are hashed with Argon2id (memory-hard) and a per-user random
//!   salt, stored as PHC strings. Verification is constant-time inside the
//!   `password-hash` verifier.
//! - Session tokens are 32 bytes from the OS CSPRNG, hex-encoded (256 bits of
//!   entropy — collisions are negligible by construction). Only the SHA-256
//!   of a token is ever stored; the plaintext is revealed once at issuance.
//! - A fixed dummy digest is verified against when a username does not
//!   exist, so the missing-user and wrong-secret failure paths cost the same.

use argon2::password_hash::{
    rand_core::OsRng as SaltRng, Error as PhcError, PasswordHash, PasswordHasher,
    PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// Subject for the dummy verification on the missing-user path. Not a
/// credential; its digest is computed once at construction.
const DUMMY_SECRET: &str = "keyhold.dummy.verification.subject";

/// Argon2id hasher with a precomputed dummy digest for timing equalization.
pub struct SecretHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl SecretHasher {
    /// Build a hasher with explicit Argon2 cost parameters.
    ///
    /// `m_cost_kib` is the memory cost in KiB. Fails only on parameter
    /// combinations Argon2 itself rejects.
    pub fn new(m_cost_kib: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost_kib, t_cost, p_cost, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut SaltRng);
        let dummy_hash = argon2
            .hash_password(DUMMY_SECRET.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    /// Hasher with the Argon2 crate's recommended default costs.
    pub fn with_default_params() -> Result<Self, AuthError> {
        let defaults = Params::default();
        Self::new(defaults.m_cost(), defaults.t_cost(), defaults.p_cost())
    }

    /// Hash a secret with a fresh random salt. Returns a PHC string.
    pub fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut SaltRng);
        Ok(self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string())
    }

    /// Verify a secret against a stored PHC string.
    ///
    /// `Ok(false)` on mismatch; `Err` only if the stored string is not a
    /// parseable PHC hash (corrupted storage).
    pub fn verify(&self, secret: &str, phc: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(phc).map_err(|e| AuthError::Hashing(e.to_string()))?;
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(PhcError::Password) => Ok(false),
            Err(e) => Err(AuthError::Hashing(e.to_string())),
        }
    }

    /// Burn one verification against the dummy digest. Called on the
    /// missing-user path so it costs the same as a real mismatch.
    pub fn burn(&self, secret: &str) {
        let _ = self.verify(secret, &self.dummy_hash);
    }
}

/// Generate a random session token (hex-encoded, 256 bits).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a session token for storage (SHA-256, single pass — tokens are
/// already high-entropy).
pub fn hash_token(token: &str) -> String {
    let mut h = Sha256::new();
    h.update(token.as_bytes());
    hex::encode(h.finalize())
}
