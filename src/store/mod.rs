//! Storage seam for user records and session rows.
//!
//! Backends hold dumb rows and never see raw secrets: the `password` field of
//! a [`UserRow`] is always a PHC hash and sessions are keyed by the SHA-256
//! of their token. All credential logic lives in
//! [`crate::manager::CredentialManager`]; the seam exists so the in-memory
//! store (the fixed rendition of the source material's module-level `USERS`
//! list) and the SQLite store are interchangeable.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Role flag on a user record. The administrative concept is an ordinary
/// record with this flag set; no credential is ever special-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

/// A stored user record. `secret_hash` is a PHC string, never the secret.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub secret_hash: String,
    pub role: Role,
    pub created_at: u64,
}

/// A stored session. Keyed by `token_hash`; the plaintext token never
/// reaches a backend.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub token_hash: String,
    pub username: String,
    pub created_at: u64,
    pub expires_at: u64,
}

/// An authenticated reference to a user record. What callers get back from
/// `authenticate`/`validate_session`; carries no secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHandle {
    pub username: String,
    pub role: Role,
    pub created_at: u64,
}

impl From<&UserRow> for UserHandle {
    fn from(row: &UserRow) -> Self {
        Self {
            username: row.username.clone(),
            role: row.role,
            created_at: row.created_at,
        }
    }
}

/// Row-level storage operations shared by both backends.
///
/// Username matching is ASCII case-insensitive everywhere, matching the
/// SQLite store's `COLLATE NOCASE` column.
pub trait StoreBackend: Send + Sync {
    /// Insert a new user. `DuplicateUser` if the username is taken.
    fn insert_user(&self, row: UserRow) -> Result<(), AuthError>;

    /// Fetch the first record matching `username`.
    fn get_user(&self, username: &str) -> Result<Option<UserRow>, AuthError>;

    /// Replace the secret hash of the first record matching `username`.
    /// Returns `false` if no record matched.
    fn update_secret_hash(&self, username: &str, secret_hash: &str) -> Result<bool, AuthError>;

    /// Remove all records matching `username` and all their sessions.
    /// Returns the number of user records removed; zero is not an error.
    fn delete_user(&self, username: &str) -> Result<u64, AuthError>;

    /// All user records, in insertion order.
    fn list_users(&self) -> Result<Vec<UserRow>, AuthError>;

    /// Number of user records.
    fn user_count(&self) -> Result<u64, AuthError>;

    /// Insert a session row. A token-hash collision is a constraint error,
    /// never an overwrite.
    fn insert_session(&self, row: SessionRow) -> Result<(), AuthError>;

    /// Fetch a session by token hash, expired or not.
    fn get_session(&self, token_hash: &str) -> Result<Option<SessionRow>, AuthError>;

    /// Remove one session. Returns `false` if it was not present.
    fn delete_session(&self, token_hash: &str) -> Result<bool, AuthError>;

    /// Remove all sessions whose `expires_at` is at or before `now`.
    /// Returns the number removed.
    fn delete_expired_sessions(&self, now: u64) -> Result<u64, AuthError>;
}
