//! keyhold — a small, honest credential and session manager.
//!
//! One store of user records, one store of session tokens, typed errors, no
//! ambient globals. The library exposes [`CredentialManager`] over a
//! pluggable [`StoreBackend`] (in-memory or SQLite); the `keyhold` binary is
//! a thin CLI on top.
//!
//! Security posture:
//! - Secrets are hashed with Argon2id and a per-user random salt; nothing
//!   ever stores or logs a raw secret.
//! - Authentication failures are indistinguishable between "no such user"
//!   and "wrong secret", by message and by timing.
//! - Session tokens carry 256 bits of CSPRNG entropy and are stored only as
//!   SHA-256 digests, with a TTL.
//! - No backdoor credentials; administrative access is an ordinary record
//!   with a role flag.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod lockout;
pub mod manager;
pub mod policy;
pub mod store;

pub use config::Config;
pub use error::AuthError;
pub use manager::{CredentialManager, SessionToken};
pub use store::{MemoryStore, Role, SqliteStore, StoreBackend, UserHandle};
