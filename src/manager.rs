//! The credential & session manager.
//!
//! All credential logic lives here, implemented once over the
//! [`StoreBackend`] seam: registration (policy check, Argon2id hash),
//! authentication (constant-time verification, dummy-hash on the
//! missing-user path, failed-login throttling), password reset, token
//! issuance and validation, revocation, deletion, and the expiry sweep.
//!
//! Backends only ever see hashes. Tokens are returned in the clear exactly
//! once, at issuance.

use parking_lot::Mutex;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{LockoutConfig, SecurityConfig};
use crate::crypto::{self, SecretHasher};
use crate::error::AuthError;
use crate::lockout::LoginThrottle;
use crate::policy::SecretPolicy;
use crate::store::{Role, SessionRow, StoreBackend, UserHandle, UserRow};

/// Maximum username length in characters.
const MAX_USERNAME_CHARS: usize = 64;

/// Current Unix epoch in seconds.
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// An issued session. The `token` field is the only plaintext copy that will
/// ever exist; the store keeps its SHA-256.
#[derive(Clone)]
pub struct SessionToken {
    pub token: String,
    pub username: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Token value redacted so debug output stays safe to log.
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Owns the user and session stores and exposes the operation set.
pub struct CredentialManager {
    store: Box<dyn StoreBackend>,
    policy: SecretPolicy,
    hasher: SecretHasher,
    session_ttl_secs: u64,
    throttle: Mutex<LoginThrottle>,
}

impl CredentialManager {
    pub fn new(
        store: Box<dyn StoreBackend>,
        security: &SecurityConfig,
        lockout: &LockoutConfig,
    ) -> Result<Self, AuthError> {
        let hasher = SecretHasher::new(
            security.argon2_m_cost_kib,
            security.argon2_t_cost,
            security.argon2_p_cost,
        )?;
        Ok(Self {
            store,
            policy: SecretPolicy {
                min_len: security.min_secret_len,
                require_character_classes: security.require_character_classes,
            },
            hasher,
            session_ttl_secs: security.session_ttl_secs,
            throttle: Mutex::new(LoginThrottle::with_limits(
                lockout.enabled,
                lockout.max_failures,
                lockout.window_secs,
                lockout.cooldown_secs,
            )),
        })
    }

    // ── User management ─────────────────────────────────────────────

    /// Register a new user with [`Role::User`].
    pub fn register(&self, username: &str, secret: &str) -> Result<(), AuthError> {
        self.register_with_role(username, secret, Role::User)
    }

    /// Register a new user with an explicit role. The secret is hashed
    /// before any record exists; a failing policy check rejects outright.
    pub fn register_with_role(
        &self,
        username: &str,
        secret: &str,
        role: Role,
    ) -> Result<(), AuthError> {
        let username = valid_username(username)?;
        self.policy.check(secret)?;
        let secret_hash = self.hasher.hash(secret)?;
        self.store.insert_user(UserRow {
            username: username.to_string(),
            secret_hash,
            role,
            created_at: now_secs(),
        })?;
        tracing::info!(username = %username, role = role.as_str(), "user registered");
        Ok(())
    }

    /// Authenticate by username + secret.
    ///
    /// Fails with `InvalidCredentials` whether the username is missing or
    /// the secret mismatches; the missing-user path burns a dummy
    /// verification so the two are indistinguishable by timing. A throttled
    /// account fails the same way without touching the store.
    pub fn authenticate(&self, username: &str, secret: &str) -> Result<UserHandle, AuthError> {
        let username = username.trim();
        if !self.throttle.lock().check(username) {
            tracing::warn!(username = %username, "authentication throttled");
            return Err(AuthError::InvalidCredentials);
        }

        match self.store.get_user(username)? {
            Some(row) => {
                if self.hasher.verify(secret, &row.secret_hash)? {
                    self.throttle.lock().record_success(username);
                    tracing::info!(username = %row.username, "authentication succeeded");
                    Ok(UserHandle::from(&row))
                } else {
                    self.throttle.lock().record_failure(username);
                    tracing::info!(username = %username, "authentication failed");
                    Err(AuthError::InvalidCredentials)
                }
            }
            None => {
                self.hasher.burn(secret);
                self.throttle.lock().record_failure(username);
                tracing::info!(username = %username, "authentication failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Replace the stored credential of the first record matching
    /// `username`. The new secret passes the same policy as registration.
    pub fn reset_password(&self, username: &str, new_secret: &str) -> Result<(), AuthError> {
        let username = username.trim();
        self.policy.check(new_secret)?;
        let secret_hash = self.hasher.hash(new_secret)?;
        if self.store.update_secret_hash(username, &secret_hash)? {
            tracing::info!(username = %username, "password reset");
            Ok(())
        } else {
            Err(AuthError::UserNotFound)
        }
    }

    /// Remove all records matching `username`, their sessions, and any
    /// throttle state. Idempotent; returns the number of records removed.
    pub fn delete_user(&self, username: &str) -> Result<u64, AuthError> {
        let username = username.trim();
        let removed = self.store.delete_user(username)?;
        self.throttle.lock().record_success(username);
        if removed > 0 {
            tracing::info!(username = %username, removed, "user deleted");
        }
        Ok(removed)
    }

    /// Handles for every registered user, insertion order.
    pub fn list_users(&self) -> Result<Vec<UserHandle>, AuthError> {
        Ok(self
            .store
            .list_users()?
            .iter()
            .map(UserHandle::from)
            .collect())
    }

    /// Number of registered users.
    pub fn user_count(&self) -> Result<u64, AuthError> {
        self.store.user_count()
    }

    // ── Session management ──────────────────────────────────────────

    /// Issue a session token for an existing user. The returned plaintext
    /// token is revealed exactly once; only its hash is stored.
    pub fn create_session(&self, username: &str) -> Result<SessionToken, AuthError> {
        let username = username.trim();
        let Some(row) = self.store.get_user(username)? else {
            return Err(AuthError::UserNotFound);
        };

        let token = crypto::generate_token();
        let now = now_secs();
        let expires_at = now.saturating_add(self.session_ttl_secs);
        self.store.insert_session(SessionRow {
            token_hash: crypto::hash_token(&token),
            username: row.username.clone(),
            created_at: now,
            expires_at,
        })?;
        tracing::info!(username = %row.username, "session issued");

        Ok(SessionToken {
            token,
            username: row.username,
            created_at: now,
            expires_at,
        })
    }

    /// Resolve a token to its user. Pure lookup: `None` for unknown,
    /// expired, or orphaned tokens; never mutates.
    pub fn validate_session(&self, token: &str) -> Option<UserHandle> {
        let token_hash = crypto::hash_token(token);
        let session = self.store.get_session(&token_hash).ok()??;
        if session.expires_at <= now_secs() {
            return None;
        }
        let user = self.store.get_user(&session.username).ok()??;
        Some(UserHandle::from(&user))
    }

    /// Explicit logout. Idempotent; `false` if the token was not active.
    pub fn revoke_session(&self, token: &str) -> Result<bool, AuthError> {
        let revoked = self.store.delete_session(&crypto::hash_token(token))?;
        if revoked {
            tracing::info!("session revoked");
        }
        Ok(revoked)
    }

    /// Sweep expired sessions and stale throttle entries. Returns the
    /// number of sessions removed.
    pub fn cleanup_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self.store.delete_expired_sessions(now_secs())?;
        self.throttle.lock().cleanup_stale();
        if removed > 0 {
            tracing::info!(removed, "expired sessions swept");
        }
        Ok(removed)
    }
}

fn valid_username(raw: &str) -> Result<&str, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidUsername {
            reason: "must not be empty".into(),
        });
    }
    if trimmed.chars().count() > MAX_USERNAME_CHARS {
        return Err(AuthError::InvalidUsername {
            reason: format!("at most {MAX_USERNAME_CHARS} characters"),
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};
    use std::collections::HashSet;

    /// Minimal hashing costs and a tight throttle keep the suite fast.
    fn test_security() -> SecurityConfig {
        SecurityConfig {
            argon2_m_cost_kib: 64,
            argon2_t_cost: 1,
            argon2_p_cost: 1,
            ..SecurityConfig::default()
        }
    }

    fn test_manager() -> CredentialManager {
        CredentialManager::new(
            Box::new(MemoryStore::new()),
            &test_security(),
            &LockoutConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn round_trip_register_then_authenticate() {
        let manager = test_manager();
        manager.register("alice", "Sup3rSecret!").unwrap();

        let handle = manager.authenticate("alice", "Sup3rSecret!").unwrap();
        assert_eq!(handle.username, "alice");
        assert_eq!(handle.role, Role::User);

        assert!(matches!(
            manager.authenticate("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn unknown_user_fails_like_wrong_secret() {
        let manager = test_manager();
        let err = manager.authenticate("nobody", "whatever1").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let manager = test_manager();
        manager.register("alice", "Sup3rSecret!").unwrap();
        assert!(matches!(
            manager.register("ALICE", "OtherSecret9!"),
            Err(AuthError::DuplicateUser)
        ));
    }

    #[test]
    fn weak_secret_boundary() {
        let manager = test_manager();
        // Default minimum is 8: seven characters fail, eight pass.
        assert!(matches!(
            manager.register("bob", "seven77"),
            Err(AuthError::WeakSecret { .. })
        ));
        manager.register("bob", "eight888").unwrap();
    }

    #[test]
    fn empty_and_oversized_usernames_rejected() {
        let manager = test_manager();
        assert!(matches!(
            manager.register("   ", "GoodSecret1!"),
            Err(AuthError::InvalidUsername { .. })
        ));
        let long = "x".repeat(65);
        assert!(matches!(
            manager.register(&long, "GoodSecret1!"),
            Err(AuthError::InvalidUsername { .. })
        ));
    }

    #[test]
    fn reset_invalidates_old_secret_and_accepts_new() {
        let manager = test_manager();
        manager.register("carol", "OldSecret1!").unwrap();
        manager.reset_password("carol", "NewSecret2!").unwrap();

        assert!(manager.authenticate("carol", "OldSecret1!").is_err());
        manager.authenticate("carol", "NewSecret2!").unwrap();
    }

    #[test]
    fn reset_unknown_user_is_user_not_found() {
        let manager = test_manager();
        assert!(matches!(
            manager.reset_password("ghost", "NewSecret2!"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn reset_enforces_the_same_policy() {
        let manager = test_manager();
        manager.register("carol", "OldSecret1!").unwrap();
        assert!(matches!(
            manager.reset_password("carol", "tiny"),
            Err(AuthError::WeakSecret { .. })
        ));
    }

    #[test]
    fn delete_then_authenticate_fails_for_any_secret() {
        let manager = test_manager();
        manager.register("dave", "Sup3rSecret!").unwrap();
        assert_eq!(manager.delete_user("dave").unwrap(), 1);

        assert!(manager.authenticate("dave", "Sup3rSecret!").is_err());
        assert!(manager.authenticate("dave", "anything").is_err());
        // Idempotent.
        assert_eq!(manager.delete_user("dave").unwrap(), 0);
    }

    #[test]
    fn session_round_trip_and_revocation() {
        let manager = test_manager();
        manager.register("erin", "Sup3rSecret!").unwrap();

        let session = manager.create_session("erin").unwrap();
        let handle = manager.validate_session(&session.token).unwrap();
        assert_eq!(handle.username, "erin");

        assert!(manager.revoke_session(&session.token).unwrap());
        assert!(manager.validate_session(&session.token).is_none());
        assert!(!manager.revoke_session(&session.token).unwrap());
    }

    #[test]
    fn session_for_unknown_user_is_user_not_found() {
        let manager = test_manager();
        assert!(matches!(
            manager.create_session("ghost"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn deleting_a_user_kills_their_sessions() {
        let manager = test_manager();
        manager.register("frank", "Sup3rSecret!").unwrap();
        let session = manager.create_session("frank").unwrap();

        manager.delete_user("frank").unwrap();
        assert!(manager.validate_session(&session.token).is_none());
    }

    #[test]
    fn zero_ttl_sessions_expire_immediately() {
        let security = SecurityConfig {
            session_ttl_secs: 0,
            ..test_security()
        };
        let manager = CredentialManager::new(
            Box::new(MemoryStore::new()),
            &security,
            &LockoutConfig::default(),
        )
        .unwrap();
        manager.register("gail", "Sup3rSecret!").unwrap();

        let session = manager.create_session("gail").unwrap();
        assert!(manager.validate_session(&session.token).is_none());
        assert_eq!(manager.cleanup_expired_sessions().unwrap(), 1);
    }

    #[test]
    fn ten_thousand_sessions_all_distinct() {
        let manager = test_manager();
        manager.register("heidi", "Sup3rSecret!").unwrap();

        let tokens: HashSet<String> = (0..10_000)
            .map(|_| manager.create_session("heidi").unwrap().token)
            .collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn multiple_concurrent_sessions_per_user_allowed() {
        let manager = test_manager();
        manager.register("ivan", "Sup3rSecret!").unwrap();

        let s1 = manager.create_session("ivan").unwrap();
        let s2 = manager.create_session("ivan").unwrap();
        assert!(manager.validate_session(&s1.token).is_some());
        assert!(manager.validate_session(&s2.token).is_some());
    }

    #[test]
    fn throttle_blocks_after_budget_even_with_correct_secret() {
        let lockout = LockoutConfig {
            max_failures: 3,
            ..LockoutConfig::default()
        };
        let manager = CredentialManager::new(
            Box::new(MemoryStore::new()),
            &test_security(),
            &lockout,
        )
        .unwrap();
        manager.register("judy", "Sup3rSecret!").unwrap();

        for _ in 0..3 {
            let _ = manager.authenticate("judy", "wrong-guess");
        }
        // Correct secret, but the account is cooling down.
        assert!(matches!(
            manager.authenticate("judy", "Sup3rSecret!"),
            Err(AuthError::InvalidCredentials)
        ));
        // Other accounts are unaffected.
        manager.register("kent", "Sup3rSecret!").unwrap();
        manager.authenticate("kent", "Sup3rSecret!").unwrap();
    }

    #[test]
    fn admin_role_flows_through_to_handles() {
        let manager = test_manager();
        manager
            .register_with_role("root-admin", "Sup3rSecret!", Role::Admin)
            .unwrap();

        let handle = manager.authenticate("root-admin", "Sup3rSecret!").unwrap();
        assert_eq!(handle.role, Role::Admin);

        let session = manager.create_session("root-admin").unwrap();
        let via_session = manager.validate_session(&session.token).unwrap();
        assert_eq!(via_session.role, Role::Admin);
    }

    #[test]
    fn list_users_returns_handles_without_hashes() {
        let manager = test_manager();
        manager.register("alice", "Sup3rSecret!").unwrap();
        manager.register("bob", "Sup3rSecret!").unwrap();

        let users = manager.list_users().unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(manager.user_count().unwrap(), 2);
    }

    #[test]
    fn session_token_debug_never_prints_the_token() {
        let manager = test_manager();
        manager.register("mallory", "Sup3rSecret!").unwrap();
        let session = manager.create_session("mallory").unwrap();

        let rendered = format!("{session:?}");
        assert!(!rendered.contains(&session.token));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn works_the_same_over_the_sqlite_backend() {
        let manager = CredentialManager::new(
            Box::new(SqliteStore::open_in_memory().unwrap()),
            &test_security(),
            &LockoutConfig::default(),
        )
        .unwrap();

        manager.register("alice", "Sup3rSecret!").unwrap();
        manager.authenticate("alice", "Sup3rSecret!").unwrap();
        assert!(manager.authenticate("alice", "wrong").is_err());

        let session = manager.create_session("alice").unwrap();
        assert!(manager.validate_session(&session.token).is_some());

        manager.reset_password("alice", "Fresh3rSecret!").unwrap();
        assert!(manager.authenticate("alice", "Sup3rSecret!").is_err());
        manager.authenticate("alice", "Fresh3rSecret!").unwrap();

        assert_eq!(manager.delete_user("alice").unwrap(), 1);
        assert!(manager.validate_session(&session.token).is_none());
    }
}
