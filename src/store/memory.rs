//! In-memory store: a mutex-guarded `Vec` of user rows plus a token-hash map.
//!
//! This is the corrected shape of the ambient `USERS` list / `SESSIONS` dict
//! the source material kept at module level: owned state passed by reference,
//! one lock per operation, no globals. Deletion removes *all* matching rows;
//! reset rewrites the *first* match — the scan order the `Vec` makes literal.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::AuthError;
use crate::store::{SessionRow, StoreBackend, UserRow};

#[derive(Default)]
struct State {
    users: Vec<UserRow>,
    sessions: HashMap<String, SessionRow>,
}

/// Process-local store with no persistence guarantee.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(row: &UserRow, username: &str) -> bool {
    row.username.eq_ignore_ascii_case(username)
}

impl StoreBackend for MemoryStore {
    fn insert_user(&self, row: UserRow) -> Result<(), AuthError> {
        let mut state = self.state.lock();
        if state.users.iter().any(|u| matches(u, &row.username)) {
            return Err(AuthError::DuplicateUser);
        }
        state.users.push(row);
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<Option<UserRow>, AuthError> {
        let state = self.state.lock();
        Ok(state.users.iter().find(|u| matches(u, username)).cloned())
    }

    fn update_secret_hash(&self, username: &str, secret_hash: &str) -> Result<bool, AuthError> {
        let mut state = self.state.lock();
        match state.users.iter_mut().find(|u| matches(u, username)) {
            Some(row) => {
                row.secret_hash = secret_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_user(&self, username: &str) -> Result<u64, AuthError> {
        let mut state = self.state.lock();
        let before = state.users.len();
        state.users.retain(|u| !matches(u, username));
        let removed = (before - state.users.len()) as u64;
        if removed > 0 {
            state
                .sessions
                .retain(|_, s| !s.username.eq_ignore_ascii_case(username));
        }
        Ok(removed)
    }

    fn list_users(&self) -> Result<Vec<UserRow>, AuthError> {
        Ok(self.state.lock().users.clone())
    }

    fn user_count(&self) -> Result<u64, AuthError> {
        Ok(self.state.lock().users.len() as u64)
    }

    fn insert_session(&self, row: SessionRow) -> Result<(), AuthError> {
        let mut state = self.state.lock();
        if state.sessions.contains_key(&row.token_hash) {
            // Never overwrite on collision; surface it like a constraint
            // violation would.
            return Err(AuthError::StorageUnavailable(
                "session token collision".into(),
            ));
        }
        state.sessions.insert(row.token_hash.clone(), row);
        Ok(())
    }

    fn get_session(&self, token_hash: &str) -> Result<Option<SessionRow>, AuthError> {
        Ok(self.state.lock().sessions.get(token_hash).cloned())
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool, AuthError> {
        Ok(self.state.lock().sessions.remove(token_hash).is_some())
    }

    fn delete_expired_sessions(&self, now: u64) -> Result<u64, AuthError> {
        let mut state = self.state.lock();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;

    fn user(name: &str) -> UserRow {
        UserRow {
            username: name.to_string(),
            secret_hash: "$argon2id$placeholder".to_string(),
            role: Role::User,
            created_at: 0,
        }
    }

    fn session(token_hash: &str, username: &str, expires_at: u64) -> SessionRow {
        SessionRow {
            token_hash: token_hash.to_string(),
            username: username.to_string(),
            created_at: 0,
            expires_at,
        }
    }

    #[test]
    fn duplicate_insert_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.insert_user(user("Alice")).unwrap();
        assert!(matches!(
            store.insert_user(user("alice")),
            Err(AuthError::DuplicateUser)
        ));
    }

    #[test]
    fn delete_removes_all_matches_and_their_sessions() {
        let store = MemoryStore::new();
        store.insert_user(user("alice")).unwrap();
        store.insert_session(session("h1", "alice", u64::MAX)).unwrap();
        store.insert_session(session("h2", "ALICE", u64::MAX)).unwrap();

        assert_eq!(store.delete_user("Alice").unwrap(), 1);
        assert!(store.get_session("h1").unwrap().is_none());
        assert!(store.get_session("h2").unwrap().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(store.delete_user("ghost").unwrap(), 0);
    }

    #[test]
    fn update_rewrites_first_match_only() {
        let store = MemoryStore::new();
        store.insert_user(user("bob")).unwrap();
        assert!(store.update_secret_hash("BOB", "$argon2id$new").unwrap());
        assert_eq!(
            store.get_user("bob").unwrap().unwrap().secret_hash,
            "$argon2id$new"
        );
        assert!(!store.update_secret_hash("ghost", "$argon2id$x").unwrap());
    }

    #[test]
    fn session_collision_errors_instead_of_overwriting() {
        let store = MemoryStore::new();
        store.insert_session(session("h", "alice", 10)).unwrap();
        assert!(store.insert_session(session("h", "bob", 20)).is_err());
        assert_eq!(store.get_session("h").unwrap().unwrap().username, "alice");
    }

    #[test]
    fn expired_sweep_removes_only_past_rows() {
        let store = MemoryStore::new();
        store.insert_session(session("old", "a", 100)).unwrap();
        store.insert_session(session("new", "a", 200)).unwrap();

        assert_eq!(store.delete_expired_sessions(100).unwrap(), 1);
        assert!(store.get_session("old").unwrap().is_none());
        assert!(store.get_session("new").unwrap().is_some());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let store = MemoryStore::new();
        store.insert_user(user("first")).unwrap();
        store.insert_user(user("second")).unwrap();
        let names: Vec<String> = store
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
