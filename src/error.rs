//! Typed error taxonomy for the credential & session manager.
//!
//! Every operation returns one of these variants; nothing storage- or
//! crypto-flavored leaks past the manager boundary, and no variant ever
//! carries secret material in its message.

use thiserror::Error;

/// Errors returned by [`crate::manager::CredentialManager`] operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username not found or secret mismatch. Callers must not be able to
    /// tell which; the CLI prints one generic message for this variant.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The named user does not exist (reset/delete paths only, where the
    /// caller already asserted the identity).
    #[error("user not found")]
    UserNotFound,

    /// A record with this username (case-insensitive) already exists.
    #[error("username already taken")]
    DuplicateUser,

    /// The secret failed the configured strength policy.
    #[error("secret rejected: {reason}")]
    WeakSecret { reason: String },

    /// The username is empty or too long to store.
    #[error("username rejected: {reason}")]
    InvalidUsername { reason: String },

    /// The backing store could not complete the operation. All low-level
    /// storage errors are folded into this at the store boundary.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The password-hash layer failed. Unreachable with valid cost
    /// parameters; propagated instead of panicking.
    #[error("credential hashing failed: {0}")]
    Hashing(String),
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::StorageUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_never_name_the_missing_half() {
        // One message for both failure causes, per the enumeration-resistance
        // requirement.
        let msg = AuthError::InvalidCredentials.to_string();
        assert_eq!(msg, "invalid username or password");
    }

    #[test]
    fn sqlite_errors_fold_into_storage_unavailable() {
        let err: AuthError = rusqlite::Error::SqliteSingleThreadedMode.into();
        assert!(matches!(err, AuthError::StorageUnavailable(_)));
    }
}
