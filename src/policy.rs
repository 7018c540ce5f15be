//! Secret strength policy.
//!
//! A failing secret is rejected with [`AuthError::WeakSecret`], never
//! warn-and-continue. The optional character-class rules mirror the usual
//! "one lower, one upper, one digit, one special" corporate baseline.

use crate::error::AuthError;

/// Special characters counted for the character-class rule.
const SPECIAL_CHARS: &str = "@$!%*?&";

/// Configurable secret strength rules.
#[derive(Debug, Clone)]
pub struct SecretPolicy {
    /// Minimum secret length in characters.
    pub min_len: usize,
    /// Require at least one lowercase, one uppercase, one digit and one
    /// special character from [`SPECIAL_CHARS`].
    pub require_character_classes: bool,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self {
            min_len: 8,
            require_character_classes: false,
        }
    }
}

impl SecretPolicy {
    /// Check a candidate secret, returning `WeakSecret` with the first rule
    /// it fails. The reason names the rule, never the secret.
    pub fn check(&self, secret: &str) -> Result<(), AuthError> {
        if secret.chars().count() < self.min_len {
            return Err(AuthError::WeakSecret {
                reason: format!("must be at least {} characters", self.min_len),
            });
        }

        if self.require_character_classes {
            if !secret.chars().any(|c| c.is_ascii_lowercase()) {
                return Err(AuthError::WeakSecret {
                    reason: "must contain a lowercase letter".into(),
                });
            }
            if !secret.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(AuthError::WeakSecret {
                    reason: "must contain an uppercase letter".into(),
                });
            }
            if !secret.chars().any(|c| c.is_ascii_digit()) {
                return Err(AuthError::WeakSecret {
                    reason: "must contain a digit".into(),
                });
            }
            if !secret.chars().any(|c| SPECIAL_CHARS.contains(c)) {
                return Err(AuthError::WeakSecret {
                    reason: format!("must contain one of {SPECIAL_CHARS}"),
                });
            }
        }

        Ok(())
    }
}
