//! Failed-login throttling.
//!
//! Sliding window of failed attempts per account; exceeding the budget puts
//! the account in a cooldown during which authentication is refused before
//! the store is consulted. A successful login inside the window clears the
//! tally. Stale entries are dropped on [`LoginThrottle::cleanup_stale`].

use std::collections::HashMap;

/// Default failure budget inside the window.
const DEFAULT_MAX_FAILURES: u32 = 5;

/// Default window: 5 minutes.
const DEFAULT_WINDOW_SECS: u64 = 5 * 60;

/// Default cooldown after the budget is spent: 15 minutes.
const DEFAULT_COOLDOWN_SECS: u64 = 15 * 60;

/// Stale entry cleanup threshold: 2 hours.
const STALE_CLEANUP_SECS: u64 = 2 * 60 * 60;

/// Current epoch seconds.
fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Per-account tracking state.
#[derive(Debug, Clone)]
struct AccountState {
    /// Timestamps of recent failures (within window).
    failure_timestamps: Vec<u64>,
    /// When the current cooldown expires (0 if none).
    cooldown_until: u64,
    /// Last activity timestamp (for stale cleanup).
    last_active: u64,
}

/// Sliding-window failed-login throttle, keyed by lowercase username.
pub struct LoginThrottle {
    max_failures: u32,
    window_secs: u64,
    cooldown_secs: u64,
    states: HashMap<String, AccountState>,
    enabled: bool,
}

impl LoginThrottle {
    /// Create a throttle with default settings.
    pub fn new(enabled: bool) -> Self {
        Self::with_limits(
            enabled,
            DEFAULT_MAX_FAILURES,
            DEFAULT_WINDOW_SECS,
            DEFAULT_COOLDOWN_SECS,
        )
    }

    /// Create a throttle with custom limits.
    pub fn with_limits(
        enabled: bool,
        max_failures: u32,
        window_secs: u64,
        cooldown_secs: u64,
    ) -> Self {
        Self {
            max_failures,
            window_secs,
            cooldown_secs,
            states: HashMap::new(),
            enabled,
        }
    }

    fn key(username: &str) -> String {
        username.to_ascii_lowercase()
    }

    /// Whether an authentication attempt for this account may proceed.
    pub fn check(&mut self, username: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let now = now_secs();
        let Some(state) = self.states.get_mut(&Self::key(username)) else {
            return true;
        };
        state.last_active = now;

        if now < state.cooldown_until {
            return false;
        }
        if state.cooldown_until > 0 && now >= state.cooldown_until {
            state.cooldown_until = 0;
            state.failure_timestamps.clear();
        }
        true
    }

    /// Record a failed attempt; starts the cooldown once the budget inside
    /// the window is spent.
    pub fn record_failure(&mut self, username: &str) {
        if !self.enabled {
            return;
        }
        let now = now_secs();
        let state = self
            .states
            .entry(Self::key(username))
            .or_insert(AccountState {
                failure_timestamps: Vec::new(),
                cooldown_until: 0,
                last_active: now,
            });
        state.last_active = now;

        let window_start = now.saturating_sub(self.window_secs);
        state.failure_timestamps.retain(|&ts| ts >= window_start);
        state.failure_timestamps.push(now);

        if u32::try_from(state.failure_timestamps.len()).unwrap_or(u32::MAX) >= self.max_failures {
            state.cooldown_until = now + self.cooldown_secs;
            tracing::warn!(
                account = %Self::key(username),
                cooldown_secs = self.cooldown_secs,
                "failed-login budget spent, account throttled"
            );
        }
    }

    /// Record a successful login; clears the failure tally and cooldown.
    pub fn record_success(&mut self, username: &str) {
        self.states.remove(&Self::key(username));
    }

    /// Clean up entries inactive for longer than the stale threshold.
    pub fn cleanup_stale(&mut self) {
        let cutoff = now_secs().saturating_sub(STALE_CLEANUP_SECS);
        self.states
            .retain(|_, state| state.cooldown_until > 0 || state.last_active >= cutoff);
    }

    /// Number of tracked accounts.
    pub fn tracked_accounts(&self) -> usize {
        self.states.len()
    }
}
