//! TOML configuration.
//!
//! Every field has a serde default so a partial (or absent) file works; the
//! default path lives under the platform config dir, with `--config` as the
//! override. Nothing in here is secret material.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Secret policy, hashing costs and session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Minimum secret length in characters.
    pub min_secret_len: usize,
    /// Require lower/upper/digit/special character classes.
    pub require_character_classes: bool,
    /// Session lifetime in seconds. Default: 30 days.
    pub session_ttl_secs: u64,
    /// Argon2id memory cost in KiB.
    pub argon2_m_cost_kib: u32,
    /// Argon2id iteration count.
    pub argon2_t_cost: u32,
    /// Argon2id parallelism.
    pub argon2_p_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_secret_len: 8,
            require_character_classes: false,
            session_ttl_secs: 30 * 24 * 3600,
            // Argon2 crate defaults (OWASP-aligned).
            argon2_m_cost_kib: 19_456,
            argon2_t_cost: 2,
            argon2_p_cost: 1,
        }
    }
}

/// Failed-login throttle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    pub enabled: bool,
    /// Failures tolerated inside the window before the cooldown starts.
    pub max_failures: u32,
    pub window_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failures: 5,
            window_secs: 5 * 60,
            cooldown_secs: 15 * 60,
        }
    }
}

/// Which store backs the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local, no persistence guarantee.
    Memory,
    /// SQLite file under the data dir (or `db_path`).
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Explicit database path; defaults to the platform data dir.
    pub db_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            db_path: None,
        }
    }
}

/// First-run seeding. The admin is an ordinary record with `Role::Admin`;
/// its one-time secret is generated, printed once, and never stored or
/// logged in the clear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Register this admin-role user when the store is empty.
    pub admin_username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub security: SecurityConfig,
    pub lockout: LockoutConfig,
    pub storage: StorageConfig,
    pub seed: SeedConfig,
}

impl Config {
    /// Load from `path`, or from the default location, or fall back to
    /// defaults when no file exists. A file that exists but does not parse
    /// is an error, not a silent fallback.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        match resolved {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)
                    .with_context(|| format!("failed to read config: {}", p.display()))?;
                let config: Config = toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config: {}", p.display()))?;
                Ok(config)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Platform config file location (`keyhold.toml`).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "keyhold").map(|dirs| dirs.config_dir().join("keyhold.toml"))
    }

    /// Resolve the SQLite database path, creating parent dirs as needed.
    pub fn database_path(&self) -> Result<PathBuf> {
        let path = match &self.storage.db_path {
            Some(p) => p.clone(),
            None => ProjectDirs::from("", "", "keyhold")
                .context("could not determine a data directory; set storage.db_path")?
                .data_dir()
                .join("keyhold.db"),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data dir: {}", parent.display()))?;
        }
        Ok(path)
    }
}
