//! CLI surface: clap subcommands plus an interactive menu.
//!
//! Secrets are always prompted (`dialoguer::Password`), never taken from
//! argv, and never echoed or logged. Authentication failures print one
//! generic message regardless of cause. The menu is an iterative loop with a
//! dispatch per entry; the recursive menus of the programs this replaces are
//! one of the defects it corrects.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password, Select};
use std::path::PathBuf;

use crate::config::{BackendKind, Config};
use crate::crypto;
use crate::error::AuthError;
use crate::manager::CredentialManager;
use crate::store::{MemoryStore, Role, SqliteStore, StoreBackend};

#[derive(Parser)]
#[command(
    name = "keyhold",
    version,
    about = "A small, honest credential and session manager."
)]
pub struct Cli {
    /// Config file override.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use the in-memory store (no persistence) regardless of config.
    #[arg(long, global = true)]
    pub memory: bool,

    /// SQLite database path override (implies the sqlite backend).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a new user (secret prompted).
    Register { username: String },
    /// Authenticate and print a fresh session token.
    Login { username: String },
    /// Revoke a session token.
    Logout { token: String },
    /// Resolve a session token to its user.
    Whoami { token: String },
    /// Reset a user's secret (prompted).
    Reset { username: String },
    /// Delete all records for a username. Idempotent.
    Delete { username: String },
    /// List registered users.
    List,
    /// Sweep expired sessions.
    Cleanup,
    /// Interactive menu (the default).
    Menu,
}

/// Build the configured store, wire up the manager, seed if asked, dispatch.
pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.storage.db_path = Some(db);
        config.storage.backend = BackendKind::Sqlite;
    }
    if cli.memory {
        config.storage.backend = BackendKind::Memory;
    }

    let store: Box<dyn StoreBackend> = match config.storage.backend {
        BackendKind::Memory => Box::new(MemoryStore::new()),
        BackendKind::Sqlite => Box::new(SqliteStore::open(&config.database_path()?)?),
    };
    let manager = CredentialManager::new(store, &config.security, &config.lockout)?;
    seed_admin(&manager, &config)?;

    match cli.command.unwrap_or(Command::Menu) {
        Command::Register { username } => cmd_register(&manager, &username),
        Command::Login { username } => {
            if !cmd_login(&manager, &username)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Logout { token } => cmd_logout(&manager, &token),
        Command::Whoami { token } => cmd_whoami(&manager, &token),
        Command::Reset { username } => cmd_reset(&manager, &username),
        Command::Delete { username } => cmd_delete(&manager, &username),
        Command::List => cmd_list(&manager),
        Command::Cleanup => cmd_cleanup(&manager),
        Command::Menu => menu_loop(&manager),
    }
}

/// First-run seeding: one admin-role record with a generated one-time
/// secret, printed exactly once. No hardcoded credentials anywhere.
fn seed_admin(manager: &CredentialManager, config: &Config) -> Result<()> {
    let Some(username) = config.seed.admin_username.as_deref() else {
        return Ok(());
    };
    if manager.user_count()? > 0 {
        return Ok(());
    }
    let secret = generate_seed_secret();
    manager.register_with_role(username, &secret, Role::Admin)?;
    println!("Seeded admin '{username}'.");
    println!("One-time secret (shown once, reset after first login): {secret}");
    Ok(())
}

/// Upper, lower, digit and special characters guaranteed so the seed passes
/// any configured policy.
fn generate_seed_secret() -> String {
    format!("Kh9!{}", &crypto::generate_token()[..20])
}

fn prompt_secret(prompt: &str) -> Result<String> {
    Ok(Password::new().with_prompt(prompt).interact()?)
}

fn prompt_new_secret(prompt: &str) -> Result<String> {
    Ok(Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm secret", "Secrets do not match")
        .interact()?)
}

fn cmd_register(manager: &CredentialManager, username: &str) -> Result<()> {
    let secret = prompt_new_secret(&format!("Secret for '{username}'"))?;
    manager.register(username, &secret)?;
    println!("User '{username}' registered.");
    Ok(())
}

/// Returns `Ok(false)` on an authentication failure so one-shot mode can
/// exit nonzero while the menu keeps running.
fn cmd_login(manager: &CredentialManager, username: &str) -> Result<bool> {
    let secret = prompt_secret(&format!("Secret for '{username}'"))?;
    match manager.authenticate(username, &secret) {
        Ok(handle) => {
            let session = manager.create_session(&handle.username)?;
            println!("Login successful ({}).", handle.role.as_str());
            println!("Session token (shown once): {}", session.token);
            Ok(true)
        }
        Err(AuthError::InvalidCredentials) => {
            // One generic message; never reveal whether the username exists.
            println!("Login failed.");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_logout(manager: &CredentialManager, token: &str) -> Result<()> {
    if manager.revoke_session(token)? {
        println!("Session revoked.");
    } else {
        println!("No active session for that token.");
    }
    Ok(())
}

fn cmd_whoami(manager: &CredentialManager, token: &str) -> Result<()> {
    match manager.validate_session(token) {
        Some(handle) => println!("{} ({})", handle.username, handle.role.as_str()),
        None => println!("Invalid or expired session."),
    }
    Ok(())
}

fn cmd_reset(manager: &CredentialManager, username: &str) -> Result<()> {
    let secret = prompt_new_secret(&format!("New secret for '{username}'"))?;
    manager.reset_password(username, &secret)?;
    println!("Password reset for '{username}'.");
    Ok(())
}

fn cmd_delete(manager: &CredentialManager, username: &str) -> Result<()> {
    let removed = manager.delete_user(username)?;
    println!("Removed {removed} record(s) for '{username}'.");
    Ok(())
}

fn cmd_list(manager: &CredentialManager) -> Result<()> {
    let users = manager.list_users()?;
    if users.is_empty() {
        println!("No users registered.");
        return Ok(());
    }
    for user in users {
        println!("{} ({})", user.username, user.role.as_str());
    }
    Ok(())
}

fn cmd_cleanup(manager: &CredentialManager) -> Result<()> {
    let removed = manager.cleanup_expired_sessions()?;
    println!("Swept {removed} expired session(s).");
    Ok(())
}

/// Iterative menu: while-loop + dispatch. Operation errors are printed and
/// the loop continues; only prompt/terminal failures abort.
fn menu_loop(manager: &CredentialManager) -> Result<()> {
    const ITEMS: &[&str] = &[
        "Register",
        "Login",
        "Reset password",
        "Delete user",
        "List users",
        "Sweep expired sessions",
        "Exit",
    ];

    loop {
        let choice = Select::new()
            .with_prompt("keyhold")
            .items(ITEMS)
            .default(0)
            .interact()?;

        let outcome = match choice {
            0 => prompt_username().and_then(|u| cmd_register(manager, &u)),
            1 => prompt_username().and_then(|u| cmd_login(manager, &u).map(|_| ())),
            2 => prompt_username().and_then(|u| cmd_reset(manager, &u)),
            3 => prompt_username().and_then(|u| cmd_delete(manager, &u)),
            4 => cmd_list(manager),
            5 => cmd_cleanup(manager),
            _ => break,
        };
        if let Err(err) = outcome {
            println!("Error: {err}");
        }
    }
    Ok(())
}

fn prompt_username() -> Result<String> {
    Ok(Input::<String>::new()
        .with_prompt("Username")
        .interact_text()?)
}
