//! SQLite-backed store.
//!
//! The `users` table keeps the legacy single-table layout
//! (`id INTEGER PRIMARY KEY, username TEXT, password TEXT`) with the
//! constraints it always needed: `username` is UNIQUE COLLATE NOCASE and
//! `password` holds a PHC hash, never plaintext. Every statement is
//! parameterized; WAL mode for concurrent reads + crash safety.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::error::AuthError;
use crate::store::{Role, SessionRow, StoreBackend, UserRow};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, AuthError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database (for tests).
    pub fn open_in_memory() -> Result<Self, AuthError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), AuthError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id         INTEGER PRIMARY KEY,
                username   TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password   TEXT NOT NULL,
                role       TEXT NOT NULL DEFAULT 'user',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                username   TEXT NOT NULL COLLATE NOCASE,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_username ON sessions(username);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires  ON sessions(expires_at);",
        )?;
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = row.get(2)?;
    Ok(UserRow {
        username: row.get(0)?,
        secret_hash: row.get(1)?,
        role: Role::from_str_lossy(&role),
        created_at: row.get::<_, i64>(3)? as u64,
    })
}

impl StoreBackend for SqliteStore {
    fn insert_user(&self, row: UserRow) -> Result<(), AuthError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, password, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                row.username,
                row.secret_hash,
                row.role.as_str(),
                row.created_at as i64
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AuthError::DuplicateUser)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_user(&self, username: &str) -> Result<Option<UserRow>, AuthError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT username, password, role, created_at FROM users
             WHERE username = ?1 ORDER BY id LIMIT 1",
            params![username],
            row_to_user,
        );
        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn update_secret_hash(&self, username: &str, secret_hash: &str) -> Result<bool, AuthError> {
        let conn = self.conn.lock();
        // First match by id order; with the UNIQUE constraint this is the
        // only match.
        let changed = conn.execute(
            "UPDATE users SET password = ?1
             WHERE id = (SELECT id FROM users WHERE username = ?2 ORDER BY id LIMIT 1)",
            params![secret_hash, username],
        )?;
        Ok(changed > 0)
    }

    fn delete_user(&self, username: &str) -> Result<u64, AuthError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE username = ?1", params![username])?;
        let removed = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        Ok(removed as u64)
    }

    fn list_users(&self) -> Result<Vec<UserRow>, AuthError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT username, password, role, created_at FROM users ORDER BY id",
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn user_count(&self) -> Result<u64, AuthError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_session(&self, row: SessionRow) -> Result<(), AuthError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO sessions (token_hash, username, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                row.token_hash,
                row.username,
                row.created_at as i64,
                row.expires_at as i64
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AuthError::StorageUnavailable("session token collision".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_session(&self, token_hash: &str) -> Result<Option<SessionRow>, AuthError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT token_hash, username, created_at, expires_at FROM sessions
             WHERE token_hash = ?1",
            params![token_hash],
            |row| {
                Ok(SessionRow {
                    token_hash: row.get(0)?,
                    username: row.get(1)?,
                    created_at: row.get::<_, i64>(2)? as u64,
                    expires_at: row.get::<_, i64>(3)? as u64,
                })
            },
        );
        match row {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool, AuthError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(deleted > 0)
    }

    fn delete_expired_sessions(&self, now: u64) -> Result<u64, AuthError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![now as i64],
        )?;
        Ok(deleted as u64)
    }
}
