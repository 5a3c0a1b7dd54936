//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Subsystems go through the collaborator traits — they never execute SQL.
//!
//! `SqliteStore` is the reference implementation of `ConfigStore`,
//! `Ledger`, `Inventory` and `EventJournal`. Settings and records are JSON
//! blobs, each row carrying its own schema version and revision counter.

use crate::error::CrimeResult;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, PoisonError};

mod event_log;
mod ledger;
mod record;
mod settings;

pub use ledger::DEFAULT_CURRENCY_NAME;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteStore {
    /// Open (or create) a database file and apply migrations.
    pub fn open(path: &str) -> CrimeResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CrimeResult<Self> {
        let conn = Connection::open(":memory:")?;
        let store = Self { conn: Mutex::new(conn), path: None };
        store.migrate()?;
        Ok(store)
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> CrimeResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> CrimeResult<()> {
        self.conn()
            .execute_batch(include_str!("../../../migrations/001_crime.sql"))?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
