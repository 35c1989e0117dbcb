pub mod claim;
pub mod error;
pub mod items;
pub mod lists;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod users;
pub mod versioned;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

pub use claim::{ClaimChange, ClaimState};
pub use error::{Result, StoreError};
pub use items::{ItemKey, ItemPatch};
pub use lists::{ListFilter, ListPatch};
pub use models::{List, ListData, ListItem, ListItemData, NewUser, Session, User};
pub use versioned::{Update, Versioned};

/// The record store. A single connection behind a mutex: every read and every
/// transaction is serialized, which gives the one-writer-at-a-time behaviour
/// the versioned update protocol is built on.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes (admin tool)
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction. Commits on `Ok`; on `Err` the
    /// transaction is dropped, which rolls it back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Internal(format!("DB lock poisoned: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_on_disk_runs_migrations_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("giftlist.db");

        {
            let db = Database::open(&path).unwrap();
            testutil::user(&db, "a");
        }

        // Reopening must keep existing rows and not re-run v1.
        let db = Database::open(&path).unwrap();
        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "a");
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = testutil::db();
        let res: Result<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (username, fullname, password, admin) VALUES ('x', 'X', 'd', 0)",
                [],
            )?;
            Err(StoreError::Internal("boom".into()))
        });
        assert!(res.is_err());
        assert!(db.get_user_by_username("x").unwrap().is_none());
    }
}
