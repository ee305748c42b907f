//! SQLite-backed QueueStore
//!
//! A single `slots` table holds the two logical keys. Each mutation is a
//! read-modify-write inside an IMMEDIATE transaction, so a CLI invocation and
//! a running `hq run` can share one database file without losing updates.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, info, warn};

use super::{QUEUED_MESSAGES_KEY, QueueStore, StoreResult, WEBHOOK_URL_KEY};
use crate::domain::QueuedMessage;

/// How long a writer waits for another process holding the lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS slots (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

/// QueueStore persisted in a SQLite database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "SqliteStore::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(%journal_mode, "SqliteStore::open: journal mode set");

        let store = Self::init(conn)?;
        info!(path = %path.display(), "Opened queue store");
        Ok(store)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("SqliteStore::open_in_memory: called");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA synchronous = FULL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn write_tx(&mut self) -> StoreResult<Transaction<'_>> {
        Ok(self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

fn read_slot(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM slots WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

fn write_slot(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO slots (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Decode the queue slot, treating corrupt data as an empty queue
fn decode_queue(raw: Option<&str>) -> Vec<QueuedMessage> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<QueuedMessage>>(raw) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(error = %e, bytes = raw.len(), "Queued messages are corrupt, treating queue as empty");
            Vec::new()
        }
    }
}

fn read_queue(conn: &Connection) -> StoreResult<Vec<QueuedMessage>> {
    let raw = read_slot(conn, QUEUED_MESSAGES_KEY)?;
    Ok(decode_queue(raw.as_deref()))
}

fn write_queue(conn: &Connection, messages: &[QueuedMessage]) -> StoreResult<()> {
    let encoded = serde_json::to_string(messages)?;
    write_slot(conn, QUEUED_MESSAGES_KEY, &encoded)
}

impl QueueStore for SqliteStore {
    fn append(&mut self, message: &QueuedMessage) -> StoreResult<()> {
        debug!(id = %message.id, "SqliteStore::append: called");
        let tx = self.write_tx()?;
        let mut messages = read_queue(&tx)?;
        messages.push(message.clone());
        write_queue(&tx, &messages)?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, id: &str) -> StoreResult<()> {
        debug!(%id, "SqliteStore::remove: called");
        let tx = self.write_tx()?;
        let mut messages = read_queue(&tx)?;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        if messages.len() == before {
            debug!(%id, "SqliteStore::remove: id not queued, nothing to do");
            return Ok(());
        }
        write_queue(&tx, &messages)?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> StoreResult<()> {
        debug!("SqliteStore::clear: called");
        let tx = self.write_tx()?;
        write_queue(&tx, &[])?;
        tx.commit()?;
        Ok(())
    }

    fn list(&mut self) -> StoreResult<Vec<QueuedMessage>> {
        read_queue(&self.conn)
    }

    fn endpoint(&mut self) -> StoreResult<Option<String>> {
        read_slot(&self.conn, WEBHOOK_URL_KEY)
    }

    fn set_endpoint(&mut self, url: &str) -> StoreResult<()> {
        debug!(%url, "SqliteStore::set_endpoint: called");
        let tx = self.write_tx()?;
        write_slot(&tx, WEBHOOK_URL_KEY, url)?;
        tx.commit()?;
        Ok(())
    }

    fn revision(&mut self) -> StoreResult<u64> {
        let version: i64 = self.conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version as u64)
    }
}
