//! Outbox repository implementation

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{DataLogRecord, RecordId};

/// Trait for the durable queue of not-yet-confirmed records.
///
/// Invariant: a record leaves the store if and only if the server has
/// acknowledged it.
pub trait OutboxStore {
    /// Insert or replace records by id (idempotent re-extraction)
    fn upsert(&self, records: &[DataLogRecord]) -> Result<()>;

    /// Remove acknowledged records by id set
    fn delete(&self, ids: &[RecordId]) -> Result<()>;

    /// Read every pending record
    fn fetch_all(&self) -> Result<Vec<DataLogRecord>>;

    /// Number of pending records
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `OutboxStore`
pub struct SqliteOutboxStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOutboxStore<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl OutboxStore for SqliteOutboxStore<'_> {
    fn upsert(&self, records: &[DataLogRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO outbox (id, data_type, record) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     data_type = excluded.data_type,
                     record = excluded.record",
            )?;
            for record in records {
                let payload = serde_json::to_string(record)?;
                stmt.execute(params![record.id.as_str(), record.data_type, payload])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, ids: &[RecordId]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM outbox WHERE id = ?")?;
            for id in ids {
                stmt.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<DataLogRecord>> {
        let mut stmt = self.conn.prepare("SELECT record FROM outbox")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for payload in rows {
            records.push(serde_json::from_str(&payload?)?);
        }
        Ok(records)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
