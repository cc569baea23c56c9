//! Cursor repository implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Cursor, SourceKind, Watermark};
use crate::util::unix_timestamp_now;

const KIND_CHANGE_TOKEN: &str = "change_token";
const KIND_TIMESTAMP: &str = "timestamp";

/// Trait for per-source-kind watermark storage.
///
/// Cursors are read-then-write: callers save only after the corresponding
/// records have been durably queued.
pub trait CursorStore {
    /// Fetch the cursor for a source kind, if one exists yet
    fn get(&self, source: SourceKind) -> Result<Option<Cursor>>;

    /// Create or advance the cursor for a source kind
    fn save(&self, source: SourceKind, watermark: &Watermark) -> Result<()>;

    /// Drop all cursors (explicit reset, e.g. major version migration)
    fn reset_all(&self) -> Result<()>;
}

/// `SQLite` implementation of `CursorStore`
pub struct SqliteCursorStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCursorStore<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_watermark(kind: &str, value: &str) -> Result<Watermark> {
        match kind {
            KIND_CHANGE_TOKEN => Ok(Watermark::ChangeToken(value.to_string())),
            KIND_TIMESTAMP => {
                let ts: DateTime<Utc> = value
                    .parse()
                    .map_err(|_| Error::Database(format!("Invalid cursor timestamp: {value}")))?;
                Ok(Watermark::Timestamp(ts))
            }
            other => Err(Error::Database(format!(
                "Unknown watermark kind in cursor store: {other}"
            ))),
        }
    }
}

impl CursorStore for SqliteCursorStore<'_> {
    fn get(&self, source: SourceKind) -> Result<Option<Cursor>> {
        let row = self
            .conn
            .query_row(
                "SELECT watermark_kind, watermark FROM cursors WHERE source = ?",
                params![source.as_str()],
                |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                },
            )
            .optional()?;

        match row {
            Some((kind, value)) => Ok(Some(Cursor {
                source,
                watermark: Self::parse_watermark(&kind, &value)?,
            })),
            None => Ok(None),
        }
    }

    fn save(&self, source: SourceKind, watermark: &Watermark) -> Result<()> {
        let (kind, value) = match watermark {
            Watermark::ChangeToken(token) => (KIND_CHANGE_TOKEN, token.clone()),
            Watermark::Timestamp(ts) => (KIND_TIMESTAMP, ts.to_rfc3339()),
        };

        self.conn.execute(
            "INSERT INTO cursors (source, watermark_kind, watermark, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(source) DO UPDATE SET
                 watermark_kind = excluded.watermark_kind,
                 watermark = excluded.watermark,
                 updated_at = excluded.updated_at",
            params![source.as_str(), kind, value, unix_timestamp_now()],
        )?;
        Ok(())
    }

    fn reset_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM cursors", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_cursor_reads_as_none() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteCursorStore::new(db.connection());
        assert_eq!(store.get(SourceKind::Steps).unwrap(), None);
    }

    #[test]
    fn save_then_get_change_token() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteCursorStore::new(db.connection());

        let watermark = Watermark::ChangeToken("tok-42".to_string());
        store.save(SourceKind::Steps, &watermark).unwrap();

        let cursor = store.get(SourceKind::Steps).unwrap().unwrap();
        assert_eq!(cursor.source, SourceKind::Steps);
        assert_eq!(cursor.watermark, watermark);
    }

    #[test]
    fn save_advances_existing_cursor() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteCursorStore::new(db.connection());

        store
            .save(SourceKind::Sleep, &Watermark::ChangeToken("old".to_string()))
            .unwrap();
        let ts = Watermark::Timestamp("2024-05-01T00:00:00Z".parse().unwrap());
        store.save(SourceKind::Sleep, &ts).unwrap();

        let cursor = store.get(SourceKind::Sleep).unwrap().unwrap();
        assert_eq!(cursor.watermark, ts);
    }

    #[test]
    fn reset_all_clears_every_cursor() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteCursorStore::new(db.connection());

        store
            .save(SourceKind::Steps, &Watermark::ChangeToken("a".to_string()))
            .unwrap();
        store
            .save(SourceKind::Sleep, &Watermark::ChangeToken("b".to_string()))
            .unwrap();
        store.reset_all().unwrap();

        assert_eq!(store.get(SourceKind::Steps).unwrap(), None);
        assert_eq!(store.get(SourceKind::Sleep).unwrap(), None);
    }
}
