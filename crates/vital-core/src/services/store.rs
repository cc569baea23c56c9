//! Async facade over the local database
//!
//! Repositories are synchronous and borrow the connection; async callers go
//! through this service, which serializes access behind a single mutex.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    CursorStore, Database, OutboxStore, SqliteCursorStore, SqliteOutboxStore,
};
use crate::error::Result;
use crate::extract::{ExtractionSummary, HealthDataProvider, MapperRegistry, SourceExtractor};
use crate::models::{Cursor, DataLogRecord, RecordId, SourceKind, Watermark};

/// Shared handle to the outbox and cursor stores
#[derive(Clone)]
pub struct DataStoreService {
    db: Arc<Mutex<Database>>,
}

impl DataStoreService {
    /// Open (and migrate) the database at the given path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open(path)?)),
        })
    }

    /// In-memory store for tools and tests
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
        })
    }

    /// Queue records into the outbox, replacing same-id entries
    pub async fn queue_records(&self, records: &[DataLogRecord]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteOutboxStore::new(db.connection()).upsert(records)
    }

    /// Remove server-acknowledged records
    pub async fn delete_records(&self, ids: &[RecordId]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteOutboxStore::new(db.connection()).delete(ids)
    }

    /// Every record still awaiting acknowledgment
    pub async fn pending_records(&self) -> Result<Vec<DataLogRecord>> {
        let db = self.db.lock().await;
        SqliteOutboxStore::new(db.connection()).fetch_all()
    }

    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteOutboxStore::new(db.connection()).count()
    }

    pub async fn cursor(&self, kind: SourceKind) -> Result<Option<Cursor>> {
        let db = self.db.lock().await;
        SqliteCursorStore::new(db.connection()).get(kind)
    }

    pub async fn save_cursor(&self, kind: SourceKind, watermark: &Watermark) -> Result<()> {
        let db = self.db.lock().await;
        SqliteCursorStore::new(db.connection()).save(kind, watermark)
    }

    /// Drop every cursor; the next pass re-extracts from the bounded window
    pub async fn reset_cursors(&self) -> Result<()> {
        let db = self.db.lock().await;
        SqliteCursorStore::new(db.connection()).reset_all()
    }

    /// Run one extraction pass against the provider.
    ///
    /// Provider queries run without the database lock held; the lock is
    /// taken only around each kind's queue-then-advance-cursor pair, so a
    /// slow provider cannot stall concurrent store callers.
    pub async fn extract_with<P: HealthDataProvider>(
        &self,
        provider: &P,
        mappers: &MapperRegistry,
    ) -> Result<ExtractionSummary> {
        let extractor = SourceExtractor::new(provider, mappers);
        let mut summary = ExtractionSummary::default();

        for kind in provider.granted_kinds()? {
            let cursor = self.cursor(kind).await?;
            match extractor.fetch_feed(kind, cursor) {
                Ok(feed) => {
                    let db = self.db.lock().await;
                    let outbox = SqliteOutboxStore::new(db.connection());
                    let cursors = SqliteCursorStore::new(db.connection());
                    summary.queued += extractor.queue_feed(kind, &feed, &outbox, &cursors)?;
                }
                Err(error) => {
                    tracing::warn!("Extraction failed for {kind}: {error}");
                    summary.failed_kinds.push(kind);
                }
            }
        }

        Ok(summary)
    }
}
