//! Upload pipeline
//!
//! One cycle takes the whole outbox through overlap resolution, attempt
//! annotation, chunking, and sequential delivery. Records are deleted from
//! the outbox only on per-chunk server acknowledgment; a failed chunk is
//! skipped and the cycle moves on, so one bad payload cannot wedge the queue.

use chrono::Utc;

use crate::auth::{AccessToken, CredentialStore};
use crate::error::{Error, Result};
use crate::models::{DataLogRecord, RecordId};
use crate::services::DataStoreService;

use super::batch::{calculate_limit, fallback_limit, CHUNK_BYTE_LIMIT};
use super::overlap::resolve_overlaps;
use super::transport::{LogTransport, ResponseClass};

/// Per-cycle authentication state.
///
/// The refresh flag lives here rather than on the pipeline, so every cycle
/// gets exactly one refresh opportunity and parallel histories cannot leak
/// state into each other.
#[derive(Debug)]
struct UploadSession {
    access_token: AccessToken,
    refresh_attempted: bool,
}

/// Result of one upload cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOutcome {
    /// Every chunk this cycle was acknowledged
    pub success: bool,
    /// First error encountered, if any
    pub error: Option<String>,
    /// The account is gone; callers must stop scheduling cycles
    pub halted: bool,
    /// Records acknowledged and deleted this cycle
    pub delivered: usize,
}

impl PostOutcome {
    fn delivered(count: usize) -> Self {
        Self {
            success: true,
            error: None,
            halted: false,
            delivered: count,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            halted: false,
            delivered: 0,
        }
    }
}

/// How one chunk ended
enum ChunkDisposition {
    Delivered,
    /// Left in the outbox, cycle continues with the next chunk
    Skipped(String),
    /// Left in the outbox, cycle stops here
    Abort(String),
    /// Account gone: cycle stops and no further cycles may be scheduled
    Halt(String),
}

/// Drains the outbox toward the ingestion API
pub struct UploadPipeline<T, C> {
    transport: T,
    credentials: C,
    byte_budget: usize,
}

impl<T: LogTransport, C: CredentialStore> UploadPipeline<T, C> {
    pub const fn new(transport: T, credentials: C) -> Self {
        Self {
            transport,
            credentials,
            byte_budget: CHUNK_BYTE_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_byte_budget(mut self, byte_budget: usize) -> Self {
        self.byte_budget = byte_budget;
        self
    }

    /// Run one full upload cycle over the pending outbox
    pub async fn post_batch(&self, store: &DataStoreService) -> PostOutcome {
        match self.run_cycle(store).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!("Upload cycle failed: {error}");
                PostOutcome::failed(error.to_string())
            }
        }
    }

    async fn run_cycle(&self, store: &DataStoreService) -> Result<PostOutcome> {
        let pending = store.pending_records().await?;
        if pending.is_empty() {
            return Ok(PostOutcome::delivered(0));
        }

        let mut records = resolve_overlaps(pending);
        let attempted_at = Utc::now().fixed_offset();
        for record in &mut records {
            record.mark_post_attempt(attempted_at);
        }
        // Persist the attempt annotations so retries carry their history
        store.queue_records(&records).await?;

        let Some(token) = self.credentials.access_token().await? else {
            return Ok(PostOutcome::failed("Not authenticated"));
        };
        let mut session = UploadSession {
            access_token: token,
            refresh_attempted: false,
        };

        let mut limit = calculate_limit(&records, self.byte_budget);
        if limit < 1 {
            limit = fallback_limit(self.byte_budget);
        }
        tracing::debug!(
            "Posting {} record(s) in chunks of up to {limit}",
            records.len()
        );

        let mut delivered = 0;
        let mut first_error: Option<String> = None;

        for chunk in records.chunks(limit) {
            match self.send_chunk(chunk, &mut session, store).await? {
                ChunkDisposition::Delivered => delivered += chunk.len(),
                ChunkDisposition::Skipped(message) => {
                    tracing::warn!("Chunk skipped: {message}");
                    first_error.get_or_insert(message);
                }
                ChunkDisposition::Abort(message) => {
                    tracing::warn!("Upload cycle aborted: {message}");
                    first_error.get_or_insert(message);
                    break;
                }
                ChunkDisposition::Halt(message) => {
                    tracing::error!("Account removed by server, halting uploads");
                    // Earlier chunks may already be acknowledged; report them
                    return Ok(PostOutcome {
                        success: false,
                        error: Some(message),
                        halted: true,
                        delivered,
                    });
                }
            }
        }

        Ok(PostOutcome {
            success: first_error.is_none(),
            error: first_error,
            halted: false,
            delivered,
        })
    }

    async fn send_chunk(
        &self,
        chunk: &[DataLogRecord],
        session: &mut UploadSession,
        store: &DataStoreService,
    ) -> Result<ChunkDisposition> {
        let response = match self
            .transport
            .post_logs(session.access_token.secret(), chunk)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return Ok(ChunkDisposition::Skipped(format!(
                    "Chunk delivery failed: {error}"
                )))
            }
        };

        match response.class() {
            ResponseClass::Success => {
                self.acknowledge(chunk, store).await?;
                Ok(ChunkDisposition::Delivered)
            }
            ResponseClass::AccountRemoved => {
                Ok(ChunkDisposition::Halt(Error::AccountRemoved.to_string()))
            }
            ResponseClass::Unauthorized => {
                self.retry_refreshed(chunk, session, store, &response.message)
                    .await
            }
            ResponseClass::Failure => Ok(ChunkDisposition::Skipped(format!(
                "Server rejected chunk ({}): {}",
                response.status, response.message
            ))),
        }
    }

    /// One refresh per cycle: on the first 401, refresh and replay the chunk;
    /// any later 401 aborts the cycle.
    async fn retry_refreshed(
        &self,
        chunk: &[DataLogRecord],
        session: &mut UploadSession,
        store: &DataStoreService,
        reason: &str,
    ) -> Result<ChunkDisposition> {
        if session.refresh_attempted {
            return Ok(ChunkDisposition::Abort(format!(
                "Still unauthorized after token refresh: {reason}"
            )));
        }
        session.refresh_attempted = true;

        let refreshed = match self.credentials.refresh_token().await {
            Ok(token) => token,
            Err(error) => {
                return Ok(ChunkDisposition::Abort(format!(
                    "Token refresh failed: {error}"
                )))
            }
        };
        session.access_token = refreshed;

        let response = match self
            .transport
            .post_logs(session.access_token.secret(), chunk)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return Ok(ChunkDisposition::Skipped(format!(
                    "Chunk delivery failed after refresh: {error}"
                )))
            }
        };

        match response.class() {
            ResponseClass::Success => {
                self.acknowledge(chunk, store).await?;
                Ok(ChunkDisposition::Delivered)
            }
            ResponseClass::AccountRemoved => {
                Ok(ChunkDisposition::Halt(Error::AccountRemoved.to_string()))
            }
            ResponseClass::Unauthorized => Ok(ChunkDisposition::Abort(
                "Unauthorized immediately after token refresh".to_string(),
            )),
            ResponseClass::Failure => Ok(ChunkDisposition::Skipped(format!(
                "Server rejected chunk ({}): {}",
                response.status, response.message
            ))),
        }
    }

    async fn acknowledge(&self, chunk: &[DataLogRecord], store: &DataStoreService) -> Result<()> {
        let ids: Vec<RecordId> = chunk.iter().map(|r| r.id.clone()).collect();
        store.delete_records(&ids).await
    }
}
