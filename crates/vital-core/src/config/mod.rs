//! Engine configuration

use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::CHUNK_BYTE_LIMIT;
use crate::util::is_http_url;

/// Upper bound on one upload cycle, covering every chunk in the cycle
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Tunables for the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL of the ingestion API
    pub api_base_url: String,
    /// Byte budget per upload payload
    pub chunk_byte_limit: usize,
    /// Wall-clock bound on one full upload cycle
    pub cycle_timeout: Duration,
}

impl SyncConfig {
    pub fn new(api_base_url: impl Into<String>) -> Result<Self> {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        if !is_http_url(&api_base_url) {
            return Err(Error::InvalidInput(format!(
                "Invalid API base URL: {api_base_url}"
            )));
        }
        Ok(Self {
            api_base_url,
            chunk_byte_limit: CHUNK_BYTE_LIMIT,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_chunk_byte_limit(mut self, bytes: usize) -> Self {
        self.chunk_byte_limit = bytes;
        self
    }

    #[must_use]
    pub const fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }
}
