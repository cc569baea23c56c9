//! Wire transport for log uploads

use std::future::Future;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::DataLogRecord;
use crate::util::{compact_text, is_http_url};

/// Coarse classification of an ingestion response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx: the server owns the records now
    Success,
    /// 401: token expired or revoked, eligible for one refresh per cycle
    Unauthorized,
    /// 410: the account no longer exists, uploads must halt
    AccountRemoved,
    /// Anything else: transient or server-side, retried next cycle
    Failure,
}

impl ResponseClass {
    #[must_use]
    pub const fn of(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            401 => Self::Unauthorized,
            410 => Self::AccountRemoved,
            _ => Self::Failure,
        }
    }
}

/// Outcome of posting one chunk
#[derive(Debug, Clone)]
pub struct ChunkResponse {
    pub status: u16,
    pub message: String,
}

impl ChunkResponse {
    #[must_use]
    pub const fn class(&self) -> ResponseClass {
        ResponseClass::of(self.status)
    }
}

/// Delivery seam between the pipeline and the ingestion API.
///
/// A transport failure (DNS, connection reset) surfaces as `Err`; an HTTP
/// response of any status is `Ok` and classified by the caller.
pub trait LogTransport: Send + Sync {
    fn post_logs(
        &self,
        access_token: &str,
        records: &[DataLogRecord],
    ) -> impl Future<Output = Result<ChunkResponse>> + Send;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Pull a human-readable message out of an API error payload
fn parse_api_error(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .map_or_else(
            || format!("Request failed with status {status}"),
            |message| compact_text(&message),
        )
}

/// HTTPS transport posting JSON batches to the ingestion endpoint
#[derive(Debug, Clone)]
pub struct HttpLogTransport {
    client: reqwest::Client,
    logs_url: String,
}

impl HttpLogTransport {
    /// Build a transport for the given API base URL
    pub fn new(api_base_url: &str) -> Result<Self> {
        let base = api_base_url.trim_end_matches('/');
        if !is_http_url(base) {
            return Err(Error::InvalidInput(format!(
                "Invalid API base URL: {api_base_url}"
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            logs_url: format!("{base}/logs"),
        })
    }
}

impl LogTransport for HttpLogTransport {
    async fn post_logs(
        &self,
        access_token: &str,
        records: &[DataLogRecord],
    ) -> Result<ChunkResponse> {
        let response = self
            .client
            .post(&self.logs_url)
            .bearer_auth(access_token)
            .json(records)
            .send()
            .await?;

        let status = response.status().as_u16();
        let message = if response.status().is_success() {
            format!("Delivered {} records", records.len())
        } else {
            let body = response.text().await.unwrap_or_default();
            parse_api_error(status, &body)
        };

        Ok(ChunkResponse { status, message })
    }
}
