//! Credential handling for the upload pipeline
//!
//! Tokens are held behind an opaque wrapper that redacts itself in debug and
//! log output. The pipeline only ever sees the [`CredentialStore`] trait, so
//! token storage and refresh transport stay swappable.

use std::fmt;
use std::future::Future;

use crate::error::{Error, Result};

/// Bearer token for the ingestion API.
///
/// Deliberately opaque: `Debug` output never contains the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Source of tokens for authenticated uploads
pub trait CredentialStore: Send + Sync {
    /// Current access token, if the account is signed in
    fn access_token(&self) -> impl Future<Output = Result<Option<AccessToken>>> + Send;

    /// Exchange the stored refresh token for a fresh access token
    fn refresh_token(&self) -> impl Future<Output = Result<AccessToken>> + Send;
}

/// Fixed-token credentials for tools and tests; refresh always fails
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: Option<AccessToken>,
}

impl StaticCredentials {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(AccessToken::new(token)),
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self { token: None }
    }
}

impl CredentialStore for StaticCredentials {
    async fn access_token(&self) -> Result<Option<AccessToken>> {
        Ok(self.token.clone())
    }

    async fn refresh_token(&self) -> Result<AccessToken> {
        Err(Error::Auth(
            "Static credentials cannot be refreshed".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn debug_output_redacts_secret() {
        let token = AccessToken::new("super-secret-bearer");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret-bearer"));
        assert_eq!(rendered, "AccessToken(<redacted>)");
    }

    #[tokio::test]
    async fn static_credentials_never_refresh() {
        let creds = StaticCredentials::new("abc");
        assert!(creds.access_token().await.unwrap().is_some());
        assert!(creds.refresh_token().await.is_err());
    }
}
