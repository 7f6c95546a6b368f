//! Access token management.
//!
//! The service issues bearer tokens in exchange for a client id and secret
//! sent as HTTP Basic credentials. Tokens carry no expiry, so a cached token
//! is reused until a request fails with 401/403 and the caller invalidates it.

use crate::error::Hitem3dError;
use crate::types::{CodedResponse, TokenData};
use std::env;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// A client id and secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads `HITEM3D_CLIENT_ID` and `HITEM3D_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self, Hitem3dError> {
        let id = env::var("HITEM3D_CLIENT_ID").ok().filter(|v| !v.is_empty());
        let secret = env::var("HITEM3D_CLIENT_SECRET").ok().filter(|v| !v.is_empty());
        let (Some(id), Some(secret)) = (id, secret) else {
            return Err(Hitem3dError::MissingCredentials);
        };
        Ok(Self::new(id, secret))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// An opaque bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Caches one access token and refreshes it on demand.
///
/// The cache lock is held for the whole credential exchange, so callers
/// racing on an empty store wait for a single exchange instead of each
/// issuing their own.
pub struct TokenStore {
    http: reqwest::Client,
    token_url: Url,
    credentials: Credentials,
    request_timeout: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenStore {
    /// `request_timeout` bounds each credential exchange, since the cache lock
    /// is held while it runs.
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        credentials: Credentials,
        request_timeout: Duration,
    ) -> Result<Self, Hitem3dError> {
        Ok(Self {
            http,
            token_url: base_url.join("auth/token")?,
            credentials,
            request_timeout,
            cached: Mutex::new(None),
        })
    }

    /// Returns the cached token, exchanging credentials for a new one if there is none.
    ///
    /// # Errors
    ///
    /// `Hitem3dError::Authentication` with the raw response payload when the
    /// exchange fails at the transport level, returns a non-success status, or
    /// reports a `code` other than 200.
    pub async fn acquire(&self) -> Result<AccessToken, Hitem3dError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.exchange().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still `stale`, so the next
    /// [`acquire`](Self::acquire) refreshes it.
    ///
    /// A token another caller already refreshed is left alone.
    pub async fn invalidate(&self, stale: &AccessToken) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref() == Some(stale) {
            *cached = None;
            tracing::debug!("Access token invalidated");
        }
    }

    async fn exchange(&self) -> Result<AccessToken, Hitem3dError> {
        tracing::debug!(client_id = %self.credentials.client_id, "Exchanging credentials for an access token");

        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .json(&serde_json::json!({}))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Hitem3dError::Authentication {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Hitem3dError::Authentication {
            message: e.to_string(),
        })?;

        let data = if status.is_success() {
            serde_json::from_str::<CodedResponse<TokenData>>(&body)
                .ok()
                .and_then(CodedResponse::into_success)
        } else {
            None
        };

        match data {
            Some(data) => {
                tracing::info!("Obtained access token");
                Ok(AccessToken::new(data.access_token))
            }
            None => {
                tracing::warn!(status = status.as_u16(), body = %body, "Token exchange rejected");
                Err(Hitem3dError::Authentication { message: body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::new("my-id", "top-secret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("my-id"));
        assert!(!rendered.contains("top-secret"));

        let token = AccessToken("bearer-value".into());
        assert!(!format!("{:?}", token).contains("bearer-value"));
    }
}
