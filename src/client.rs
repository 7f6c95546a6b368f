use crate::auth::{AccessToken, Credentials, TokenStore};
use crate::config::{with_trailing_slash, Hitem3dConfig, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::Hitem3dError;
use crate::types::{ApiResponse, TaskStatus};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The main client for interacting with the Hitem3D API.
///
/// It holds the shared `reqwest::Client`, the base URL for all API requests
/// and the [`TokenStore`] that authorizes them. Clones share the token store,
/// so a refreshed token is visible to every clone.
#[derive(Clone)]
pub struct Hitem3dClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) tokens: Arc<TokenStore>,
    pub(crate) request_timeout: Duration,
}

impl Hitem3dClient {
    /// Creates a new `Hitem3dClient` against the public API.
    ///
    /// If `credentials` is `None`, they are read from the `HITEM3D_CLIENT_ID`
    /// and `HITEM3D_CLIENT_SECRET` environment variables.
    ///
    /// # Errors
    ///
    /// - `Hitem3dError::MissingCredentials` if no credentials are available.
    /// - `Hitem3dError::RequestFailed` if the internal HTTP client fails to build.
    pub fn new(credentials: Option<Credentials>) -> Result<Self, Hitem3dError> {
        let credentials = match credentials {
            Some(credentials) => credentials,
            None => Credentials::from_env()?,
        };
        Self::new_with_url(credentials, DEFAULT_API_URL)
    }

    /// Creates a new `Hitem3dClient` with a custom base URL.
    ///
    /// This is useful for testing or for connecting to a different API endpoint.
    /// A trailing `/` is appended when missing so endpoint paths resolve under it.
    ///
    /// # Errors
    ///
    /// - `Hitem3dError::RequestFailed` if the internal HTTP client fails to build.
    /// - `Hitem3dError::UrlParseFailed` if the provided `base_url` is invalid.
    pub fn new_with_url(credentials: Credentials, base_url: &str) -> Result<Self, Hitem3dError> {
        Self::build(credentials, base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn from_config(config: &Hitem3dConfig) -> Result<Self, Hitem3dError> {
        Self::build(config.credentials.clone(), &config.base_url, config.request_timeout)
    }

    fn build(credentials: Credentials, base_url: &str, request_timeout: Duration) -> Result<Self, Hitem3dError> {
        let http = reqwest::Client::builder().build()?;
        let base_url = Url::parse(&with_trailing_slash(base_url.to_string()))?;
        let tokens = Arc::new(TokenStore::new(
            http.clone(),
            &base_url,
            credentials,
            request_timeout,
        )?);

        Ok(Self {
            http,
            base_url,
            tokens,
            request_timeout,
        })
    }

    /// The token store shared by this client and its clones.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Retrieves the current state of a task with a single request.
    ///
    /// Use [`StatusPoller`](crate::StatusPoller) to wait for a terminal state.
    ///
    /// # Errors
    ///
    /// - `Hitem3dError::TokenRejected` on 401/403.
    /// - `Hitem3dError::ApiError` on any other non-success status.
    /// - `Hitem3dError::RequestFailed` if no response arrives within the request timeout.
    pub async fn query_task(&self, task_id: &str) -> Result<TaskStatus, Hitem3dError> {
        let url = self.base_url.join("query-task")?;
        let token = self.tokens.acquire().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token.as_str())
            .query(&[("task_id", task_id)])
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            let api_response: ApiResponse<TaskStatus> = serde_json::from_str(&body)?;
            Ok(api_response.data)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(status_error(status, &token, message))
        }
    }
}

/// Maps a failed status to `TokenRejected` for 401/403 and `ApiError` otherwise.
pub(crate) fn status_error(status: StatusCode, token: &AccessToken, message: String) -> Hitem3dError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Hitem3dError::TokenRejected {
            token: token.clone(),
            message,
        }
    } else {
        Hitem3dError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}
