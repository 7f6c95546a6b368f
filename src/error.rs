use crate::auth::AccessToken;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Hitem3dError {
    #[error("Credentials are missing. Please provide them or set HITEM3D_CLIENT_ID and HITEM3D_CLIENT_SECRET.")]
    MissingCredentials,
    #[error("Authentication failed: {message}")]
    Authentication { message: String },
    /// The server refused `token` with 401/403.
    #[error("Access token rejected: {message}")]
    TokenRejected { token: AccessToken, message: String },
    #[error("No .jpg, .jpeg or .png images found in {}", .dir.display())]
    NoImages { dir: PathBuf },
    #[error("Invalid value `{value}` for parameter `{name}`")]
    InvalidParameter { name: &'static str, value: String },
    #[error("Task submission rejected: {message}")]
    Submission { message: String },
    #[error("API request failed with status {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Remote task {task_id} ended in state `{state}`")]
    RemoteTaskFailure { task_id: String, state: String },
    #[error("Task {task_id} succeeded but the response carried no model URL")]
    MissingResultUrl { task_id: String },
    #[error("Model download failed: {message}")]
    Download { message: String },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Gave up polling after {attempts} attempts ({elapsed:?})")]
    PollTimeout { attempts: u32, elapsed: Duration },
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Hitem3dError {
    /// True for failures that a fresh access token may cure.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Hitem3dError::Authentication { .. } | Hitem3dError::TokenRejected { .. }
        )
    }

    /// The token a request was refused with, if that is what went wrong.
    pub fn rejected_token(&self) -> Option<&AccessToken> {
        match self {
            Hitem3dError::TokenRejected { token, .. } => Some(token),
            _ => None,
        }
    }

    /// True for failures the status poller absorbs with a backoff-retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Hitem3dError::ApiError { .. }
                | Hitem3dError::RequestFailed(_)
                | Hitem3dError::ResponseParseFailed(_)
        )
    }
}
