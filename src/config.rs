//! Runtime configuration for a [`TaskOrchestrator`](crate::TaskOrchestrator).
//!
//! Everything here is plain data. [`Hitem3dConfig::from_env`] reads the
//! `HITEM3D_*` variables, loading a `.env` file first when one exists.

use crate::auth::Credentials;
use crate::error::Hitem3dError;
use crate::poller::PollConfig;
use crate::types::TaskParameters;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.hitem3d.ai/open-api/v1/";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Upper bound for a single token exchange or status query.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Hitem3dConfig {
    pub credentials: Credentials,
    /// Base URL of the open API. Must end with `/` so endpoint paths join under it.
    pub base_url: String,
    /// Directory receiving `result_<task_id>.<ext>` files.
    pub output_dir: PathBuf,
    /// Per-request timeout for token exchanges and status queries.
    /// Uploads and downloads are not bounded by it.
    pub request_timeout: Duration,
    pub poll: PollConfig,
    /// Parameters used when a caller does not supply its own.
    pub default_params: TaskParameters,
}

impl Hitem3dConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_API_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: PollConfig::default(),
            default_params: TaskParameters::default(),
        }
    }

    /// Builds a configuration from `HITEM3D_*` environment variables.
    ///
    /// # Errors
    ///
    /// - `Hitem3dError::MissingCredentials` if the client id or secret is unset.
    /// - `Hitem3dError::InvalidParameter` if a numeric or task parameter variable does not parse.
    pub fn from_env() -> Result<Self, Hitem3dError> {
        dotenvy::dotenv().ok();

        let credentials = Credentials::from_env()?;
        let mut config = Self::new(credentials);

        if let Some(base_url) = var("HITEM3D_BASE_URL") {
            config.base_url = with_trailing_slash(base_url);
        }
        if let Some(dir) = var("HITEM3D_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_var::<u64>("HITEM3D_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("HITEM3D_POLL_INTERVAL_SECS")? {
            config.poll.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("HITEM3D_ERROR_BACKOFF_SECS")? {
            config.poll.error_backoff = Duration::from_secs(secs);
        }
        config.poll.max_attempts = parse_var::<u32>("HITEM3D_MAX_POLL_ATTEMPTS")?;
        config.poll.max_duration =
            parse_var::<u64>("HITEM3D_MAX_POLL_SECS")?.map(Duration::from_secs);

        let defaults = TaskParameters::default();
        config.default_params = TaskParameters::parse(
            &var("HITEM3D_REQUEST_TYPE").unwrap_or_else(|| defaults.request_type.to_string()),
            &var("HITEM3D_RESOLUTION").unwrap_or_else(|| defaults.resolution.to_string()),
            &var("HITEM3D_FACE").unwrap_or_else(|| defaults.face.to_string()),
            &var("HITEM3D_MODEL").unwrap_or_else(|| defaults.model.to_string()),
            &var("HITEM3D_FORMAT").unwrap_or_else(|| defaults.format.to_string()),
        )?;

        Ok(config)
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, Hitem3dError> {
    match var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Hitem3dError::InvalidParameter { name, value: raw }),
    }
}

pub(crate) fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
