//! An asynchronous Rust client for the Hitem3D multi-view image-to-3D API.
//!
//! The crate covers the whole lifecycle of a reconstruction task: it exchanges
//! client credentials for a bearer token, uploads a directory of view images
//! with the task parameters, polls the task until the service reports a
//! terminal state, and streams the finished model to disk.
//!
//! ## Features
//! - Token caching with single-flight refresh shared by concurrent tasks.
//! - Multipart submission of every `.jpg`, `.jpeg` and `.png` in a directory.
//! - Cancellable polling that rides out transient network failures.
//! - Crash-safe downloads named `result_<task_id>.<ext>`.
//! - A [`TaskOrchestrator`] that turns every failure into a [`TaskOutcome`] value.
//!
//! ## Example
//!
//! ```no_run
//! # use hitem3d::{CancellationToken, Hitem3dConfig, TaskOrchestrator};
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Hitem3dConfig::from_env()?;
//! let params = config.default_params.clone();
//! let orchestrator = TaskOrchestrator::new(config)?;
//!
//! let outcome = orchestrator
//!     .run("data/input", &params, |p| println!("{:.0}% {}", p.progress * 100.0, p.state), &CancellationToken::new())
//!     .await;
//! println!("{}", outcome.status_message());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod images;
pub mod orchestrator;
pub mod poller;
pub mod submit;
pub mod types;

pub use auth::{AccessToken, Credentials, TokenStore};
pub use client::Hitem3dClient;
pub use config::Hitem3dConfig;
pub use error::Hitem3dError;
pub use fetch::result_file_name;
pub use images::{ImageSet, StagedImages};
pub use orchestrator::{PipelineStage, TaskOrchestrator, TaskOutcome};
pub use poller::{PollConfig, ProgressUpdate, StatusPoller, TerminalState};
pub use types::{
    extension_for_format_code, ModelVersion, OutputFormat, RequestType, Resolution, TaskParameters,
    TaskState, TaskStatus,
};

/// Re-exported so callers can cancel polling without depending on `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
