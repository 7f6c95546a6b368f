//! The submit → poll → fetch pipeline.
//!
//! [`TaskOrchestrator`] never returns an error: every way a run can end is a
//! [`TaskOutcome`] value. Authentication failures during submission or
//! polling get one token refresh and one retry of the failed step.

use crate::client::Hitem3dClient;
use crate::config::Hitem3dConfig;
use crate::error::Hitem3dError;
use crate::images::{ImageSet, StagedImages};
use crate::poller::{ProgressUpdate, StatusPoller};
use crate::types::{OutputFormat, TaskParameters};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// The pipeline step a system error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Submit,
    Poll,
    Download,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Submit => "submit",
            PipelineStage::Poll => "poll",
            PipelineStage::Download => "download",
        })
    }
}

/// The final result of one orchestrated task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The model was downloaded to `file_path`.
    Success { task_id: String, file_path: PathBuf },
    /// The task could not be submitted: no images, bad parameters or a rejected request.
    Rejected { reason: String },
    /// The service accepted the task but reported it failed, or reported an unknown state.
    Failed { task_id: String, reason: String },
    /// The caller cancelled the run. `task_id` is set once submission went through.
    Cancelled { task_id: Option<String> },
    /// Authentication, timeout, download or I/O failure.
    SystemError {
        stage: PipelineStage,
        task_id: Option<String>,
        detail: String,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }

    /// The model path on success.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            TaskOutcome::Success { file_path, .. } => Some(file_path),
            _ => None,
        }
    }

    /// A human-readable status line for display.
    pub fn status_message(&self) -> String {
        match self {
            TaskOutcome::Success { file_path, .. } => {
                format!("Success! Model saved to: {}", file_path.display())
            }
            TaskOutcome::Rejected { reason } => format!("Could not submit task: {}", reason),
            TaskOutcome::Failed { task_id, reason } => {
                format!("Remote processing failed for task {}: {}", task_id, reason)
            }
            TaskOutcome::Cancelled { .. } => "Task cancelled".to_string(),
            TaskOutcome::SystemError { stage, detail, .. } => match stage {
                PipelineStage::Submit => format!("Could not submit task: {}", detail),
                PipelineStage::Poll => format!("Could not track task progress: {}", detail),
                PipelineStage::Download => format!("Could not download model: {}", detail),
            },
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_message())
    }
}

/// Clamps progress reports so the caller never sees them go backwards.
struct ProgressSink<F> {
    callback: F,
    last: f32,
}

impl<F: FnMut(ProgressUpdate)> ProgressSink<F> {
    fn new(callback: F) -> Self {
        Self { callback, last: 0.0 }
    }

    fn report(&mut self, progress: f32, state: impl Into<String>) {
        self.last = self.last.max(progress.clamp(0.0, 1.0));
        (self.callback)(ProgressUpdate {
            progress: self.last,
            state: state.into(),
        });
    }
}

/// Runs whole reconstruction tasks against one account.
///
/// Each orchestrator owns its own client and token store. Several runs may
/// proceed concurrently on the same orchestrator; they share only the token.
pub struct TaskOrchestrator {
    client: Hitem3dClient,
    poller: StatusPoller,
    output_dir: PathBuf,
    default_params: TaskParameters,
}

impl TaskOrchestrator {
    pub fn new(config: Hitem3dConfig) -> Result<Self, Hitem3dError> {
        let client = Hitem3dClient::from_config(&config)?;
        Ok(Self {
            poller: StatusPoller::new(client.clone(), config.poll),
            client,
            output_dir: config.output_dir,
            default_params: config.default_params,
        })
    }

    pub fn client(&self) -> &Hitem3dClient {
        &self.client
    }

    /// The parameters configured as defaults.
    pub fn default_params(&self) -> &TaskParameters {
        &self.default_params
    }

    /// Reconstructs a model from every image in `image_dir`.
    pub async fn run<P, F>(
        &self,
        image_dir: P,
        params: &TaskParameters,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> TaskOutcome
    where
        P: AsRef<Path>,
        F: FnMut(ProgressUpdate),
    {
        let mut sink = ProgressSink::new(on_progress);
        sink.report(0.0, "initializing");

        if let Err(e) = params.validate() {
            return rejected(e);
        }
        let images = match ImageSet::from_dir(image_dir).await {
            Ok(images) => images,
            Err(e) => return rejected(e),
        };
        self.run_images(&images, params, &mut sink, cancel).await
    }

    /// Reconstructs a model from loose image files.
    ///
    /// The files are first copied into a private staging directory that is
    /// removed when the run ends.
    pub async fn run_files<P, F>(
        &self,
        files: &[P],
        params: &TaskParameters,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> TaskOutcome
    where
        P: AsRef<Path>,
        F: FnMut(ProgressUpdate),
    {
        let mut sink = ProgressSink::new(on_progress);
        sink.report(0.0, "initializing");

        if let Err(e) = params.validate() {
            return rejected(e);
        }
        let staged = match StagedImages::stage(files).await {
            Ok(staged) => staged,
            Err(e) => return rejected(e),
        };
        self.run_images(staged.images(), params, &mut sink, cancel)
            .await
    }

    /// Waits for an already submitted task and downloads its model.
    pub async fn resume<F>(
        &self,
        task_id: &str,
        format: OutputFormat,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> TaskOutcome
    where
        F: FnMut(ProgressUpdate),
    {
        let mut sink = ProgressSink::new(on_progress);
        sink.report(0.2, "submitted");
        self.wait_and_fetch(task_id, format, &mut sink, cancel)
            .await
    }

    async fn run_images<F>(
        &self,
        images: &ImageSet,
        params: &TaskParameters,
        sink: &mut ProgressSink<F>,
        cancel: &CancellationToken,
    ) -> TaskOutcome
    where
        F: FnMut(ProgressUpdate),
    {
        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled { task_id: None };
        }

        let task_id = match self.submit_with_reauth(images, params, cancel).await {
            Ok(task_id) => task_id,
            Err(Hitem3dError::Cancelled) => return TaskOutcome::Cancelled { task_id: None },
            Err(e) if e.is_authentication() => {
                return TaskOutcome::SystemError {
                    stage: PipelineStage::Submit,
                    task_id: None,
                    detail: e.to_string(),
                }
            }
            Err(e) => return rejected(e),
        };
        sink.report(0.2, "submitted");

        self.wait_and_fetch(&task_id, params.format, sink, cancel)
            .await
    }

    async fn wait_and_fetch<F>(
        &self,
        task_id: &str,
        format: OutputFormat,
        sink: &mut ProgressSink<F>,
        cancel: &CancellationToken,
    ) -> TaskOutcome
    where
        F: FnMut(ProgressUpdate),
    {
        let url = match self.poll_with_reauth(task_id, sink, cancel).await {
            Ok(url) => url,
            Err(e) => return poll_outcome(task_id, e),
        };

        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled {
                task_id: Some(task_id.to_string()),
            };
        }
        sink.report(0.9, "downloading");

        let download = self
            .client
            .download_model(&url, &self.output_dir, format.as_str(), task_id);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Hitem3dError::Cancelled),
            result = download => result,
        };

        match result {
            Ok(file_path) => {
                sink.report(1.0, "done");
                TaskOutcome::Success {
                    task_id: task_id.to_string(),
                    file_path,
                }
            }
            Err(Hitem3dError::Cancelled) => TaskOutcome::Cancelled {
                task_id: Some(task_id.to_string()),
            },
            Err(e) => {
                tracing::warn!(task_id, error = %e, "Model download failed");
                TaskOutcome::SystemError {
                    stage: PipelineStage::Download,
                    task_id: Some(task_id.to_string()),
                    detail: e.to_string(),
                }
            }
        }
    }

    async fn submit_with_reauth(
        &self,
        images: &ImageSet,
        params: &TaskParameters,
        cancel: &CancellationToken,
    ) -> Result<String, Hitem3dError> {
        let mut reauthenticated = false;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Hitem3dError::Cancelled),
                result = self.client.submit_images(images, params) => result,
            };
            match result {
                Err(e) if e.is_authentication() && !reauthenticated => {
                    tracing::info!(error = %e, "Submission unauthorized, refreshing token");
                    if let Some(stale) = e.rejected_token() {
                        self.client.tokens().invalidate(stale).await;
                    }
                    reauthenticated = true;
                }
                other => return other,
            }
        }
    }

    async fn poll_with_reauth<F>(
        &self,
        task_id: &str,
        sink: &mut ProgressSink<F>,
        cancel: &CancellationToken,
    ) -> Result<String, Hitem3dError>
    where
        F: FnMut(ProgressUpdate),
    {
        let mut reauthenticated = false;
        loop {
            let result = self
                .poller
                .poll_until_terminal(
                    task_id,
                    |update| sink.report(update.progress, update.state),
                    cancel,
                )
                .await;
            match result {
                Err(e) if e.is_authentication() && !reauthenticated => {
                    tracing::info!(task_id, error = %e, "Polling unauthorized, refreshing token");
                    if let Some(stale) = e.rejected_token() {
                        self.client.tokens().invalidate(stale).await;
                    }
                    reauthenticated = true;
                }
                other => return other.and_then(|state| state.into_url(task_id)),
            }
        }
    }
}

fn rejected(e: Hitem3dError) -> TaskOutcome {
    tracing::warn!(error = %e, "Task not submitted");
    TaskOutcome::Rejected {
        reason: e.to_string(),
    }
}

fn poll_outcome(task_id: &str, e: Hitem3dError) -> TaskOutcome {
    let task_id = task_id.to_string();
    match e {
        Hitem3dError::Cancelled => TaskOutcome::Cancelled {
            task_id: Some(task_id),
        },
        e @ (Hitem3dError::RemoteTaskFailure { .. } | Hitem3dError::MissingResultUrl { .. }) => {
            TaskOutcome::Failed {
                task_id,
                reason: e.to_string(),
            }
        }
        e => TaskOutcome::SystemError {
            stage: PipelineStage::Poll,
            task_id: Some(task_id),
            detail: e.to_string(),
        },
    }
}
