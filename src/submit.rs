//! Multi-view task submission.

use crate::client::{status_error, Hitem3dClient};
use crate::error::Hitem3dError;
use crate::images::ImageSet;
use crate::types::{CodedResponse, SubmitData, TaskParameters};
use reqwest::multipart;
use std::path::Path;
use tokio::fs::File;
use tokio_util::codec::{BytesCodec, FramedRead};

/// Multipart field carrying each view image.
const IMAGE_FIELD: &str = "multi_images";
const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

impl Hitem3dClient {
    /// Submits every image in `image_dir` as one multi-view reconstruction task.
    ///
    /// Parameters are validated and the directory is scanned before any
    /// request is made, so an empty directory never reaches the network.
    ///
    /// # Returns
    ///
    /// The server-issued task id.
    ///
    /// # Errors
    ///
    /// - `Hitem3dError::InvalidParameter` or `Hitem3dError::NoImages` before submission.
    /// - `Hitem3dError::Authentication` if the token exchange fails.
    /// - `Hitem3dError::TokenRejected` if the service refuses the bearer token.
    /// - `Hitem3dError::Submission` for any other rejection or malformed response.
    pub async fn submit_task<P: AsRef<Path>>(
        &self,
        image_dir: P,
        params: &TaskParameters,
    ) -> Result<String, Hitem3dError> {
        params.validate()?;
        let images = ImageSet::from_dir(image_dir).await?;
        self.submit_images(&images, params).await
    }

    /// Submits an already scanned [`ImageSet`].
    pub async fn submit_images(
        &self,
        images: &ImageSet,
        params: &TaskParameters,
    ) -> Result<String, Hitem3dError> {
        params.validate()?;
        let url = self.base_url.join("submit-task")?;
        let token = self.tokens.acquire().await?;

        // The form owns every opened file; they are closed when it is dropped,
        // whichever way this function returns.
        let form = build_form(images, params).await?;

        tracing::info!(images = images.len(), model = %params.model, "Submitting multi-view task");
        let response = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Hitem3dError::Submission {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(match status_error(status, &token, body) {
                Hitem3dError::ApiError { status, message } => Hitem3dError::Submission {
                    message: format!("status {}: {}", status, message),
                },
                auth => auth,
            });
        }

        let task_id = serde_json::from_str::<CodedResponse<SubmitData>>(&body)
            .ok()
            .and_then(CodedResponse::into_success)
            .map(|data| data.task_id);

        match task_id {
            Some(task_id) => {
                tracing::info!(task_id = %task_id, "Task submitted");
                Ok(task_id)
            }
            None => {
                tracing::warn!(body = %body, "Task submission rejected");
                Err(Hitem3dError::Submission { message: body })
            }
        }
    }
}

async fn build_form(
    images: &ImageSet,
    params: &TaskParameters,
) -> Result<multipart::Form, Hitem3dError> {
    let mut form = multipart::Form::new();
    for (name, value) in params.form_fields() {
        form = form.text(name, value);
    }

    for path in images.files() {
        form = form.part(IMAGE_FIELD, image_part(path).await?);
    }
    Ok(form)
}

async fn image_part(path: &Path) -> Result<multipart::Part, Hitem3dError> {
    let file = File::open(path).await?;
    let stream = FramedRead::new(file, BytesCodec::new());
    let body = reqwest::Body::wrap_stream(stream);

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Hitem3dError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Could not determine file name of {}", path.display()),
            ))
        })?
        .to_string();

    let mime_type = mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string());

    Ok(multipart::Part::stream(body)
        .file_name(file_name)
        .mime_str(&mime_type)?)
}
