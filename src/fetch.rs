//! Model artifact download.

use crate::client::Hitem3dClient;
use crate::error::Hitem3dError;
use crate::types::extension_for_format_code;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Size of the buffer that downloaded bytes pass through on their way to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// The canonical artifact name for a task, e.g. `result_abc123.glb`.
pub fn result_file_name(task_id: &str, format_code: &str) -> String {
    format!("result_{}.{}", task_id, extension_for_format_code(format_code))
}

impl Hitem3dClient {
    /// Downloads a finished model to `output_dir/result_<task_id>.<ext>`.
    ///
    /// The body is streamed into a temporary file next to the destination and
    /// only renamed onto the canonical name once every byte has arrived, so an
    /// interrupted transfer never leaves a file that looks complete. An existing
    /// artifact with the same name is replaced.
    ///
    /// # Arguments
    ///
    /// * `url` - The model URL reported by the finished task.
    /// * `output_dir` - Destination directory, created if missing.
    /// * `format_code` - The task's format code; unknown codes save as `.glb`.
    /// * `task_id` - The task the model belongs to.
    ///
    /// # Errors
    ///
    /// `Hitem3dError::Download` for a non-success status, a broken stream, a
    /// short body, or when `output_dir` or the file in it cannot be written.
    pub async fn download_model<P: AsRef<Path>>(
        &self,
        url: &str,
        output_dir: P,
        format_code: &str,
        task_id: &str,
    ) -> Result<PathBuf, Hitem3dError> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| write_error(output_dir, e))?;
        let file_path = output_dir.join(result_file_name(task_id, format_code));

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Hitem3dError::Download {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Hitem3dError::Download {
                message: format!("Failed to download file: status {}", response.status()),
            });
        }
        let expected_len = response.content_length();

        // Removed on drop unless persisted below.
        let partial = tempfile::Builder::new()
            .prefix(".result_")
            .suffix(".part")
            .tempfile_in(output_dir)
            .map_err(|e| write_error(output_dir, e))?
            .into_temp_path();

        let file = fs::File::create(&partial)
            .await
            .map_err(|e| write_error(&partial, e))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Hitem3dError::Download {
                message: format!("Download interrupted after {} bytes: {}", written, e),
            })?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| write_error(&partial, e))?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(|e| write_error(&partial, e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| write_error(&partial, e))?;

        if let Some(expected) = expected_len {
            if written != expected {
                return Err(Hitem3dError::Download {
                    message: format!("Expected {} bytes but received {}", expected, written),
                });
            }
        }

        partial
            .persist(&file_path)
            .map_err(|e| write_error(&file_path, e.error))?;
        tracing::info!(task_id, path = %file_path.display(), bytes = written, "Model downloaded");

        Ok(file_path)
    }
}

fn write_error(path: &Path, e: std::io::Error) -> Hitem3dError {
    Hitem3dError::Download {
        message: format!("Cannot write {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_depends_only_on_format_code() {
        assert_eq!(result_file_name("t1", "1"), "result_t1.obj");
        assert_eq!(result_file_name("t1", "3"), "result_t1.stl");
        assert_eq!(result_file_name("t1", "9"), "result_t1.glb");
    }
}
