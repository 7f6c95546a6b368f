//! Input image discovery and per-submission staging.

use crate::error::Hitem3dError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File extensions accepted as input views, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// A non-empty, ordered set of view images taken from one directory.
///
/// Files are sorted by name so repeated scans of the same directory upload
/// the views in the same order.
#[derive(Debug, Clone)]
pub struct ImageSet {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl ImageSet {
    /// Scans `dir` (non-recursively) for image files.
    ///
    /// # Errors
    ///
    /// `Hitem3dError::NoImages` if the directory is missing, unreadable, or has no images.
    pub async fn from_dir(dir: impl AsRef<Path>) -> Result<Self, Hitem3dError> {
        let dir = dir.as_ref().to_path_buf();
        let no_images = || Hitem3dError::NoImages { dir: dir.clone() };

        let mut entries = fs::read_dir(&dir).await.map_err(|_| no_images())?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_image_path(&path) && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(no_images());
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(Self { dir, files })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Loose image files copied into a private temporary directory.
///
/// Each staging gets its own uniquely named directory, removed when the value
/// is dropped, so concurrent submissions never see each other's inputs.
#[derive(Debug)]
pub struct StagedImages {
    // Held for its drop, which deletes the directory.
    _dir: tempfile::TempDir,
    images: ImageSet,
}

impl StagedImages {
    /// Copies every image among `files` into a fresh staging directory.
    ///
    /// Non-image paths are skipped. Files that share a name (say `front.jpg`
    /// from two folders) are all kept; later ones are staged as `front_2.jpg`,
    /// `front_3.jpg` and so on.
    pub async fn stage<P: AsRef<Path>>(files: &[P]) -> Result<Self, Hitem3dError> {
        let dir = tempfile::Builder::new()
            .prefix("hitem3d_upload_")
            .tempdir()?;

        let mut taken = HashSet::new();
        let mut copied = 0usize;
        for file in files {
            let file = file.as_ref();
            let Some(name) = file.file_name() else {
                continue;
            };
            if !is_image_path(file) {
                tracing::debug!(path = %file.display(), "Skipping non-image upload");
                continue;
            }
            let staged_name = unique_name(Path::new(name), &mut taken);
            fs::copy(file, dir.path().join(staged_name)).await?;
            copied += 1;
        }
        tracing::debug!(dir = %dir.path().display(), copied, "Staged input images");

        let images = ImageSet::from_dir(dir.path()).await?;
        Ok(Self { _dir: dir, images })
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }
}

/// Returns `name`, or `<stem>_<n>.<ext>` if it is already in `taken`.
///
/// Names are compared case-insensitively so staging behaves the same on
/// case-insensitive file systems.
fn unique_name(name: &Path, taken: &mut HashSet<String>) -> String {
    let original = name.to_string_lossy().into_owned();
    if taken.insert(original.to_lowercase()) {
        return original;
    }

    let stem = name.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy()).unwrap_or_default();
    let mut n = 2usize;
    loop {
        let candidate = format!("{}_{}.{}", stem, n, ext);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
