use std::path::{Path, PathBuf};

use anyhow::Result;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Keep only the final path component and characters that are safe in a
/// filename, so a submitted name can never escape the upload directory.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

/// Blob store for book cover images, backed by a public static directory.
/// Stored names are unique per upload; the original name is kept as a suffix
/// for humans browsing the directory.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(ImageStore { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the image and returns its generated name, or None when the
    /// extension is not an allowed image type. Disallowed files are dropped
    /// silently; the owning book is simply stored without an image.
    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<Option<String>> {
        if !allowed_file(filename) {
            tracing::info!("dropping upload with disallowed extension: {}", filename);
            return Ok(None);
        }

        let unique_name = format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(filename));
        tokio::fs::write(self.dir.join(&unique_name), data).await?;
        Ok(Some(unique_name))
    }

    /// Deletes a stored image by its generated name. Already-absent files
    /// are fine; removal is idempotent.
    pub async fn remove(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
