//! Blob storage for uploaded images.
//!
//! Uploads are chunked and resumable: bytes are appended to a `.part` file and
//! an interrupted upload for the same object continues from the bytes already
//! written. Layout under the root directory:
//! ```text
//! <ROOT>/
//!   profile_pictures/<uid>/<file>
//!   blog_images/<file>
//! ```

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use super::StoreError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes transferred so far for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    pub transferred: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Completion percentage, 0-100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.transferred.min(self.total) * 100) / self.total) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.transferred >= self.total
    }
}

/// Object storage with resumable uploads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` to `object`, reporting progress after every chunk.
    /// Returns the download URL of the stored object.
    async fn upload(
        &self,
        object: &str,
        bytes: &[u8],
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<String, StoreError>;
}

/// Filesystem-backed [`BlobStore`].
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves an object name to a path under the root, rejecting escapes.
    fn object_path(&self, object: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(object);
        let valid = !object.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidPath(object.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn part_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("I/O error for {}: {}", path.display(), e))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        object: &str,
        bytes: &[u8],
        progress: &watch::Sender<UploadProgress>,
    ) -> Result<String, StoreError> {
        let path = self.object_path(object)?;
        let part = Self::part_path(&path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let total = bytes.len() as u64;
        let mut offset = match fs::metadata(&part).await {
            Ok(meta) if meta.len() <= total => meta.len(),
            _ => 0,
        };
        if offset > 0 {
            tracing::debug!(object, offset, total, "resuming upload");
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(offset == 0)
            .append(offset > 0)
            .open(&part)
            .await
            .map_err(|e| io_error(&part, e))?;

        progress.send_replace(UploadProgress {
            transferred: offset,
            total,
        });

        for chunk in bytes[offset as usize..].chunks(CHUNK_SIZE) {
            file.write_all(chunk)
                .await
                .map_err(|e| io_error(&part, e))?;
            offset += chunk.len() as u64;
            progress.send_replace(UploadProgress {
                transferred: offset,
                total,
            });
        }
        file.flush().await.map_err(|e| io_error(&part, e))?;
        drop(file);

        fs::rename(&part, &path)
            .await
            .map_err(|e| io_error(&path, e))?;
        tracing::info!(object, bytes = total, "upload complete");
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_reports_progress_and_writes_file() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        let (tx, rx) = watch::channel(UploadProgress::default());

        let bytes = vec![7u8; CHUNK_SIZE * 2 + 10];
        let url = store
            .upload("profile_pictures/u1/me.png", &bytes, &tx)
            .await
            .unwrap();

        let stored = temp.path().join("profile_pictures/u1/me.png");
        assert_eq!(url, format!("file://{}", stored.display()));
        assert_eq!(std::fs::read(&stored).unwrap(), bytes);
        assert!(rx.borrow().is_complete());
        assert_eq!(rx.borrow().percent(), 100);
    }

    #[tokio::test]
    async fn test_upload_resumes_from_part_file() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        let (tx, _rx) = watch::channel(UploadProgress::default());

        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let dir = temp.path().join("blog_images");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("post.jpg.part"), &bytes[..400]).unwrap();

        store.upload("blog_images/post.jpg", &bytes, &tx).await.unwrap();

        assert_eq!(std::fs::read(dir.join("post.jpg")).unwrap(), bytes);
        assert!(!dir.join("post.jpg.part").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp.path());
        let (tx, _rx) = watch::channel(UploadProgress::default());

        for object in ["", "../evil", "/etc/passwd", "a/../../b"] {
            let result = store.upload(object, b"x", &tx).await;
            assert!(matches!(result, Err(StoreError::InvalidPath(_))), "{object}");
        }
    }

    #[test]
    fn test_progress_percent() {
        let progress = UploadProgress {
            transferred: 25,
            total: 100,
        };
        assert_eq!(progress.percent(), 25);
        assert!(!progress.is_complete());
        assert_eq!(UploadProgress::default().percent(), 100);
    }
}
