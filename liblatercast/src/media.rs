//! Media storage abstraction
//!
//! Drafts reference their binary payload through a `media_url`; this module
//! provides the storage behind those URLs. The scheduler and the draft
//! service only ever see `dyn MediaStore`, so tests and deployments can
//! swap the backend without touching the pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use crate::error::{MediaError, Result};
use crate::types::VideoMimeType;

/// An opened media object ready for upload
pub struct MediaObject {
    pub reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    pub len: u64,
    pub content_type: String,
}

/// Storage backend for draft media objects
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store an object under `key` and return the URL to record on the draft
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Delete an object. Returns false if it was already absent; callers
    /// treat that as the delete being satisfied, not as an error.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Open an object for reading
    async fn open_read(&self, key: &str) -> Result<MediaObject>;

    /// Map a stored `media_url` back to the object key, if this store owns it
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Filesystem-backed media store.
///
/// Objects live under `root`, and recorded URLs are `base_url/key` so the
/// key can be recovered from a draft's `media_url` by stripping the prefix.
pub struct FsMediaStore {
    root: PathBuf,
    base_url: String,
}

impl FsMediaStore {
    pub fn new(root: &str, base_url: &str) -> Self {
        Self {
            root: PathBuf::from(shellexpand::tilde(root).to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        // Keys are relative paths like "drafts/{owner}/{uuid}-{name}"; reject
        // anything that could escape the root.
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(MediaError::InvalidKey(key.to_string()).into());
        }
        Ok(self.root.join(key))
    }

    fn content_type_for(path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(VideoMimeType::from_extension)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        let path = self.object_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MediaError::IoError)?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(MediaError::IoError)?;

        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MediaError::IoError(e).into()),
        }
    }

    async fn open_read(&self, key: &str) -> Result<MediaObject> {
        let path = self.object_path(key)?;

        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound(key.to_string()).into());
            }
            Err(e) => return Err(MediaError::IoError(e).into()),
        };

        let len = file.metadata().await.map_err(MediaError::IoError)?.len();

        Ok(MediaObject {
            reader: Box::new(file),
            len,
            content_type: Self::content_type_for(&path),
        })
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/", self.base_url);
        url.strip_prefix(&prefix).map(|key| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn store(temp: &TempDir) -> FsMediaStore {
        FsMediaStore::new(temp.path().to_str().unwrap(), "https://media.example.com")
    }

    #[tokio::test]
    async fn test_put_and_open_read() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let url = store
            .put("drafts/user-1/abc-clip.mp4", b"video bytes", "video/mp4")
            .await
            .unwrap();
        assert_eq!(url, "https://media.example.com/drafts/user-1/abc-clip.mp4");

        let mut object = store.open_read("drafts/user-1/abc-clip.mp4").await.unwrap();
        assert_eq!(object.len, 11);
        assert_eq!(object.content_type, "video/mp4");

        let mut contents = Vec::new();
        object.reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"video bytes");
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store
            .put("drafts/user-1/clip.mp4", b"data", "video/mp4")
            .await
            .unwrap();

        assert!(store.delete("drafts/user-1/clip.mp4").await.unwrap());
        // Second delete: already absent, still satisfied
        assert!(!store.delete("drafts/user-1/clip.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_read_missing() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let result = store.open_read("drafts/user-1/gone.mp4").await;
        assert!(matches!(
            result,
            Err(crate::LatercastError::Media(MediaError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        for key in ["../escape.mp4", "/abs.mp4", "a//b.mp4", ""] {
            let result = store.put(key, b"data", "video/mp4").await;
            assert!(result.is_err(), "key {:?} should be rejected", key);
        }
    }

    #[tokio::test]
    async fn test_key_for_url() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert_eq!(
            store.key_for_url("https://media.example.com/drafts/u/f.mp4"),
            Some("drafts/u/f.mp4".to_string())
        );
        assert_eq!(store.key_for_url("https://elsewhere.example.com/f.mp4"), None);
    }

    #[tokio::test]
    async fn test_unknown_extension_falls_back_to_octet_stream() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.put("drafts/u/raw.bin", b"data", "").await.unwrap();
        let object = store.open_read("drafts/u/raw.bin").await.unwrap();
        assert_eq!(object.content_type, "application/octet-stream");
    }
}
