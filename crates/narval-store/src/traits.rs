//! Store trait definitions

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::{StoreError, StoreResult};

/// Streamed object content
pub type ArtifactReader = Pin<Box<dyn AsyncRead + Send>>;

/// Content to upload
#[derive(Debug, Clone)]
pub enum ArtifactBody {
    /// In-memory bytes
    Bytes(Vec<u8>),
    /// Contents of a local file, streamed from disk
    File(PathBuf),
}

/// Artifact store scoped to a root prefix.
///
/// Callers only ever supply keys relative to the root; the namespace prefix
/// is applied by the implementation.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// List every object under `prefix`, mapping the key relative to
    /// `prefix` to the key relative to the store root, which is what `get`
    /// and `put` accept. Pagination is handled internally. An empty prefix
    /// lists the whole namespace.
    ///
    /// Folder markers (zero-byte objects whose key ends in `/`) are not
    /// objects and never appear.
    async fn list(&self, prefix: &str) -> StoreResult<BTreeMap<String, String>>;

    /// Stream an object. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> StoreResult<Option<ArtifactReader>>;

    /// Store an object, replacing any existing one
    async fn put(&self, key: &str, body: ArtifactBody) -> StoreResult<()>;

    /// Short backend description for logs
    fn describe(&self) -> String;
}

/// Normalize a prefix so it names a folder: non-empty prefixes end in `/`.
pub fn ensure_folder(prefix: &str) -> String {
    if !prefix.is_empty() && !prefix.ends_with('/') {
        format!("{}/", prefix)
    } else {
        prefix.to_string()
    }
}

/// Reject keys that could escape the namespace
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("empty key".into()));
    }
    if key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
