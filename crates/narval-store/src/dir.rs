//! Local directory artifact store
//!
//! Mirrors the object-store layout on disk: a key `a/b/c` is the file
//! `<root>/a/b/c`. Useful for development and for hosts that keep state on a
//! mounted volume instead of a bucket.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::{
    ensure_folder, validate_key, ArtifactBody, ArtifactReader, ArtifactStore, StoreResult,
};

/// Artifact store rooted at a local directory
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Every regular file under the root, as `/`-separated keys
    async fn walk(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if is_temporary(&path) {
                        continue;
                    }
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        let key = rel
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        keys.push(key);
                    }
                }
            }
        }

        Ok(keys)
    }
}

fn is_temporary(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "partial")
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

#[async_trait]
impl ArtifactStore for DirStore {
    async fn list(&self, prefix: &str) -> StoreResult<BTreeMap<String, String>> {
        let prefix = ensure_folder(prefix);
        let result: BTreeMap<String, String> = self
            .walk()
            .await?
            .into_iter()
            .filter_map(|key| {
                let rel = key.strip_prefix(prefix.as_str())?;
                if rel.is_empty() {
                    return None;
                }
                Some((rel.to_string(), key.clone()))
            })
            .collect();

        debug!(root = %self.root.display(), prefix = %prefix, count = result.len(), "Listed files");
        Ok(result)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ArtifactReader>> {
        validate_key(key)?;
        let path = self.path_for(key);

        match fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::pin(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "File not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: ArtifactBody) -> StoreResult<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = temporary_path(&path);
        let written = match body {
            ArtifactBody::Bytes(bytes) => fs::write(&tmp, bytes).await,
            ArtifactBody::File(src) => fs::copy(&src, &tmp).await.map(|_| ()),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), "File stored");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("dir://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    async fn read_all(mut reader: ArtifactReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path());

        assert!(store.get("state/save.zip").await.unwrap().is_none());
        assert!(store.list("state").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path());

        store
            .put("state/save.zip", ArtifactBody::Bytes(b"world".to_vec()))
            .await
            .unwrap();

        let reader = store.get("state/save.zip").await.unwrap().unwrap();
        assert_eq!(read_all(reader).await, b"world");
        assert!(!dir.path().join("state/save.zip.partial").exists());
    }

    #[tokio::test]
    async fn put_file_body() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("upload.bin");
        std::fs::write(&source, b"archive").unwrap();
        let store = DirStore::new(dir.path().join("store"));

        store
            .put("game.tar.xz", ArtifactBody::File(source))
            .await
            .unwrap();

        let reader = store.get("game.tar.xz").await.unwrap().unwrap();
        assert_eq!(read_all(reader).await, b"archive");
        assert!(store.root().join("game.tar.xz").is_file());
    }

    #[tokio::test]
    async fn list_strips_prefix() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path());

        for key in ["state/save.zip", "state/mods/mod-list.json", "game.tar.xz"] {
            store
                .put(key, ArtifactBody::Bytes(Vec::new()))
                .await
                .unwrap();
        }

        let listed = store.list("state/").await.unwrap();
        let rels: Vec<_> = listed.keys().cloned().collect();
        assert_eq!(rels, vec!["mods/mod-list.json", "save.zip"]);
        assert_eq!(listed["save.zip"], "state/save.zip");
        assert!(store.get(&listed["save.zip"]).await.unwrap().is_some());

        assert_eq!(store.list("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path());

        assert!(store.get("../outside").await.is_err());
        assert!(store
            .put("/abs", ArtifactBody::Bytes(Vec::new()))
            .await
            .is_err());
    }
}
