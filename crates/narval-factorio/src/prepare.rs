//! Artifact preparation and state sync
//!
//! Two independent branches run in parallel:
//! - the game distribution: local install, else the store cache, else the
//!   public download (which is then cached to the store)
//! - persistent state: every object under `state/` that has no local copy
//!   is fetched, one job per file
//!
//! Uploads run in the background on a task tracker. [`ArtifactSync::flush`]
//! waits for all of them.

use futures_util::StreamExt;
use narval_core::{extract_archive, ExtractError, JobError, JobRunner};
use narval_store::{ArtifactBody, ArtifactStore, StoreError};
use narval_util::download_scratch_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::layout::{
    download_url, FactorioLayout, DOWNLOAD_BASE, GAME_ARCHIVE_KEY, SAVE_KEY, STATE_PREFIX,
};

/// Preparation errors
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preparation job panicked: {0}")]
    Panicked(String),

    #[error("Preparation job cancelled")]
    Cancelled,
}

pub type PrepareResult<T> = Result<T, PrepareError>;

impl From<JobError<PrepareError>> for PrepareError {
    fn from(err: JobError<PrepareError>) -> Self {
        match err {
            JobError::Failed(e) => e,
            JobError::Panicked(msg) => PrepareError::Panicked(msg),
            JobError::Cancelled => PrepareError::Cancelled,
        }
    }
}

/// Moves artifacts between the store and the local game directory
#[derive(Clone)]
pub struct ArtifactSync {
    store: Arc<dyn ArtifactStore>,
    layout: FactorioLayout,
    http: reqwest::Client,
    download_base: String,
    uploads: TaskTracker,
}

impl ArtifactSync {
    pub fn new(store: Arc<dyn ArtifactStore>, layout: FactorioLayout) -> Self {
        Self {
            store,
            layout,
            http: reqwest::Client::new(),
            download_base: DOWNLOAD_BASE.to_string(),
            uploads: TaskTracker::new(),
        }
    }

    /// Fetch the distribution from another server
    pub fn with_download_base(mut self, base: impl Into<String>) -> Self {
        self.download_base = base.into();
        self
    }

    pub fn layout(&self) -> &FactorioLayout {
        &self.layout
    }

    pub fn describe_store(&self) -> String {
        self.store.describe()
    }

    /// Make the game binary and persistent state available locally
    pub async fn prepare(&self, version: &str) -> PrepareResult<()> {
        let mut jobs: JobRunner<PrepareError> = JobRunner::new();

        {
            let sync = self.clone();
            let version = version.to_string();
            jobs.add(move || async move { sync.ensure_game(&version).await });
        }
        {
            let sync = self.clone();
            jobs.add(move || async move { sync.ensure_state().await });
        }

        jobs.join().await?;
        info!(game_dir = %self.layout.game_dir().display(), "Artifacts ready");
        Ok(())
    }

    /// Install the game distribution unless it is already present
    pub async fn ensure_game(&self, version: &str) -> PrepareResult<()> {
        let binary = self.layout.binary();
        if fs::try_exists(&binary).await? {
            debug!(binary = %binary.display(), "Game already installed");
            return Ok(());
        }

        if let Some(reader) = self.store.get(GAME_ARCHIVE_KEY).await? {
            info!(store = %self.store.describe(), "Installing game from store cache");
            extract_archive(reader, self.layout.game_dir()).await?;
            return Ok(());
        }

        let url = download_url(&self.download_base, version);
        let archive = download(&self.http, &url).await?;
        let reader = fs::File::open(&archive).await?;
        extract_archive(reader, self.layout.game_dir()).await?;

        // Cache for the next run; the temporary file goes away once uploaded
        let store = self.store.clone();
        self.uploads.spawn(async move {
            let path = archive.to_path_buf();
            match store.put(GAME_ARCHIVE_KEY, ArtifactBody::File(path)).await {
                Ok(()) => info!(key = GAME_ARCHIVE_KEY, "Cached game distribution"),
                Err(e) => warn!(key = GAME_ARCHIVE_KEY, error = %e, "Failed to cache game distribution"),
            }
            drop(archive);
        });

        Ok(())
    }

    /// Fetch every state file that has no local copy
    pub async fn ensure_state(&self) -> PrepareResult<()> {
        let listed = self.store.list(STATE_PREFIX).await?;
        let mut jobs: JobRunner<PrepareError> = JobRunner::new();

        for (rel, key) in listed.iter() {
            if rel.ends_with('/') {
                debug!(key = %key, "Skipping folder marker");
                continue;
            }

            let local = self.layout.state_file(rel);
            if fs::try_exists(&local).await? {
                debug!(path = %local.display(), "State file present");
                continue;
            }

            let store = self.store.clone();
            let key = key.clone();
            jobs.add(move || async move { fetch_state_file(store, &key, &local).await });
        }

        let fetched = jobs.len();
        jobs.join().await?;
        debug!(listed = listed.len(), fetched, "State files synced");
        Ok(())
    }

    /// Push the local save to the store
    pub async fn upload_save(&self) -> PrepareResult<()> {
        let save = self.layout.save();
        self.store
            .put(SAVE_KEY, ArtifactBody::File(save.clone()))
            .await?;
        info!(key = SAVE_KEY, path = %save.display(), "Uploaded save");
        Ok(())
    }

    /// Upload the save in the background
    pub fn spawn_save_upload(&self) {
        let sync = self.clone();
        self.uploads.spawn(async move {
            if let Err(e) = sync.upload_save().await {
                warn!(error = %e, "Failed to upload save");
            }
        });
    }

    /// Wait for every upload started so far
    pub async fn flush(&self) {
        let pending = self.uploads.len();
        if pending > 0 {
            debug!(pending, "Waiting for uploads");
        }
        self.uploads.close();
        self.uploads.wait().await;
        self.uploads.reopen();
    }
}

async fn download(http: &reqwest::Client, url: &str) -> PrepareResult<tempfile::TempPath> {
    info!(url = %url, "Downloading game distribution");

    let scratch = download_scratch_dir();
    fs::create_dir_all(&scratch).await?;
    let path = tempfile::Builder::new()
        .prefix("game-")
        .suffix(".tar.xz")
        .tempfile_in(&scratch)?
        .into_temp_path();

    let response = http.get(url).send().await?.error_for_status()?;
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(&path).await?;
    let mut bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        bytes += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    info!(url = %url, bytes, "Download complete");
    Ok(path)
}

async fn fetch_state_file(
    store: Arc<dyn ArtifactStore>,
    key: &str,
    local: &Path,
) -> PrepareResult<()> {
    let Some(mut reader) = store.get(key).await? else {
        debug!(key = %key, "State file vanished from store");
        return Ok(());
    };

    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = partial_path(local);
    let mut file = fs::File::create(&tmp).await?;
    let copied = match tokio::io::copy(&mut reader, &mut file).await {
        Ok(n) => n,
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
    };
    file.flush().await?;
    drop(file);
    fs::rename(&tmp, local).await?;

    info!(key = %key, path = %local.display(), bytes = copied, "Fetched state file");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use narval_store::{ArtifactReader, DirStore, StoreResult};
    use std::collections::BTreeMap;
    use std::io::Write;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const BINARY: &[u8] = b"#!/bin/sh\nexit 0\n";

    fn game_archive() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(BINARY.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, "factorio/bin/x64/factorio", BINARY)
            .unwrap();
        let tar_bytes = builder.into_inner().unwrap();

        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn setup() -> (tempfile::TempDir, Arc<dyn ArtifactStore>, ArtifactSync) {
        let dir = tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::new(DirStore::new(dir.path().join("store")));
        let sync = ArtifactSync::new(store.clone(), FactorioLayout::new(dir.path().join("game")));
        (dir, store, sync)
    }

    /// Serve one HTTP response and report the request line
    async fn serve_once(body: Vec<u8>) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/get-download", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.flush().await.unwrap();

            let request = String::from_utf8_lossy(&request).into_owned();
            request.lines().next().unwrap_or_default().to_string()
        });

        (base, handle)
    }

    /// Store whose listing contains a folder marker
    struct FolderMarkerStore;

    #[async_trait]
    impl ArtifactStore for FolderMarkerStore {
        async fn list(&self, _prefix: &str) -> StoreResult<BTreeMap<String, String>> {
            Ok(BTreeMap::from([
                ("factorio/".to_string(), "state/factorio/".to_string()),
                ("save.zip".to_string(), "state/save.zip".to_string()),
            ]))
        }

        async fn get(&self, key: &str) -> StoreResult<Option<ArtifactReader>> {
            assert_eq!(key, "state/save.zip");
            Ok(Some(Box::pin(std::io::Cursor::new(b"remote save".to_vec()))))
        }

        async fn put(&self, _key: &str, _body: ArtifactBody) -> StoreResult<()> {
            Ok(())
        }

        fn describe(&self) -> String {
            "marker://".into()
        }
    }

    #[tokio::test]
    async fn installed_game_and_empty_state() {
        let (_dir, _store, sync) = setup();
        let binary = sync.layout().binary();
        std::fs::create_dir_all(binary.parent().unwrap()).unwrap();
        std::fs::write(&binary, b"").unwrap();

        sync.prepare("latest").await.unwrap();
    }

    #[tokio::test]
    async fn game_from_store_cache() {
        let (_dir, store, sync) = setup();
        store
            .put(GAME_ARCHIVE_KEY, ArtifactBody::Bytes(game_archive()))
            .await
            .unwrap();

        sync.ensure_game("latest").await.unwrap();

        assert_eq!(std::fs::read(sync.layout().binary()).unwrap(), BINARY);
    }

    #[tokio::test]
    async fn game_downloaded_and_cached() {
        let (_dir, store, sync) = setup();
        let (base, server) = serve_once(game_archive()).await;
        let sync = sync.with_download_base(base);

        sync.ensure_game("1.1.110").await.unwrap();
        assert_eq!(
            server.await.unwrap(),
            "GET /get-download/1.1.110/headless/linux64 HTTP/1.1"
        );
        assert_eq!(std::fs::read(sync.layout().binary()).unwrap(), BINARY);

        sync.flush().await;
        let listed = store.list("").await.unwrap();
        assert!(listed.contains_key(GAME_ARCHIVE_KEY));

        let mut cached = Vec::new();
        store
            .get(GAME_ARCHIVE_KEY)
            .await
            .unwrap()
            .unwrap()
            .read_to_end(&mut cached)
            .await
            .unwrap();
        assert_eq!(cached, game_archive());
    }

    #[tokio::test]
    async fn missing_state_files_are_fetched() {
        let (_dir, store, sync) = setup();
        store
            .put("state/save.zip", ArtifactBody::Bytes(b"remote save".to_vec()))
            .await
            .unwrap();
        store
            .put(
                "state/factorio/mods/mod-list.json",
                ArtifactBody::Bytes(b"{\"mods\":[]}".to_vec()),
            )
            .await
            .unwrap();

        sync.ensure_state().await.unwrap();

        let layout = sync.layout();
        assert_eq!(std::fs::read(layout.save()).unwrap(), b"remote save");
        assert_eq!(
            std::fs::read(layout.state_file("factorio/mods/mod-list.json")).unwrap(),
            b"{\"mods\":[]}"
        );
        assert!(!partial_path(&layout.save()).exists());
    }

    #[tokio::test]
    async fn folder_markers_are_skipped() {
        let dir = tempdir().unwrap();
        let sync = ArtifactSync::new(
            Arc::new(FolderMarkerStore),
            FactorioLayout::new(dir.path().join("game")),
        );

        sync.ensure_state().await.unwrap();

        assert_eq!(std::fs::read(sync.layout().save()).unwrap(), b"remote save");
        assert!(!dir.path().join("game/factorio").exists());
        assert!(!dir.path().join("game/factorio.partial").exists());
    }

    #[tokio::test]
    async fn local_state_is_kept() {
        let (_dir, store, sync) = setup();
        store
            .put("state/save.zip", ArtifactBody::Bytes(b"remote save".to_vec()))
            .await
            .unwrap();
        std::fs::create_dir_all(sync.layout().game_dir()).unwrap();
        std::fs::write(sync.layout().save(), b"local save").unwrap();

        sync.ensure_state().await.unwrap();

        assert_eq!(std::fs::read(sync.layout().save()).unwrap(), b"local save");
    }

    #[tokio::test]
    async fn corrupt_cached_archive_fails_preparation() {
        let (_dir, store, sync) = setup();
        store
            .put(GAME_ARCHIVE_KEY, ArtifactBody::Bytes(b"garbage".to_vec()))
            .await
            .unwrap();

        let result = sync.prepare("latest").await;
        assert!(matches!(result, Err(PrepareError::Extract(_))));
    }

    #[tokio::test]
    async fn background_save_upload_is_flushed() {
        let (_dir, store, sync) = setup();
        std::fs::create_dir_all(sync.layout().game_dir()).unwrap();
        std::fs::write(sync.layout().save(), vec![7u8; 4 << 20]).unwrap();

        sync.spawn_save_upload();
        sync.flush().await;

        let listed = store.list(STATE_PREFIX).await.unwrap();
        assert_eq!(listed.get("save.zip").map(String::as_str), Some(SAVE_KEY));

        // The tracker accepts new uploads after a flush
        sync.spawn_save_upload();
        sync.flush().await;
    }
}
