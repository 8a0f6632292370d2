//! Streaming `.tar.xz` extraction
//!
//! The archive is decoded entry by entry on a blocking thread, reading from
//! the async source through [`SyncIoBridge`]; nothing is buffered beyond the
//! decoder's window.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Unsafe entry path: {0}")]
    UnsafePath(PathBuf),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// What an extraction wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    pub skipped: usize,
}

/// Decompress and unpack a `.tar.xz` stream under `dest`.
///
/// Regular files keep their relative path and mode. Directories are created
/// as needed. Other entry kinds (links, devices) are skipped.
pub async fn extract_archive<R>(reader: R, dest: &Path) -> ExtractResult<ExtractReport>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let bridge = SyncIoBridge::new(reader);
    let dest = dest.to_path_buf();

    let report = tokio::task::spawn_blocking(move || unpack(bridge, &dest))
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))??;

    info!(
        files = report.files,
        directories = report.directories,
        bytes = report.bytes,
        skipped = report.skipped,
        "Archive extracted"
    );
    Ok(report)
}

/// Blocking counterpart of [`extract_archive`]
pub fn unpack<R: Read>(reader: R, dest: &Path) -> ExtractResult<ExtractReport> {
    let mut archive = tar::Archive::new(XzDecoder::new(reader));
    let mut made_dirs: HashSet<PathBuf> = HashSet::new();
    let mut report = ExtractReport::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.into_owned();
        let target = dest.join(checked_relative(&rel)?);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            if made_dirs.insert(target.clone()) {
                fs::create_dir_all(&target)?;
            }
            report.directories += 1;
        } else if entry_type.is_file() {
            if let Some(parent) = target.parent() {
                if made_dirs.insert(parent.to_path_buf()) {
                    fs::create_dir_all(parent)?;
                }
            }

            let mode = entry.header().mode().unwrap_or(0o644) & 0o7777;
            let expected = entry.size();
            let copied = write_file(&mut entry, &target, mode)?;
            if copied != expected {
                let _ = fs::remove_file(&target);
                return Err(ExtractError::SizeMismatch {
                    path: rel,
                    expected,
                    actual: copied,
                });
            }

            report.files += 1;
            report.bytes += copied;
        } else {
            debug!(path = %rel.display(), kind = ?entry_type, "Skipping archive entry");
            report.skipped += 1;
        }
    }

    Ok(report)
}

fn write_file(source: &mut impl Read, target: &Path, mode: u32) -> ExtractResult<u64> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(target)?;

    match io::copy(source, &mut file) {
        Ok(n) => Ok(n),
        Err(e) => {
            drop(file);
            if let Err(rm) = fs::remove_file(target) {
                warn!(path = %target.display(), error = %rm, "Failed to remove partial file");
            }
            Err(e.into())
        }
    }
}

/// Strip `.` components and reject anything that could land outside the
/// destination.
fn checked_relative(path: &Path) -> ExtractResult<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::UnsafePath(path.to_path_buf()));
            }
        }
    }
    Ok(clean)
}
