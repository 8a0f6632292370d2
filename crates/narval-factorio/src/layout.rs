//! Local and remote artifact locations

use std::path::{Path, PathBuf};

/// Store key of the cached game distribution
pub const GAME_ARCHIVE_KEY: &str = "game.tar.xz";

/// Store prefix of persistent state, mirrored under the game directory
pub const STATE_PREFIX: &str = "state/";

/// Store key of the save file
pub const SAVE_KEY: &str = "state/save.zip";

/// Official distribution server
pub const DOWNLOAD_BASE: &str = "https://factorio.com/get-download";

/// Headless distribution for a version selector ("latest", "stable", or an
/// exact version) under a download base
pub fn download_url(base: &str, version: &str) -> String {
    format!("{}/{}/headless/linux64", base.trim_end_matches('/'), version)
}

/// Where the game lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorioLayout {
    game_dir: PathBuf,
}

impl FactorioLayout {
    pub fn new(game_dir: impl Into<PathBuf>) -> Self {
        Self {
            game_dir: game_dir.into(),
        }
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Headless server executable
    pub fn binary(&self) -> PathBuf {
        self.game_dir.join("factorio/bin/x64/factorio")
    }

    pub fn save(&self) -> PathBuf {
        self.game_dir.join("save.zip")
    }

    /// Local counterpart of a key relative to [`STATE_PREFIX`]
    pub fn state_file(&self, rel: &str) -> PathBuf {
        self.game_dir.join(rel)
    }
}
