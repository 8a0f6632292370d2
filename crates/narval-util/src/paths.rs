//! Default paths for narval components
//!
//! The launcher runs on a throwaway compute instance, so everything is
//! relative to the working directory unless overridden:
//! - Config: `$NARVAL_CONFIG` or `./narval.toml`
//! - Game directory: `$GAME_DIR` or `./game`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const NARVAL_CONFIG_ENV: &str = "NARVAL_CONFIG";

/// Environment variable for overriding the local game directory
pub const GAME_DIR_ENV: &str = "GAME_DIR";

const CONFIG_FILENAME: &str = "narval.toml";

const GAME_DIR: &str = "game";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$NARVAL_CONFIG` environment variable (if set)
/// 2. `./narval.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(NARVAL_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    PathBuf::from(CONFIG_FILENAME)
}

/// Default local game directory, relative to the working directory.
/// `$GAME_DIR` is applied by the configuration overlay.
pub fn default_game_dir() -> PathBuf {
    PathBuf::from(GAME_DIR)
}

/// Scratch location for the downloaded distribution archive before it is
/// extracted and cached to the artifact store.
pub fn download_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("narval")
}
