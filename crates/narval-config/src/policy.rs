//! Validated launcher configuration

use crate::schema::{RawConfig, RawServerConfig, RawStoreConfig, RawStoreKind};
use crate::validation::parse_duration;
use narval_api::{
    ServerSettings, DEFAULT_MAX_SESSION, DEFAULT_SHUTDOWN_GRACE, DEFAULT_STARTUP_GRACE,
    DEFAULT_STOP_TIMEOUT, DEFAULT_VERSION,
};
use narval_util::default_game_dir;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default game adapter
pub const DEFAULT_GAME: &str = "factorio";

/// Validated configuration ready for use by the launcher
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Game adapter key
    pub game: String,

    /// Local directory holding the game install and its state files
    pub game_dir: PathBuf,

    pub store: StoreConfig,

    pub server: ServerSettings,

    pub notify: NotifyConfig,
}

/// Where artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    S3 {
        bucket: String,
        /// Always empty or ending in `/`
        prefix: String,
        region: Option<String>,
    },
    Dir {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

impl LauncherConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            game: raw
                .launcher
                .game
                .map(|g| g.trim().to_string())
                .unwrap_or_else(|| DEFAULT_GAME.to_string()),
            game_dir: raw.launcher.game_dir.unwrap_or_else(default_game_dir),
            store: StoreConfig::from_raw(raw.store),
            server: convert_server(raw.server),
            notify: NotifyConfig {
                webhook_url: raw.notify.webhook_url,
            },
        }
    }
}

impl StoreConfig {
    fn from_raw(raw: RawStoreConfig) -> Self {
        match raw.resolved_kind() {
            Some(RawStoreKind::Dir) => StoreConfig::Dir {
                path: raw.path.unwrap_or_default(),
            },
            Some(RawStoreKind::S3) | None => StoreConfig::S3 {
                bucket: raw.bucket.unwrap_or_default().trim().to_string(),
                prefix: normalize_prefix(raw.prefix.as_deref().unwrap_or("")),
                region: raw.region.filter(|r| !r.is_empty()),
            },
        }
    }
}

/// Ensure a non-empty prefix ends with `/`
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

fn convert_server(raw: RawServerConfig) -> ServerSettings {
    let defaults = ServerSettings::default();
    ServerSettings {
        version: raw
            .version
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        startup_grace: duration_or_default(
            "startup_grace",
            raw.startup_grace.as_deref(),
            DEFAULT_STARTUP_GRACE,
        ),
        max_session: duration_or_default(
            "max_session",
            raw.max_session.as_deref(),
            DEFAULT_MAX_SESSION,
        ),
        shutdown_grace: duration_or_default(
            "shutdown_grace",
            raw.shutdown_grace.as_deref(),
            DEFAULT_SHUTDOWN_GRACE,
        ),
        stop_timeout: duration_or_default(
            "stop_timeout",
            raw.stop_timeout.as_deref(),
            DEFAULT_STOP_TIMEOUT,
        ),
        stdin_passthrough: raw.stdin_passthrough.unwrap_or(defaults.stdin_passthrough),
        echo_output: raw.echo_output.unwrap_or(defaults.echo_output),
    }
}

/// Unset or unparsable durations fall back to the default
fn duration_or_default(field: &str, value: Option<&str>, default: Duration) -> Duration {
    let Some(value) = value else {
        return default;
    };
    match parse_duration(value) {
        Ok(duration) => duration,
        Err(e) => {
            warn!(
                field,
                value,
                error = %e,
                default = %humantime::format_duration(default),
                "Unparsable duration, using default"
            );
            default
        }
    }
}
