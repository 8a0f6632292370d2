//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::CURRENT_CONFIG_VERSION;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Which game to run and where
    #[serde(default)]
    pub launcher: RawLauncherConfig,

    /// Artifact store location
    #[serde(default)]
    pub store: RawStoreConfig,

    /// Server lifecycle settings
    #[serde(default)]
    pub server: RawServerConfig,

    /// Chat notification sink
    #[serde(default)]
    pub notify: RawNotifyConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION,
            launcher: RawLauncherConfig::default(),
            store: RawStoreConfig::default(),
            server: RawServerConfig::default(),
            notify: RawNotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLauncherConfig {
    /// Game adapter key (default: factorio)
    pub game: Option<String>,

    /// Local directory holding the game install and state (default: ./game)
    pub game_dir: Option<PathBuf>,
}

/// Store backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawStoreKind {
    S3,
    Dir,
}

/// Store settings. `kind` may be omitted when it is implied by the other
/// fields (`bucket` for S3, `path` for a directory).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStoreConfig {
    pub kind: Option<RawStoreKind>,

    /// S3 bucket name
    pub bucket: Option<String>,

    /// Namespace prefix inside the bucket
    pub prefix: Option<String>,

    /// AWS region (default: from the environment)
    pub region: Option<String>,

    /// Root directory for the `dir` backend
    pub path: Option<PathBuf>,
}

impl RawStoreConfig {
    /// Explicit kind, or the one implied by the fields present
    pub fn resolved_kind(&self) -> Option<RawStoreKind> {
        self.kind.or_else(|| {
            if self.bucket.is_some() {
                Some(RawStoreKind::S3)
            } else if self.path.is_some() {
                Some(RawStoreKind::Dir)
            } else {
                None
            }
        })
    }
}

/// Durations are human-readable strings such as "5m", "24h" or "1m 30s".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServerConfig {
    /// Distribution version selector (default: latest)
    pub version: Option<String>,

    pub startup_grace: Option<String>,
    pub max_session: Option<String>,
    pub shutdown_grace: Option<String>,

    /// Wait after a stop request before the process group is killed
    pub stop_timeout: Option<String>,

    pub stdin_passthrough: Option<bool>,
    pub echo_output: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawNotifyConfig {
    /// Webhook receiving one JSON message per notification
    pub webhook_url: Option<String>,
}
