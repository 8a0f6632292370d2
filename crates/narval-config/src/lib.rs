//! Configuration loading and validation for narval
//!
//! Configuration comes from two layers:
//! - An optional TOML file (versioned schema)
//! - Environment variables set by whatever provisioned the host
//!
//! Environment values win over the file. Validation errors are collected
//! and reported together.

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Environment variables recognised by the overlay
pub mod env {
    pub const GAME: &str = "GAME";
    pub const GAME_DIR: &str = narval_util::GAME_DIR_ENV;
    pub const BUCKET: &str = "BUCKET";
    pub const PREFIX: &str = "PREFIX";
    pub const REGION: &str = "REGION";
    pub const STORE_DIR: &str = "STORE_DIR";
    pub const FACTORIO_VERSION: &str = "FACTORIO_VERSION";
    pub const STARTUP_GRACE: &str = "STARTUP_GRACE";
    pub const MAX_SESSION: &str = "MAX_SESSION";
    pub const SHUTDOWN_GRACE: &str = "SHUTDOWN_GRACE";
    pub const STOP_TIMEOUT: &str = "STOP_TIMEOUT";
    pub const WEBHOOK_URL: &str = "WEBHOOK_URL";
}

/// Load configuration from an optional file plus the process environment
pub fn load_config(path: Option<&Path>) -> ConfigResult<LauncherConfig> {
    let mut raw = match path {
        Some(path) => parse_raw(&std::fs::read_to_string(path)?)?,
        None => RawConfig::default(),
    };
    apply_env(&mut raw, |key| std::env::var(key).ok());
    build_config(raw)
}

/// Parse and validate configuration from a TOML string, without the
/// environment overlay
pub fn parse_config(content: &str) -> ConfigResult<LauncherConfig> {
    build_config(parse_raw(content)?)
}

fn parse_raw(content: &str) -> ConfigResult<RawConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }
    Ok(raw)
}

/// Validate and convert a raw configuration
pub fn build_config(raw: RawConfig) -> ConfigResult<LauncherConfig> {
    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(LauncherConfig::from_raw(raw))
}

/// Overlay environment values onto a raw config. Empty values count as
/// unset.
pub fn apply_env(raw: &mut RawConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = get(env::GAME) {
        raw.launcher.game = Some(v);
    }
    if let Some(v) = get(env::GAME_DIR) {
        raw.launcher.game_dir = Some(v.into());
    }

    if let Some(v) = get(env::BUCKET) {
        raw.store.bucket = Some(v);
        raw.store.kind = Some(RawStoreKind::S3);
    }
    if let Some(v) = get(env::PREFIX) {
        raw.store.prefix = Some(v);
    }
    if let Some(v) = get(env::REGION) {
        raw.store.region = Some(v);
    }
    if let Some(v) = get(env::STORE_DIR) {
        raw.store.path = Some(v.into());
        raw.store.kind = Some(RawStoreKind::Dir);
    }

    if let Some(v) = get(env::FACTORIO_VERSION) {
        raw.server.version = Some(v);
    }
    if let Some(v) = get(env::STARTUP_GRACE) {
        raw.server.startup_grace = Some(v);
    }
    if let Some(v) = get(env::MAX_SESSION) {
        raw.server.max_session = Some(v);
    }
    if let Some(v) = get(env::SHUTDOWN_GRACE) {
        raw.server.shutdown_grace = Some(v);
    }
    if let Some(v) = get(env::STOP_TIMEOUT) {
        raw.server.stop_timeout = Some(v);
    }

    if let Some(v) = get(env::WEBHOOK_URL) {
        raw.notify.webhook_url = Some(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [launcher]
            game = "factorio"
            game_dir = "/srv/game"

            [store]
            kind = "s3"
            bucket = "narval-saves"
            prefix = "guild/channel"
            region = "eu-west-1"

            [server]
            version = "1.1.110"
            startup_grace = "10m"
            max_session = "12h"
            shutdown_grace = "90s"
            stop_timeout = "45s"
            stdin_passthrough = false

            [notify]
            webhook_url = "https://discord.com/api/webhooks/1/abc"
        "#;

        let config = parse_config(config).unwrap();
        assert_eq!(config.game_dir, PathBuf::from("/srv/game"));
        assert_eq!(
            config.store,
            StoreConfig::S3 {
                bucket: "narval-saves".into(),
                prefix: "guild/channel/".into(),
                region: Some("eu-west-1".into()),
            }
        );
        assert_eq!(config.server.version, "1.1.110");
        assert_eq!(config.server.startup_grace, Duration::from_secs(600));
        assert_eq!(config.server.max_session, Duration::from_secs(12 * 3600));
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(90));
        assert_eq!(config.server.stop_timeout, Duration::from_secs(45));
        assert!(!config.server.stdin_passthrough);
        assert!(config.server.echo_output);
        assert!(config.notify.webhook_url.is_some());
    }

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1

            [store]
            path = "/srv/narval"
        "#;

        let config = parse_config(config).unwrap();
        assert_eq!(config.game, DEFAULT_GAME);
        assert_eq!(
            config.store,
            StoreConfig::Dir {
                path: "/srv/narval".into()
            }
        );
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99

            [store]
            bucket = "b"
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn environment_only() {
        let mut raw = RawConfig::default();
        apply_env(
            &mut raw,
            lookup(&[
                ("BUCKET", "narval-saves"),
                ("PREFIX", "123/456"),
                ("FACTORIO_VERSION", "stable"),
                ("MAX_SESSION", "3h"),
                ("SHUTDOWN_GRACE", "not a duration"),
                ("STARTUP_GRACE", ""),
            ]),
        );

        let config = build_config(raw).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::S3 {
                bucket: "narval-saves".into(),
                prefix: "123/456/".into(),
                region: None,
            }
        );
        assert_eq!(config.server.version, "stable");
        assert_eq!(config.server.max_session, Duration::from_secs(3 * 3600));
        assert_eq!(config.server.shutdown_grace, narval_api::DEFAULT_SHUTDOWN_GRACE);
        assert_eq!(config.server.startup_grace, narval_api::DEFAULT_STARTUP_GRACE);
    }

    #[test]
    fn environment_wins_over_file() {
        let mut raw = parse_raw(
            r#"
            config_version = 1

            [store]
            bucket = "from-file"

            [server]
            max_session = "1h"
        "#,
        )
        .unwrap();
        apply_env(
            &mut raw,
            lookup(&[("STORE_DIR", "/tmp/store"), ("MAX_SESSION", "2h")]),
        );

        let config = build_config(raw).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Dir {
                path: "/tmp/store".into()
            }
        );
        assert_eq!(config.server.max_session, Duration::from_secs(7200));
    }

    #[test]
    fn missing_store_fails_validation() {
        let result = build_config(RawConfig::default());
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narval.toml");
        std::fs::write(&path, "config_version = 1\n[store]\npath = \"/srv\"\n").unwrap();

        assert!(load_config(Some(&path)).is_ok());
    }
}
