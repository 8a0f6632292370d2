//! Configuration validation

use crate::schema::{RawConfig, RawStoreKind};
use std::time::Duration;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Missing required field '{section}.{field}'")]
    MissingField { section: String, field: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("No artifact store configured (set store.bucket or store.path)")]
    NoStore,
}

impl ValidationError {
    fn missing(section: &str, field: &str) -> Self {
        Self::MissingField {
            section: section.into(),
            field: field.into(),
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(game) = &config.launcher.game {
        if game.trim().is_empty() {
            errors.push(ValidationError::invalid("launcher.game", "cannot be empty"));
        }
    }

    let store = &config.store;
    match store.resolved_kind() {
        None => errors.push(ValidationError::NoStore),
        Some(RawStoreKind::S3) => {
            if store.bucket.as_deref().is_none_or(|b| b.trim().is_empty()) {
                errors.push(ValidationError::missing("store", "bucket"));
            }
            if store.prefix.as_deref().is_some_and(|p| p.starts_with('/')) {
                errors.push(ValidationError::invalid(
                    "store.prefix",
                    "must be relative to the bucket root",
                ));
            }
        }
        Some(RawStoreKind::Dir) => {
            if store.path.is_none() {
                errors.push(ValidationError::missing("store", "path"));
            }
        }
    }

    if let Some(version) = &config.server.version {
        if version.trim().is_empty() || version.contains('/') {
            errors.push(ValidationError::invalid(
                "server.version",
                format!("'{}' is not a version selector", version),
            ));
        }
    }

    if let Some(url) = &config.notify.webhook_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ValidationError::invalid(
                "notify.webhook_url",
                "must be an http(s) URL",
            ));
        }
    }

    errors
}

/// Parse a human-readable duration ("90s", "5m", "24h", "1h 30m")
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value.trim()).map_err(|e| e.to_string())
}
