//! Shared types for the narval launcher

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A player, identified by the name the game server prints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct User(String);

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for User {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for User {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Default idle budget after the server starts
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(5 * 60);

/// Default hard cap on a server's lifetime
pub const DEFAULT_MAX_SESSION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default delay between the last player leaving and shutdown
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// Default wait after a stop request before the process group is killed
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default distribution version selector
pub const DEFAULT_VERSION: &str = "latest";

/// Settings for one server run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Selects the distribution download URL
    pub version: String,

    /// Initial idle budget before anyone has joined
    pub startup_grace: Duration,

    /// Absolute cap on the session, regardless of activity
    pub max_session: Duration,

    /// Idle-to-shutdown delay once the last player leaves
    pub shutdown_grace: Duration,

    /// Wait after a stop request before forcing the process down
    pub stop_timeout: Duration,

    /// Forward the launcher's stdin to the server console
    pub stdin_passthrough: bool,

    /// Echo server output on the launcher's stdout
    pub echo_output: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            startup_grace: DEFAULT_STARTUP_GRACE,
            max_session: DEFAULT_MAX_SESSION,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            stdin_passthrough: true,
            echo_output: true,
        }
    }
}
