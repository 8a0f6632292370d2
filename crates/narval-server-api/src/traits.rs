//! Game server adapter traits

use async_trait::async_trait;
use narval_api::{EventKind, ParsedLine, ServerSettings};
use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of the parsed-line channel between the stdout reader and the
/// launcher. Large enough to absorb a burst without stalling the game.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Errors from game server operations
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Prepare failed: {0}")]
    PrepareFailed(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(EventKind),

    #[error("Server not started")]
    NotStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Capability set of one supervised game server.
///
/// Lifecycle: `prepare` → `start` → consume `subscribe()` until the channel
/// closes, which means the server process has exited.
#[async_trait]
pub trait Server: Send + Sync {
    /// Short game name used in logs
    fn name(&self) -> &str;

    /// Make the binary and persistent state available locally
    async fn prepare(&mut self, settings: &ServerSettings) -> ServerResult<()>;

    /// Spawn the server process and its supervision tasks. Returns as soon as
    /// the process is running.
    async fn start(&mut self, settings: &ServerSettings) -> ServerResult<()>;

    /// Number of players currently connected
    fn num_players(&self) -> usize;

    /// Take the parsed output stream. Available once, after `start`.
    fn subscribe(&mut self) -> Option<mpsc::Receiver<ParsedLine>>;

    /// Send a command to the running server. Only [`EventKind::Stop`] is
    /// supported; anything else is rejected with
    /// [`ServerError::UnsupportedCommand`].
    async fn send_command(&self, command: ParsedLine) -> ServerResult<()>;
}

/// Shared guard for the narrow command surface of [`Server::send_command`].
pub fn ensure_stop_command(command: &ParsedLine) -> ServerResult<()> {
    match command.event {
        Some(EventKind::Stop) => Ok(()),
        Some(kind) => Err(ServerError::UnsupportedCommand(kind)),
        None => Err(ServerError::Internal("command carries no event".into())),
    }
}
