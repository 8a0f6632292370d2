//! Launch orchestration
//!
//! One launch is one session: prepare the artifacts, start the server,
//! relay its events to the notifier until the event stream closes, then
//! announce the shutdown. The public address is resolved concurrently from
//! the start and only awaited when the server reports it is ready.

use narval_api::{EventKind, ParsedLine, ServerSettings};
use narval_factorio::{FactorioLayout, FactorioServer};
use narval_server_api::{Server, ServerError};
use narval_store::ArtifactStore;
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::Notifier;

/// Final notification once the event stream closes
pub const SHUTDOWN_MESSAGE: &str = "Server shut down.";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Server not defined: {0}")]
    UnknownGame(String),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Server started without an event stream")]
    NoEventStream,
}

pub type LaunchResult<T> = Result<T, LaunchError>;

/// Summary of a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchReport {
    pub lines: usize,
    pub notifications: usize,
}

/// Pick the game adapter for a game name
pub fn select_server(
    game: &str,
    store: Arc<dyn ArtifactStore>,
    game_dir: &Path,
) -> LaunchResult<Box<dyn Server>> {
    match game {
        "factorio" => Ok(Box::new(FactorioServer::new(
            store,
            FactorioLayout::new(game_dir),
        ))),
        other => Err(LaunchError::UnknownGame(other.to_string())),
    }
}

/// Human-readable form of a server event, or `None` for lines that are
/// not announced
pub fn to_message(line: &ParsedLine, players: usize, address: Option<Ipv4Addr>) -> Option<String> {
    let author = line.author.as_ref().map(|u| u.as_str()).unwrap_or("");

    match line.event? {
        EventKind::Ready => Some(match address {
            Some(addr) => format!("Server is ready! Ip address is {}", addr),
            None => "Server is ready! Ip address is unknown".to_string(),
        }),
        EventKind::Join => Some(format!("`[{:2}]` :star2: {}", players, author)),
        EventKind::Leave => Some(format!("`[{:2}]` :comet: {}", players, author)),
        EventKind::Talk => Some(format!(
            "`<{}>` {}",
            author,
            line.message.as_deref().unwrap_or("")
        )),
        EventKind::Saved | EventKind::Stop => None,
    }
}

/// Address lookup running alongside preparation
enum PublicAddress {
    Pending(JoinHandle<Option<Ipv4Addr>>),
    Resolved(Option<Ipv4Addr>),
}

impl PublicAddress {
    fn spawn<F>(lookup: F) -> Self
    where
        F: Future<Output = Option<Ipv4Addr>> + Send + 'static,
    {
        PublicAddress::Pending(tokio::spawn(lookup))
    }

    async fn get(&mut self) -> Option<Ipv4Addr> {
        if let PublicAddress::Pending(handle) = self {
            let resolved = match handle.await {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(error = %e, "Address lookup task failed");
                    None
                }
            };
            *self = PublicAddress::Resolved(resolved);
        }

        match self {
            PublicAddress::Resolved(addr) => *addr,
            PublicAddress::Pending(_) => None,
        }
    }
}

impl Drop for PublicAddress {
    fn drop(&mut self) {
        if let PublicAddress::Pending(handle) = self {
            handle.abort();
        }
    }
}

/// Drives one server through a full session
pub struct Launcher {
    server: Box<dyn Server>,
    notifier: Arc<dyn Notifier>,
    settings: ServerSettings,
}

impl Launcher {
    pub fn new(server: Box<dyn Server>, notifier: Arc<dyn Notifier>, settings: ServerSettings) -> Self {
        Self {
            server,
            notifier,
            settings,
        }
    }

    /// Run the session to completion. A preparation or start failure is
    /// returned without any notification.
    pub async fn run<F>(mut self, address_lookup: F) -> LaunchResult<LaunchReport>
    where
        F: Future<Output = Option<Ipv4Addr>> + Send + 'static,
    {
        let name = self.server.name().to_string();
        let mut address = PublicAddress::spawn(address_lookup);

        info!(game = %name, version = %self.settings.version, "Preparing server");
        self.server.prepare(&self.settings).await?;

        info!(game = %name, "Starting server");
        self.server.start(&self.settings).await?;
        let mut events = self.server.subscribe().ok_or(LaunchError::NoEventStream)?;

        let mut report = LaunchReport::default();
        while let Some(line) = events.recv().await {
            report.lines += 1;

            let addr = if line.is(EventKind::Ready) {
                address.get().await
            } else {
                None
            };

            if let Some(message) = to_message(&line, self.server.num_players(), addr) {
                debug!(event = ?line.event, "Relaying event");
                self.notifier.say(&message).await;
                report.notifications += 1;
            }
        }

        info!(game = %name, lines = report.lines, "Server event stream closed");
        self.notifier.say(SHUTDOWN_MESSAGE).await;
        report.notifications += 1;

        Ok(report)
    }
}
