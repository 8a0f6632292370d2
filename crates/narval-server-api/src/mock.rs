//! Mock game server for testing

use async_trait::async_trait;
use narval_api::{EventKind, ParsedLine, ServerSettings, User};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    ensure_stop_command, Server, ServerError, ServerResult, EVENT_CHANNEL_CAPACITY,
};

/// Mock server that replays a scripted sequence of parsed lines.
///
/// The event channel closes once the script is exhausted, which the
/// launcher treats as the process exiting.
pub struct MockServer {
    script: Vec<ParsedLine>,
    players: Arc<Mutex<HashSet<User>>>,
    events: Option<mpsc::Receiver<ParsedLine>>,
    started: bool,

    /// Commands received through `send_command`
    pub commands: Arc<Mutex<Vec<ParsedLine>>>,

    /// Settings passed to `prepare` and `start`
    pub seen_settings: Arc<Mutex<Vec<ServerSettings>>>,

    /// Configure prepare to fail
    pub fail_prepare: Arc<Mutex<bool>>,

    /// Configure start to fail
    pub fail_start: Arc<Mutex<bool>>,

    /// Delay between scripted lines
    pub line_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockServer {
    pub fn new(script: Vec<ParsedLine>) -> Self {
        Self {
            script,
            players: Arc::new(Mutex::new(HashSet::new())),
            events: None,
            started: false,
            commands: Arc::new(Mutex::new(Vec::new())),
            seen_settings: Arc::new(Mutex::new(Vec::new())),
            fail_prepare: Arc::new(Mutex::new(false)),
            fail_start: Arc::new(Mutex::new(false)),
            line_delay: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_line_delay(self, delay: Duration) -> Self {
        *self.line_delay.lock().unwrap() = Some(delay);
        self
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Server for MockServer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn prepare(&mut self, settings: &ServerSettings) -> ServerResult<()> {
        self.seen_settings.lock().unwrap().push(settings.clone());
        if *self.fail_prepare.lock().unwrap() {
            return Err(ServerError::PrepareFailed("Mock prepare failure".into()));
        }
        Ok(())
    }

    async fn start(&mut self, settings: &ServerSettings) -> ServerResult<()> {
        self.seen_settings.lock().unwrap().push(settings.clone());
        if *self.fail_start.lock().unwrap() {
            return Err(ServerError::SpawnFailed("Mock spawn failure".into()));
        }

        self.players.lock().unwrap().clear();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.events = Some(rx);
        self.started = true;

        let script = self.script.clone();
        let players = self.players.clone();
        let delay = *self.line_delay.lock().unwrap();
        tokio::spawn(async move {
            for line in script {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if let Some(author) = &line.author {
                    let mut players = players.lock().unwrap();
                    match line.event {
                        Some(EventKind::Join) => {
                            players.insert(author.clone());
                        }
                        Some(EventKind::Leave) => {
                            players.remove(author);
                        }
                        _ => {}
                    }
                }
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        Ok(())
    }

    fn num_players(&self) -> usize {
        self.players.lock().unwrap().len()
    }

    fn subscribe(&mut self) -> Option<mpsc::Receiver<ParsedLine>> {
        self.events.take()
    }

    async fn send_command(&self, command: ParsedLine) -> ServerResult<()> {
        if !self.started {
            return Err(ServerError::NotStarted);
        }
        ensure_stop_command(&command)?;
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}
