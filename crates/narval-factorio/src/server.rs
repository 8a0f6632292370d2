//! Factorio server supervisor

use async_trait::async_trait;
use narval_api::{EventKind, ParsedLine, ServerSettings};
use narval_core::SessionClock;
use narval_server_api::{
    ensure_stop_command, Server, ServerError, ServerResult, EVENT_CHANNEL_CAPACITY,
};
use narval_store::ArtifactStore;
use narval_util::{format_datetime_full, format_duration, wall_clock_at, MonotonicInstant};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::layout::FactorioLayout;
use crate::parser::parse_line;
use crate::prepare::ArtifactSync;
use crate::process::{arm_kill_timer, ExitWatch, ServerProcess};

/// Idle check period, e seconds
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_nanos(2_718_281_831);

/// Console command that saves and exits
const QUIT_COMMAND: &[u8] = b"/quit\n";

/// State shared between the supervisor and its background tasks
struct Running {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pgid: i32,
    exit: ExitWatch,
    stop_timeout: Duration,
}

impl Running {
    async fn request_stop(&self) -> ServerResult<()> {
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(QUIT_COMMAND).await?;
            stdin.flush().await?;
        }
        info!(pgid = self.pgid, "Stop requested");
        arm_kill_timer(self.pgid, self.exit.clone(), self.stop_timeout);
        Ok(())
    }
}

pub struct FactorioServer {
    sync: ArtifactSync,
    clock: Option<Arc<Mutex<SessionClock>>>,
    running: Option<Arc<Running>>,
    events: Option<mpsc::Receiver<ParsedLine>>,
}

impl FactorioServer {
    pub fn new(store: Arc<dyn ArtifactStore>, layout: FactorioLayout) -> Self {
        Self {
            sync: ArtifactSync::new(store, layout),
            clock: None,
            running: None,
            events: None,
        }
    }

    /// Fetch the game distribution from another server
    pub fn with_download_base(mut self, base: impl Into<String>) -> Self {
        self.sync = self.sync.with_download_base(base);
        self
    }
}

fn lock(clock: &Mutex<SessionClock>) -> MutexGuard<'_, SessionClock> {
    clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Server for FactorioServer {
    fn name(&self) -> &str {
        "factorio"
    }

    async fn prepare(&mut self, settings: &ServerSettings) -> ServerResult<()> {
        info!(version = %settings.version, store = %self.sync.describe_store(), "Preparing Factorio");
        self.sync
            .prepare(&settings.version)
            .await
            .map_err(|e| ServerError::PrepareFailed(e.to_string()))
    }

    async fn start(&mut self, settings: &ServerSettings) -> ServerResult<()> {
        let layout = self.sync.layout();
        let process = ServerProcess::spawn(&layout.binary(), &layout.save())?;

        let now = MonotonicInstant::now();
        let clock = Arc::new(Mutex::new(SessionClock::start(now, settings)));
        {
            let clock = lock(&clock);
            info!(
                max_session = %format_duration(settings.max_session),
                shutdown_at = %format_datetime_full(&wall_clock_at(clock.shutdown_at())),
                "Session clock started"
            );
        }

        let running = Arc::new(Running {
            stdin: tokio::sync::Mutex::new(process.stdin),
            pgid: process.pgid,
            exit: process.exit,
            stop_timeout: settings.stop_timeout,
        });
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let roster_changed = Arc::new(Notify::new());

        tokio::spawn(read_stdout(
            process.stdout,
            tx,
            clock.clone(),
            roster_changed.clone(),
            self.sync.clone(),
            settings.echo_output,
        ));
        tokio::spawn(idle_timeout(clock.clone(), running.clone(), roster_changed));
        if settings.stdin_passthrough {
            tokio::spawn(stdin_passthrough(running.clone()));
        }

        self.clock = Some(clock);
        self.running = Some(running);
        self.events = Some(rx);
        Ok(())
    }

    fn num_players(&self) -> usize {
        self.clock
            .as_ref()
            .map(|clock| lock(clock).num_players())
            .unwrap_or(0)
    }

    fn subscribe(&mut self) -> Option<mpsc::Receiver<ParsedLine>> {
        self.events.take()
    }

    async fn send_command(&self, command: ParsedLine) -> ServerResult<()> {
        ensure_stop_command(&command)?;
        let running = self.running.as_ref().ok_or(ServerError::NotStarted)?;
        running.request_stop().await
    }
}

/// Forward parsed output to the event channel until the process closes
/// stdout. Dropping `tx` closes the channel, and that only happens once
/// every pending upload has finished.
async fn read_stdout(
    stdout: ChildStdout,
    tx: mpsc::Sender<ParsedLine>,
    clock: Arc<Mutex<SessionClock>>,
    roster_changed: Arc<Notify>,
    sync: ArtifactSync,
    echo: bool,
) {
    let started = MonotonicInstant::now();
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut lines = 0u64;
    let mut consumer_gone = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read server output");
                break;
            }
        }
        lines += 1;

        let raw = String::from_utf8_lossy(&buf);
        let raw = raw.trim_end_matches(['\n', '\r']);
        if echo {
            println!("{}", raw);
        }
        debug!(target: "factorio", "{}", raw);

        let parsed = parse_line(raw);
        if lock(&clock).observe(&parsed, MonotonicInstant::now()) {
            roster_changed.notify_one();
        }

        if parsed.is(EventKind::Saved) {
            sync.spawn_save_upload();
        }

        if !consumer_gone && tx.send(parsed).await.is_err() {
            debug!("Event consumer gone, draining output");
            consumer_gone = true;
        }
    }

    info!(lines, uptime = %format_duration(started.elapsed()), "Server output closed");

    sync.flush().await;
    drop(tx);
}

/// Stop the server once the session clock says it is due
async fn idle_timeout(
    clock: Arc<Mutex<SessionClock>>,
    running: Arc<Running>,
    roster_changed: Arc<Notify>,
) {
    let mut exit = running.exit.clone();

    loop {
        let remaining = {
            let clock = lock(&clock);
            let now = MonotonicInstant::now();
            if clock.is_due(now) {
                break;
            }
            clock.remaining(now)
        };

        tokio::select! {
            _ = tokio::time::sleep(remaining.min(IDLE_POLL_INTERVAL)) => {}
            _ = roster_changed.notified() => {}
            _ = exit.wait() => {
                debug!("Server exited before idle shutdown");
                return;
            }
        }
    }

    info!(players = lock(&clock).num_players(), "Shutting down");
    if let Err(e) = running.request_stop().await {
        warn!(error = %e, "Failed to send stop command");
    }
}

/// Forward operator console input to the server
async fn stdin_passthrough(running: Arc<Running>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut stdin = running.stdin.lock().await;
                let written = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = written {
                    debug!(error = %e, "Server console closed");
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to read launcher stdin");
                return;
            }
        }
    }
}
