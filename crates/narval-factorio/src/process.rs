//! Server process management

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use narval_server_api::{ServerError, ServerResult};

/// A spawned server in its own process group, with its pipes
pub struct ServerProcess {
    pub pgid: i32,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub exit: ExitWatch,
}

/// Observes the exit of a server process
#[derive(Clone)]
pub struct ExitWatch {
    rx: watch::Receiver<Option<ExitStatus>>,
}

impl ExitWatch {
    /// Resolves once the process has been reaped
    pub async fn wait(&mut self) -> Option<ExitStatus> {
        match self.rx.wait_for(|status| status.is_some()).await {
            Ok(status) => *status,
            Err(_) => None,
        }
    }
}

impl ServerProcess {
    /// Spawn `<binary> --start-server <save>` as the leader of a new process
    /// group. Stdin and stdout are piped; stderr is inherited.
    pub fn spawn(binary: &Path, save: &Path) -> ServerResult<Self> {
        let mut cmd = Command::new(binary);
        cmd.arg("--start-server")
            .arg(save)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            ServerError::SpawnFailed(format!("Failed to spawn {}: {}", binary.display(), e))
        })?;

        let pid = child
            .id()
            .ok_or_else(|| ServerError::SpawnFailed("Process exited during spawn".into()))?;
        let pgid = pid as i32;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ServerError::Internal("stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServerError::Internal("stdout not piped".into()))?;

        let exit = reap(child, pgid);

        info!(pid, pgid, binary = %binary.display(), "Server process spawned");
        Ok(Self {
            pgid,
            stdin,
            stdout,
            exit,
        })
    }
}

fn reap(mut child: Child, pgid: i32) -> ExitWatch {
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                info!(pgid, status = %status, "Server process exited");
                let _ = tx.send(Some(status));
            }
            Err(e) => {
                warn!(pgid, error = %e, "Failed to wait for server process");
            }
        }
    });

    ExitWatch { rx }
}

/// Send SIGKILL to a whole process group
pub fn kill_process_group(pgid: i32) -> ServerResult<()> {
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => {
            debug!(pgid, "Sent SIGKILL to process group");
            Ok(())
        }
        // Already gone
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ServerError::Internal(format!(
            "Failed to send SIGKILL: {}",
            e
        ))),
    }
}

/// Kill the process group if it has not exited `timeout` after a stop
/// request
pub fn arm_kill_timer(pgid: i32, mut exit: ExitWatch, timeout: Duration) {
    tokio::spawn(async move {
        if tokio::time::timeout(timeout, exit.wait()).await.is_ok() {
            return;
        }
        warn!(pgid, timeout = ?timeout, "Server ignored stop request, killing process group");
        if let Err(e) = kill_process_group(pgid) {
            warn!(pgid, error = %e, "Hard kill failed");
        }
    });
}
