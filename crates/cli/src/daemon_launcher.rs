// Start `atelierd` on demand when the control socket is not answering.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(unix)]
use tokio::time::sleep;

use crate::client::{default_socket_path, is_daemon_unavailable_kind};

const CONNECT_RETRIES: usize = 20;
const RETRY_DELAY_MS: u64 = 100;

pub async fn ensure_daemon_running() -> Result<()> {
    ensure_daemon_running_at(&default_socket_path()).await
}

pub async fn ensure_daemon_running_at(socket_path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        match try_connect(socket_path).await {
            Ok(()) => return Ok(()),
            Err(err) if is_daemon_unavailable_kind(err.kind()) => {
                spawn_daemon_process()?;
                wait_for_daemon_socket(socket_path).await?;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to connect to daemon socket at `{}`", socket_path.display())
                });
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = socket_path;
    }

    Ok(())
}

fn daemon_candidates() -> Vec<OsString> {
    match std::env::var_os("ATELIER_DAEMON_BIN") {
        Some(explicit_binary) => vec![explicit_binary],
        None => vec![OsString::from("atelierd")],
    }
}

fn spawn_daemon_process() -> Result<()> {
    let mut not_found_candidates = Vec::new();

    for candidate in daemon_candidates() {
        let mut command = Command::new(&candidate);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());

        match command.spawn() {
            Ok(_child) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                not_found_candidates.push(candidate);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to spawn daemon process with binary `{candidate:?}`")
                });
            }
        }
    }

    Err(anyhow!(
        "unable to find daemon binary (tried: {})",
        not_found_candidates
            .iter()
            .map(|name| name.to_string_lossy())
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

#[cfg(unix)]
async fn try_connect(socket_path: &Path) -> io::Result<()> {
    UnixStream::connect(socket_path).await.map(|_| ())
}

#[cfg(unix)]
async fn wait_for_daemon_socket(socket_path: &Path) -> Result<()> {
    let mut last_error: Option<io::Error> = None;

    for _ in 0..CONNECT_RETRIES {
        match try_connect(socket_path).await {
            Ok(()) => return Ok(()),
            Err(err) if is_daemon_unavailable_kind(err.kind()) => {
                last_error = Some(err);
                sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "daemon started but socket connection failed at `{}`",
                        socket_path.display()
                    )
                });
            }
        }
    }

    Err(anyhow!(
        "daemon socket did not become available at `{}` after {} retries; last error: {}",
        socket_path.display(),
        CONNECT_RETRIES,
        last_error.map(|err| err.to_string()).unwrap_or_else(|| "unknown".to_string())
    ))
}
