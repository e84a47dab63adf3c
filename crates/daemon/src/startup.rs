// Daemon startup files: PID file, control socket, meta.db location.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tracing::info;

use crate::security::{ensure_owner_only_dir, ensure_owner_only_file};

const BASE_DIR_NAME: &str = ".atelier";
const SOCKET_NAME: &str = "daemon.sock";
/// Diagnostics only.
const PID_FILE_NAME: &str = "daemon.pid";
const META_DB_NAME: &str = "meta.db";
const CONFIG_NAME: &str = "config.toml";

/// Resolved paths for daemon runtime files.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub meta_db_path: PathBuf,
    pub config_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve paths under `~/.atelier/`, creating the directory.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let base_dir = home.join(BASE_DIR_NAME);
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("failed to create `{}`", base_dir.display()))?;
        ensure_owner_only_dir(&base_dir)?;
        Ok(Self::under(base_dir))
    }

    /// Lay out runtime files under an explicit directory.
    pub fn under(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            socket_path: base_dir.join(SOCKET_NAME),
            pid_path: base_dir.join(PID_FILE_NAME),
            meta_db_path: base_dir.join(META_DB_NAME),
            config_path: base_dir.join(CONFIG_NAME),
            base_dir,
        }
    }
}

pub fn write_pid_file(path: &Path) -> Result<()> {
    let pid = std::process::id();
    let mut file = fs::File::create(path).context("failed to create PID file")?;
    write!(file, "{pid}").context("failed to write PID")?;
    ensure_owner_only_file(path)?;
    info!(pid, path = %path.display(), "wrote PID file");
    Ok(())
}

pub fn remove_pid_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, "failed to remove PID file");
        }
    }
}

/// Remove a stale socket file and bind a new listener. Accepting
/// connections on it is the readiness signal.
pub async fn bind_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        fs::remove_file(path).context("failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(path).context("failed to bind Unix socket")?;
    ensure_owner_only_file(path)?;
    info!(path = %path.display(), "daemon socket ready");
    Ok(listener)
}

/// True if something accepts connections on `socket_path`.
pub async fn is_daemon_running(socket_path: &Path) -> bool {
    tokio::net::UnixStream::connect(socket_path).await.is_ok()
}
