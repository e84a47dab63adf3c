use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::content::server::{serve_http, ContentState};
use crate::registry::WorkspaceRegistry;
use crate::rpc::methods::RpcServerState;
use crate::rpc::unix::serve_unix_until_shutdown;
use crate::scope::ScopeCache;
use crate::startup::{bind_socket, is_daemon_running, remove_pid_file, write_pid_file, DaemonPaths};
use crate::store::meta_db::MetaDb;
use crate::store::workspaces::SqliteWorkspaceStore;

/// A running daemon: control socket plus content server.
pub struct DaemonHandle {
    shutdown_tx: broadcast::Sender<()>,
    content_addr: SocketAddr,
    rpc_task: Option<JoinHandle<Result<()>>>,
    content_task: Option<JoinHandle<Result<()>>>,
    paths: DaemonPaths,
}

impl DaemonHandle {
    /// Address the content server actually bound (useful with port 0).
    pub fn content_addr(&self) -> SocketAddr {
        self.content_addr
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Wait until a shutdown is requested (RPC, signal, or [`shutdown`]),
    /// then stop both servers and remove runtime files.
    ///
    /// [`shutdown`]: DaemonHandle::shutdown
    pub async fn wait(mut self) -> Result<()> {
        let rpc_result = match self.rpc_task.take() {
            Some(task) => task.await.map_err(|error| anyhow!("rpc task panicked: {error}"))?,
            None => Ok(()),
        };
        // The accept loop can also end on an error; stop the content server
        // either way.
        self.shutdown();

        let content_result = match self.content_task.take() {
            Some(task) => task.await.map_err(|error| anyhow!("content task panicked: {error}"))?,
            None => Ok(()),
        };

        cleanup_paths(&self.paths);
        rpc_result.and(content_result)
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub async fn run_standalone() -> Result<()> {
    let paths = DaemonPaths::resolve()?;
    let config = DaemonConfig::load();
    let handle = start(paths, config).await?;

    let shutdown_tx = handle.shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received");
        let _ = shutdown_tx.send(());
    });

    handle.wait().await.context("standalone daemon exited with error")
}

/// Open meta.db, bind both listeners and start serving.
pub async fn start(paths: DaemonPaths, config: DaemonConfig) -> Result<DaemonHandle> {
    if is_daemon_running(&paths.socket_path).await {
        bail!("a daemon is already listening on `{}`", paths.socket_path.display());
    }

    let csp = HeaderValue::from_str(&config.content_security_policy)
        .context("content_security_policy is not a valid header value")?;

    let db = MetaDb::open(&paths.meta_db_path)?;
    let registry = Arc::new(WorkspaceRegistry::new(Arc::new(SqliteWorkspaceStore::new(db))));
    let scopes = Arc::new(ScopeCache::new(config.scope_cache_capacity));

    let tcp = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind content listener on {}", config.listen_addr))?;
    let content_addr = tcp.local_addr().context("failed to read content listener address")?;
    let unix = bind_socket(&paths.socket_path).await?;
    write_pid_file(&paths.pid_path)?;

    let (shutdown_tx, _) = broadcast::channel(4);
    let rpc_state = RpcServerState::new(Arc::clone(&registry), config.owner_id)
        .with_shutdown_notifier(shutdown_tx.clone());
    let content_state = ContentState { registry, scopes, owner_id: config.owner_id, csp };

    let rpc_task = tokio::spawn(serve_unix_until_shutdown(unix, rpc_state, shutdown_tx.subscribe()));
    let content_shutdown = shutdown_tx.subscribe();
    let content_task = tokio::spawn(async move {
        let result = serve_http(tcp, content_state, content_shutdown).await;
        if let Err(error) = &result {
            warn!(?error, "content server terminated unexpectedly");
        }
        result
    });

    info!(
        socket_path = %paths.socket_path.display(),
        content_addr = %content_addr,
        owner_id = config.owner_id,
        "daemon started"
    );

    Ok(DaemonHandle {
        shutdown_tx,
        content_addr,
        rpc_task: Some(rpc_task),
        content_task: Some(content_task),
        paths,
    })
}

fn cleanup_paths(paths: &DaemonPaths) {
    remove_pid_file(&paths.pid_path);
    let _ = std::fs::remove_file(&paths.socket_path);
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    fn test_config() -> DaemonConfig {
        DaemonConfig { listen_addr: "127.0.0.1:0".parse().unwrap(), ..DaemonConfig::default() }
    }

    #[tokio::test]
    async fn start_writes_runtime_files_and_cleans_up_on_shutdown() {
        let tmp = TempDir::new().expect("temp dir should be created");
        let paths = DaemonPaths::under(tmp.path());

        let handle = start(paths.clone(), test_config()).await.expect("daemon should start");
        assert!(paths.pid_path.exists());
        assert!(paths.meta_db_path.exists());
        assert!(is_daemon_running(&paths.socket_path).await);
        assert_ne!(handle.content_addr().port(), 0);

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("daemon should stop")
            .expect("daemon should shut down cleanly");

        assert!(!paths.pid_path.exists());
        assert!(!paths.socket_path.exists());
    }

    #[tokio::test]
    async fn refuses_to_start_twice_on_the_same_socket() {
        let tmp = TempDir::new().unwrap();
        let paths = DaemonPaths::under(tmp.path());

        let first = start(paths.clone(), test_config()).await.expect("first daemon should start");
        let second = start(paths.clone(), test_config()).await;
        assert!(second.is_err());

        first.shutdown();
        first.wait().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_csp_fails_startup() {
        let tmp = TempDir::new().unwrap();
        let config = DaemonConfig {
            content_security_policy: "bad\nvalue".into(),
            ..test_config()
        };
        assert!(start(DaemonPaths::under(tmp.path()), config).await.is_err());
    }
}
