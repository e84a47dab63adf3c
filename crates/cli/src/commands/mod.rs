// CLI subcommand dispatch.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use atelier_common::types::{OwnerId, WorkspaceRecord};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use crate::client::DaemonClient;
use crate::daemon_launcher;
use crate::output::{self, OutputFormat};

pub mod info;
pub mod ls;
pub mod new;
pub mod rm;
pub mod set;

#[derive(Subcommand)]
pub enum Command {
    /// List registered workspaces
    Ls(ls::LsArgs),
    /// Show one workspace
    Info(info::InfoArgs),
    /// Register a workspace under a new name
    New(new::NewArgs),
    /// Update, rename or create a workspace
    Set(set::SetArgs),
    /// Remove a workspace
    Rm(rm::RmArgs),
}

pub fn run(cmd: Command) -> Result<()> {
    match cmd {
        Command::Ls(args) => ls::run(args),
        Command::Info(args) => info::run(args),
        Command::New(args) => new::run(args),
        Command::Set(args) => set::run(args),
        Command::Rm(args) => rm::run(args),
    }
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Force JSON output.
    #[arg(long)]
    pub json: bool,

    /// Act on another owner's workspaces (defaults to the daemon's owner).
    #[arg(long)]
    pub owner: Option<OwnerId>,
}

impl CommonArgs {
    pub fn format(&self) -> OutputFormat {
        OutputFormat::detect(self.json)
    }
}

/// `{ "workspace": ... }` as returned by get/set/create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceResult {
    pub workspace: Option<WorkspaceRecord>,
}

/// Run `future` on a fresh current-thread runtime, then print its result or
/// a mapped error in `format`.
pub fn execute<T, Fut, F>(format: OutputFormat, future: Fut, human_fn: F) -> Result<()>
where
    T: Serialize,
    Fut: Future<Output = Result<T>>,
    F: FnOnce(&T) -> String,
{
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
        .and_then(|runtime| runtime.block_on(future));

    match result {
        Ok(value) => {
            output::print_output(format, &value, human_fn)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

/// Client for the local daemon, starting it first if needed.
pub async fn connect() -> Result<DaemonClient> {
    daemon_launcher::ensure_daemon_running().await?;
    Ok(DaemonClient::default())
}

/// The daemon only accepts absolute directories; resolve relative input
/// against the working directory. An empty value unbinds and is kept as is.
pub fn absolute_dir(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Ok(String::new());
    }
    let path = std::path::absolute(Path::new(raw))
        .with_context(|| format!("failed to resolve `{raw}` to an absolute path"))?;
    Ok(path.to_string_lossy().into_owned())
}

pub fn format_record(record: &WorkspaceRecord) -> String {
    let path = record.bound_directory().unwrap_or("(none)");
    let target =
        record.publish_target_url.as_deref().filter(|url| !url.is_empty()).unwrap_or("(none)");
    [
        record.name.clone(),
        format!("  directory:      {path}"),
        format!("  publish target: {target}"),
        format!("  updated:        {}", record.updated_at.to_rfc3339()),
    ]
    .join("\n")
}
